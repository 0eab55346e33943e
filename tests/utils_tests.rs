use bulkdrop::utils::{
    has_blocked_extension, sanitize_filename, sanitize_upload_id, validate_object_key,
};

#[test]
fn test_sanitize_filename() {
    // basic alphanumeric with extension
    assert_eq!(sanitize_filename("hello.txt"), "hello.txt");

    // directory traversal attempts
    assert_eq!(sanitize_filename("../hello.txt"), "hello.txt");
    assert_eq!(sanitize_filename("foo/bar.txt"), "foobar.txt");
    assert_eq!(sanitize_filename("/etc/passwd"), "etcpasswd");

    // special characters
    assert_eq!(sanitize_filename("hello-world_123.txt"), "hello-world_123.txt");
    assert_eq!(sanitize_filename("hello@world.txt"), "helloworld.txt");

    // leading dots
    assert_eq!(sanitize_filename(".hidden"), "hidden");
    assert_eq!(sanitize_filename("..hidden"), "hidden");
}

#[test]
fn test_sanitize_upload_id() {
    assert_eq!(sanitize_upload_id("u1").unwrap(), "u1");
    assert_eq!(sanitize_upload_id("my-upload_42").unwrap(), "my-upload_42");

    // disallowed characters are stripped
    assert_eq!(sanitize_upload_id("a/b\\c").unwrap(), "abc");
    assert_eq!(sanitize_upload_id("../../etc").unwrap(), "etc");

    // nothing left means rejection
    assert!(sanitize_upload_id("").is_err());
    assert!(sanitize_upload_id("../").is_err());
    assert!(sanitize_upload_id("   ").is_err());
}

#[test]
fn test_has_blocked_extension() {
    assert!(has_blocked_extension("evil.exe"));
    assert!(has_blocked_extension("EVIL.EXE"));
    assert!(has_blocked_extension("installer.msi"));
    assert!(has_blocked_extension("script.ps1"));

    assert!(!has_blocked_extension("report.pdf"));
    assert!(!has_blocked_extension("archive.tar.gz"));
    // no extension at all
    assert!(!has_blocked_extension("exe"));
    assert!(!has_blocked_extension("README"));
}

#[test]
fn test_validate_object_key() {
    assert!(validate_object_key("report.pdf").is_ok());
    assert!(validate_object_key("a/b/c.bin").is_ok());
    assert!(validate_object_key(".staging/tmp.part").is_ok());

    assert!(validate_object_key("").is_err());
    assert!(validate_object_key("/etc/passwd").is_err());
    assert!(validate_object_key("../escape").is_err());
    assert!(validate_object_key("a/../../b").is_err());
}
