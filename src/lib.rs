//! Chunked file upload service.
//!
//! A client splits a large file into sequentially numbered chunks and posts
//! them one at a time to a single multipart endpoint; the server tracks the
//! session, reassembles the chunks in index order, and commits the result
//! atomically into an artifact directory. [`uploader`] is the matching
//! client-side orchestrator.

pub mod assembler;
pub mod blob_store;
pub mod chunk_store;
pub mod config;
pub mod error;
pub mod fetch;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod reaper;
pub mod resolve;
pub mod server;
pub mod session;
pub mod state;
pub mod uploader;
pub mod utils;
