//! Nepenthe - personal video library indexer
//!
//! This library crate exposes the core functionality for integration testing.
//!
//! An ingestion unit reconciles the index against the library roots, scans
//! them for new files, fills in metadata and thumbnails, and sweeps
//! thumbnails nothing references any more. The HTTP server exposes the index
//! and streams files with byte-range support.

pub mod config;
pub mod ingest;
pub mod pipeline;
pub mod reconcile;
pub mod scanner;
pub mod server;
pub mod streaming;
