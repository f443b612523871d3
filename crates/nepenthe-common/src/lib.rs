//! Nepenthe-Common: Shared types, constants, and utilities.
//!
//! This crate provides common functionality used across nepenthe:
//!
//! - **Typed IDs**: [`VideoId`] wraps the integer key assigned by storage
//! - **Path Utilities**: supported video extensions, thumbnail naming, and
//!   root containment checks
//! - **Error Handling**: Common error types and result aliases
//!
//! # Examples
//!
//! ```
//! use nepenthe_common::{VideoId, Error, Result};
//! use nepenthe_common::paths::{is_video_file, thumbnail_file_name};
//! use std::path::Path;
//!
//! assert!(is_video_file(Path::new("holiday.mkv")));
//! assert_eq!(thumbnail_file_name(VideoId::from(7)), "video_7.jpg");
//!
//! fn example() -> Result<()> {
//!     Err(Error::not_found("video"))
//! }
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::VideoId;
