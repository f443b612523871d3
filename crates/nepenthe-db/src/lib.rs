//! Nepenthe-DB: Database schema, migrations, and query operations
//!
//! This crate provides the library index storage for nepenthe using SQLite
//! with rusqlite and r2d2 connection pooling.
//!
//! # Modules
//!
//! - `migrations` - Database schema migrations
//! - `pool` - Connection pool management
//! - `models` - Rust models matching database schema
//! - `queries` - Database query operations
//!
//! Query functions take a `&Connection`, so a caller can run several of them
//! inside one `unchecked_transaction()` and commit or roll back as a unit.
//!
//! # Example
//!
//! ```no_run
//! use nepenthe_db::models::NewVideo;
//! use nepenthe_db::pool::{get_conn, init_pool};
//! use nepenthe_db::queries::videos;
//!
//! let pool = init_pool("/var/lib/nepenthe/videos.db").unwrap();
//! let conn = get_conn(&pool).unwrap();
//!
//! let tx = conn.unchecked_transaction().unwrap();
//! let added = videos::insert_videos(
//!     &tx,
//!     &[NewVideo::new("clip.mp4", "/videos/clip.mp4", "/videos")],
//! )
//! .unwrap();
//! tx.commit().unwrap();
//! println!("Assigned id {}", added[0].id);
//! ```

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;
