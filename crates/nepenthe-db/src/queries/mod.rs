//! Database query operations.
//!
//! Every function takes a `&Connection` so callers decide the transaction
//! boundary.

pub mod videos;
