//! SocialNet Shared Types and Utilities
//!
//! Domain records, the storage error taxonomy and database helpers used by
//! the API crate.

pub mod db;
pub mod error;
pub mod types;

pub use db::*;
pub use error::*;
pub use types::*;
