//! Common utilities and types shared across drivekit crates.
//!
//! This module provides the error taxonomy and the small value types
//! (relative item paths, bearer tokens) used by every backend.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{AccessToken, ItemPath};
