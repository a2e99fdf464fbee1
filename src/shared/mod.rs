//! Shared Utilities
//!
//! Common utilities used across all layers.

pub mod error;
pub mod ids;
pub mod validation;

pub use error::{StoreError, StoreResult};
