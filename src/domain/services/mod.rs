//! # Domain Services
//!
//! Pure rules shared by several stores.
//!
//! - **roles**: built-in role set and guest/user role rewriting
//! - **sidebar**: category placement, orphan merging and favorites diffing

pub mod roles;
pub mod sidebar;
