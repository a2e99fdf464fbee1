//! # Domain Layer
//!
//! Entities of the chat server's relational schema, the store traits that
//! persist them and the pure rules the stores apply.
//!
//! ## Structure
//!
//! - **entities**: rows, enums and `*Store` traits
//! - **services**: role rewriting and sidebar planning, free of SQL
//!
//! Nothing here touches a connection; the infrastructure layer implements
//! every store trait.

pub mod entities;
pub mod services;

pub use entities::*;
