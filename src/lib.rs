//! # Chat Store Library
//!
//! The relational persistence layer of a team-collaboration chat server:
//! - One code base for PostgreSQL and MySQL
//! - Primary/replica routing with replica lag monitoring
//! - Embedded migrations plus idempotent schema mutators
//! - Repositories for users, teams, channels, posts, groups, sidebars and
//!   administrative records
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Entities, store traits and pure planning rules
//! - **Infrastructure Layer**: SQL repositories, pools, migrations
//! - **Store**: the façade handing out repositories
//!
//! ## Module Structure
//!
//! ```text
//! chat_store/
//! +-- config/         Configuration management
//! +-- domain/         Entities, store traits, sidebar and role rules
//! +-- infrastructure/ Database plumbing, repositories, integrity checks
//! +-- shared/         Common utilities (errors, ids, validation)
//! +-- store.rs        SqlStore façade
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Infrastructure layer - SQL implementations
pub mod infrastructure;

// Shared utilities
pub mod shared;

// Process startup
pub mod startup;

// Repository façade
pub mod store;

// Telemetry and observability
pub mod telemetry;

pub use store::SqlStore;
