//! Infrastructure Layer
//!
//! Contains the SQL side of the store:
//! - Database plumbing (dialects, pools, migrations, query building)
//! - Repository implementations of the domain store traits
//! - The relational integrity checker
//! - Prometheus metrics

pub mod database;
pub mod integrity;
pub mod metrics;
pub mod repositories;
