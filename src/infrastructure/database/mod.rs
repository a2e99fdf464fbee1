//! Database Module
//!
//! Dialect adapter, pool router, statement execution, query builder, type
//! converter, schema management and transaction helpers shared by every
//! repository.

pub mod codec;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod fatal;
pub mod migrator;
pub mod query_builder;
pub mod router;
pub mod row;
pub mod schema;
pub mod statement;
pub mod unit_of_work;

pub use dialect::Dialect;
pub use error::{DbError, ErrorClass};
pub use executor::{DbHandle, Exec, PoolRole, Tx};
pub use fatal::{FatalKind, SchemaError};
pub use migrator::{Direction, Migrator};
pub use query_builder::{DeleteBuilder, Expr, InsertBuilder, QueryBuilder, SelectBuilder, UpdateBuilder};
pub use router::{PingPolicy, PoolRouter, PoolStats};
pub use row::{FromAnyRow, RowExt};
pub use schema::{ColumnInfo, SchemaManager};
pub use statement::{Arg, Statement};
pub use unit_of_work::{finish, retry_on_deadlock};
