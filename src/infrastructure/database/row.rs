//! Row access helpers.
//!
//! Column lookup is case-insensitive because PostgreSQL folds unquoted
//! identifiers to lower case while MySQL keeps them as written. Decoding
//! tolerates the representation differences the `Any` driver exposes:
//! MySQL `TEXT` arrives as bytes, narrow integer columns arrive as `i32`/`i16`,
//! and MySQL booleans are stored as small integers.

use serde::de::DeserializeOwned;
use sqlx::any::AnyRow;
use sqlx::{Column, Row};

use super::codec::{self, ColumnValue};
use super::error::DbError;

pub trait RowExt {
    /// Position of `column`, matched case-insensitively.
    fn index_of(&self, column: &str) -> Result<usize, DbError>;

    /// Text column; NULL reads as the empty string.
    fn text(&self, column: &str) -> Result<String, DbError>;

    fn opt_text(&self, column: &str) -> Result<Option<String>, DbError>;

    /// Integer column; NULL reads as zero.
    fn int(&self, column: &str) -> Result<i64, DbError>;

    fn opt_int(&self, column: &str) -> Result<Option<i64>, DbError>;

    /// Boolean column; NULL reads as false.
    fn boolean(&self, column: &str) -> Result<bool, DbError>;

    /// Raw holder value, for the type converter.
    fn value(&self, column: &str) -> Result<ColumnValue, DbError>;

    /// JSON text column decoded through the type converter.
    fn json<T: DeserializeOwned + Default>(&self, column: &str) -> Result<T, DbError>;
}

impl RowExt for AnyRow {
    fn index_of(&self, column: &str) -> Result<usize, DbError> {
        self.columns()
            .iter()
            .position(|c| c.name().eq_ignore_ascii_case(column))
            .ok_or_else(|| DbError::decode(column, "no such column"))
    }

    fn text(&self, column: &str) -> Result<String, DbError> {
        Ok(self.opt_text(column)?.unwrap_or_default())
    }

    fn opt_text(&self, column: &str) -> Result<Option<String>, DbError> {
        let idx = self.index_of(column)?;
        if let Ok(v) = self.try_get::<Option<String>, _>(idx) {
            return Ok(v);
        }
        match self.try_get::<Option<Vec<u8>>, _>(idx) {
            Ok(Some(bytes)) => String::from_utf8(bytes)
                .map(Some)
                .map_err(|e| DbError::decode(column, e)),
            Ok(None) => Ok(None),
            Err(e) => Err(DbError::decode(column, e)),
        }
    }

    fn int(&self, column: &str) -> Result<i64, DbError> {
        Ok(self.opt_int(column)?.unwrap_or_default())
    }

    fn opt_int(&self, column: &str) -> Result<Option<i64>, DbError> {
        let idx = self.index_of(column)?;
        if let Ok(v) = self.try_get::<Option<i64>, _>(idx) {
            return Ok(v);
        }
        if let Ok(v) = self.try_get::<Option<i32>, _>(idx) {
            return Ok(v.map(i64::from));
        }
        self.try_get::<Option<i16>, _>(idx)
            .map(|v| v.map(i64::from))
            .map_err(|e| DbError::decode(column, e))
    }

    fn boolean(&self, column: &str) -> Result<bool, DbError> {
        let idx = self.index_of(column)?;
        if let Ok(v) = self.try_get::<Option<bool>, _>(idx) {
            return Ok(v.unwrap_or(false));
        }
        Ok(self.opt_int(column)?.is_some_and(|v| v != 0))
    }

    fn value(&self, column: &str) -> Result<ColumnValue, DbError> {
        let idx = self.index_of(column)?;
        if let Ok(v) = self.try_get::<Option<String>, _>(idx) {
            return Ok(v.map_or(ColumnValue::Null, ColumnValue::Text));
        }
        if let Ok(v) = self.try_get::<Option<Vec<u8>>, _>(idx) {
            return Ok(v.map_or(ColumnValue::Null, ColumnValue::Bytes));
        }
        Ok(self
            .opt_int(column)?
            .map_or(ColumnValue::Null, ColumnValue::Int))
    }

    fn json<T: DeserializeOwned + Default>(&self, column: &str) -> Result<T, DbError> {
        let holder = self.value(column)?;
        codec::decode(&holder).map_err(|e| DbError::decode(column, e))
    }
}

/// Decode a row into a domain type.
pub trait FromAnyRow: Sized {
    fn from_row(row: &AnyRow) -> Result<Self, DbError>;
}

/// Decode every row, stopping at the first failure.
pub fn decode_all<T: FromAnyRow>(rows: &[AnyRow]) -> Result<Vec<T>, DbError> {
    rows.iter().map(T::from_row).collect()
}

/// Single-column string results (`SELECT Id FROM ...`).
pub fn strings(rows: &[AnyRow], column: &str) -> Result<Vec<String>, DbError> {
    rows.iter().map(|r| r.text(column)).collect()
}
