//! Helpers shared by the SQL stores.

use crate::infrastructure::database::codec::{self, DbValue, StringArray, StringInterface, StringMap};
use crate::infrastructure::database::{Arg, Dialect, Statement};
use crate::shared::error::{StoreError, StoreResult};

/// Page size used when a store walks a table in id order.
pub const BATCH_SIZE: u64 = 1000;

pub(crate) fn map_arg(map: &StringMap) -> StoreResult<Arg> {
    codec::to_db(DbValue::StringMap(map)).map_err(|e| StoreError::wrap("failed to encode map column", e))
}

pub(crate) fn interface_arg(map: &StringInterface) -> StoreResult<Arg> {
    codec::to_db(DbValue::StringInterface(map))
        .map_err(|e| StoreError::wrap("failed to encode props column", e))
}

pub(crate) fn array_arg(values: &StringArray) -> StoreResult<Arg> {
    codec::to_db(DbValue::StringArray(values))
        .map_err(|e| StoreError::wrap("failed to encode array column", e))
}

/// `DELETE` of at most `limit` rows of `table` matching `condition`.
///
/// PostgreSQL has no `DELETE ... LIMIT`, so the rows are picked by `ctid`
/// in a subquery.
pub(crate) fn limited_delete(
    dialect: Dialect,
    table: &str,
    condition: &str,
    args: Vec<Arg>,
    limit: u64,
) -> Statement {
    let sql = match dialect {
        Dialect::Postgres => format!(
            "DELETE FROM {table} WHERE ctid IN (SELECT ctid FROM {table} WHERE {condition} LIMIT ?)"
        ),
        Dialect::MySql => format!("DELETE FROM {table} WHERE {condition} LIMIT ?"),
    };
    Statement::new(dialect, &sql)
        .bind_all(args)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
}

/// `?, ?, ...` bound to `values`, for hand-written `IN` lists.
pub(crate) fn in_list(values: &[String]) -> String {
    crate::infrastructure::database::statement::placeholders(values.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_limited_delete_postgres() {
        let stmt = limited_delete(
            Dialect::Postgres,
            "ChannelMemberHistory",
            "LeaveTime IS NOT NULL AND LeaveTime <= ?",
            vec![Arg::Int(100)],
            10,
        );
        assert_eq!(
            stmt.sql,
            "DELETE FROM ChannelMemberHistory WHERE ctid IN (SELECT ctid FROM ChannelMemberHistory \
             WHERE LeaveTime IS NOT NULL AND LeaveTime <= $1 LIMIT $2)"
        );
        assert_eq!(stmt.args, vec![Arg::Int(100), Arg::Int(10)]);
    }

    #[test]
    fn test_limited_delete_mysql() {
        let stmt = limited_delete(Dialect::MySql, "FileInfo", "CreateAt < ?", vec![Arg::Int(5)], 3);
        assert_eq!(stmt.sql, "DELETE FROM FileInfo WHERE CreateAt < ? LIMIT ?");
    }

    #[test]
    fn test_map_arg_is_json_text() {
        let mut map = StringMap::new();
        map.insert("k".into(), "v".into());
        assert_eq!(map_arg(&map).unwrap(), Arg::Text("{\"k\":\"v\"}".into()));
    }
}
