//! Query Builder
//!
//! Fluent builders for SELECT/INSERT/UPDATE/DELETE that accumulate predicates
//! and arguments and emit a [`Statement`] in the dialect's placeholder style.
//! Fragments are assembled with `?` placeholders and rebound once at the end,
//! so subqueries can be nested freely.

use super::dialect::Dialect;
use super::statement::{Arg, Statement};

/// A predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Eq(String, Arg),
    NotEq(String, Arg),
    Gt(String, Arg),
    Gte(String, Arg),
    Lt(String, Arg),
    Lte(String, Arg),
    Like(String, Arg),
    /// Case-insensitive LIKE; rendered per dialect.
    ILike(String, String),
    In(String, Vec<Arg>),
    NotIn(String, Vec<Arg>),
    IsNull(String),
    IsNotNull(String),
    /// Raw SQL with `?` placeholders.
    Raw(String, Vec<Arg>),
    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn eq(column: &str, value: impl Into<Arg>) -> Self {
        Self::Eq(column.to_string(), value.into())
    }

    pub fn not_eq(column: &str, value: impl Into<Arg>) -> Self {
        Self::NotEq(column.to_string(), value.into())
    }

    pub fn gt(column: &str, value: impl Into<Arg>) -> Self {
        Self::Gt(column.to_string(), value.into())
    }

    pub fn gte(column: &str, value: impl Into<Arg>) -> Self {
        Self::Gte(column.to_string(), value.into())
    }

    pub fn lt(column: &str, value: impl Into<Arg>) -> Self {
        Self::Lt(column.to_string(), value.into())
    }

    pub fn lte(column: &str, value: impl Into<Arg>) -> Self {
        Self::Lte(column.to_string(), value.into())
    }

    pub fn like(column: &str, pattern: impl Into<Arg>) -> Self {
        Self::Like(column.to_string(), pattern.into())
    }

    pub fn ilike(column: &str, pattern: &str) -> Self {
        Self::ILike(column.to_string(), pattern.to_string())
    }

    pub fn in_list<I, A>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self::In(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn not_in_list<I, A>(column: &str, values: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self::NotIn(column.to_string(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(column: &str) -> Self {
        Self::IsNull(column.to_string())
    }

    pub fn is_not_null(column: &str) -> Self {
        Self::IsNotNull(column.to_string())
    }

    pub fn raw(sql: &str) -> Self {
        Self::Raw(sql.to_string(), Vec::new())
    }

    pub fn raw_with<I, A>(sql: &str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        Self::Raw(sql.to_string(), args.into_iter().map(Into::into).collect())
    }

    /// `column IN (subquery)`
    pub fn in_subquery(column: &str, subquery: &SelectBuilder) -> Self {
        let (sql, args) = subquery.to_parts();
        Self::Raw(format!("{column} IN ({sql})"), args)
    }

    /// `column NOT IN (subquery)`
    pub fn not_in_subquery(column: &str, subquery: &SelectBuilder) -> Self {
        let (sql, args) = subquery.to_parts();
        Self::Raw(format!("{column} NOT IN ({sql})"), args)
    }

    /// `EXISTS (subquery)`
    pub fn exists(subquery: &SelectBuilder) -> Self {
        let (sql, args) = subquery.to_parts();
        Self::Raw(format!("EXISTS ({sql})"), args)
    }

    /// `NOT EXISTS (subquery)`
    pub fn not_exists(subquery: &SelectBuilder) -> Self {
        let (sql, args) = subquery.to_parts();
        Self::Raw(format!("NOT EXISTS ({sql})"), args)
    }

    pub fn and(exprs: Vec<Expr>) -> Self {
        Self::And(exprs)
    }

    pub fn or(exprs: Vec<Expr>) -> Self {
        Self::Or(exprs)
    }

    pub fn not(expr: Expr) -> Self {
        Self::Not(Box::new(expr))
    }

    fn render(&self, dialect: Dialect, sql: &mut String, args: &mut Vec<Arg>) {
        let binary = |op: &str, column: &str, value: &Arg, sql: &mut String, args: &mut Vec<Arg>| {
            sql.push_str(column);
            sql.push(' ');
            sql.push_str(op);
            sql.push_str(" ?");
            args.push(value.clone());
        };

        match self {
            Self::Eq(c, v) => binary("=", c, v, sql, args),
            Self::NotEq(c, v) => binary("<>", c, v, sql, args),
            Self::Gt(c, v) => binary(">", c, v, sql, args),
            Self::Gte(c, v) => binary(">=", c, v, sql, args),
            Self::Lt(c, v) => binary("<", c, v, sql, args),
            Self::Lte(c, v) => binary("<=", c, v, sql, args),
            Self::Like(c, v) => binary("LIKE", c, v, sql, args),
            Self::ILike(c, pattern) => {
                sql.push_str(&dialect.ilike(c));
                args.push(Arg::Text(dialect.ilike_argument(pattern)));
            }
            Self::In(c, values) | Self::NotIn(c, values) => {
                let negated = matches!(self, Self::NotIn(..));
                if values.is_empty() {
                    // An empty IN list matches nothing; an empty NOT IN matches everything.
                    sql.push_str(if negated { "(1=1)" } else { "(1=0)" });
                    return;
                }
                sql.push_str(c);
                sql.push_str(if negated { " NOT IN (" } else { " IN (" });
                sql.push_str(&vec!["?"; values.len()].join(", "));
                sql.push(')');
                args.extend(values.iter().cloned());
            }
            Self::IsNull(c) => {
                sql.push_str(c);
                sql.push_str(" IS NULL");
            }
            Self::IsNotNull(c) => {
                sql.push_str(c);
                sql.push_str(" IS NOT NULL");
            }
            Self::Raw(raw, raw_args) => {
                sql.push_str(raw);
                args.extend(raw_args.iter().cloned());
            }
            Self::And(exprs) | Self::Or(exprs) => {
                let joiner = if matches!(self, Self::And(_)) { " AND " } else { " OR " };
                if exprs.is_empty() {
                    sql.push_str(if matches!(self, Self::And(_)) { "(1=1)" } else { "(1=0)" });
                    return;
                }
                sql.push('(');
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        sql.push_str(joiner);
                    }
                    expr.render(dialect, sql, args);
                }
                sql.push(')');
            }
            Self::Not(expr) => {
                sql.push_str("NOT (");
                expr.render(dialect, sql, args);
                sql.push(')');
            }
        }
    }
}

fn render_where(dialect: Dialect, filters: &[Expr], sql: &mut String, args: &mut Vec<Arg>) {
    if filters.is_empty() {
        return;
    }
    sql.push_str(" WHERE ");
    for (i, expr) in filters.iter().enumerate() {
        if i > 0 {
            sql.push_str(" AND ");
        }
        expr.render(dialect, sql, args);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone)]
struct Join {
    kind: JoinKind,
    clause: String,
    args: Vec<Arg>,
}

/// SELECT builder.
#[derive(Debug, Clone)]
pub struct SelectBuilder {
    dialect: Dialect,
    distinct: bool,
    columns: Vec<String>,
    from: String,
    from_args: Vec<Arg>,
    joins: Vec<Join>,
    filters: Vec<Expr>,
    group_by: Vec<String>,
    having: Vec<Expr>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
    suffix: Option<String>,
}

impl SelectBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            distinct: false,
            columns: Vec::new(),
            from: String::new(),
            from_args: Vec::new(),
            joins: Vec::new(),
            filters: Vec::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
            suffix: None,
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn column(mut self, column: &str) -> Self {
        self.columns.push(column.to_string());
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn from(mut self, table: &str) -> Self {
        self.from = table.to_string();
        self
    }

    /// `FROM (subquery) AS alias`
    pub fn from_subquery(mut self, subquery: &SelectBuilder, alias: &str) -> Self {
        let (sql, args) = subquery.to_parts();
        self.from = format!("({sql}) AS {alias}");
        self.from_args = args;
        self
    }

    /// `JOIN <clause>`, e.g. `"Bots ON Bots.UserId = Users.Id"`.
    pub fn join(mut self, clause: &str) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Inner,
            clause: clause.to_string(),
            args: Vec::new(),
        });
        self
    }

    pub fn left_join(mut self, clause: &str) -> Self {
        self.joins.push(Join {
            kind: JoinKind::Left,
            clause: clause.to_string(),
            args: Vec::new(),
        });
        self
    }

    /// LEFT JOIN whose clause carries `?` placeholders.
    pub fn left_join_with<I, A>(mut self, clause: &str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.joins.push(Join {
            kind: JoinKind::Left,
            clause: clause.to_string(),
            args: args.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// `LEFT JOIN (subquery) AS alias ON <on>`
    pub fn left_join_subquery(mut self, subquery: &SelectBuilder, alias: &str, on: &str) -> Self {
        let (sql, args) = subquery.to_parts();
        self.joins.push(Join {
            kind: JoinKind::Left,
            clause: format!("({sql}) AS {alias} ON {on}"),
            args,
        });
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    /// Add a predicate only when `condition` holds.
    pub fn where_if(self, condition: bool, expr: impl FnOnce() -> Expr) -> Self {
        if condition {
            self.where_(expr())
        } else {
            self
        }
    }

    pub fn group_by(mut self, columns: &[&str]) -> Self {
        self.group_by.extend(columns.iter().map(|c| c.to_string()));
        self
    }

    pub fn having(mut self, expr: Expr) -> Self {
        self.having.push(expr);
        self
    }

    /// `ORDER BY` term, e.g. `"CreateAt DESC"`.
    pub fn order_by(mut self, term: &str) -> Self {
        self.order_by.push(term.to_string());
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Raw suffix such as `FOR UPDATE`.
    pub fn suffix(mut self, suffix: &str) -> Self {
        self.suffix = Some(suffix.to_string());
        self
    }

    /// SQL with `?` placeholders and its arguments, for nesting.
    pub fn to_parts(&self) -> (String, Vec<Arg>) {
        let mut sql = String::from("SELECT ");
        let mut args = Vec::new();

        if self.distinct {
            sql.push_str("DISTINCT ");
        }
        if self.columns.is_empty() {
            sql.push('*');
        } else {
            sql.push_str(&self.columns.join(", "));
        }

        if !self.from.is_empty() {
            sql.push_str(" FROM ");
            sql.push_str(&self.from);
            args.extend(self.from_args.iter().cloned());
        }

        for join in &self.joins {
            sql.push_str(match join.kind {
                JoinKind::Inner => " JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            });
            sql.push_str(&join.clause);
            args.extend(join.args.iter().cloned());
        }

        render_where(self.dialect, &self.filters, &mut sql, &mut args);

        if !self.group_by.is_empty() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&self.group_by.join(", "));
        }

        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            for (i, expr) in self.having.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                expr.render(self.dialect, &mut sql, &mut args);
            }
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
        if let Some(suffix) = &self.suffix {
            sql.push(' ');
            sql.push_str(suffix);
        }

        (sql, args)
    }

    pub fn to_statement(&self) -> Statement {
        let (sql, args) = self.to_parts();
        Statement {
            sql: self.dialect.rebind(&sql),
            args,
        }
    }
}

/// INSERT builder.
#[derive(Debug, Clone)]
pub struct InsertBuilder {
    dialect: Dialect,
    table: String,
    ignore: bool,
    columns: Vec<String>,
    rows: Vec<Vec<Arg>>,
    suffix: Option<String>,
}

impl InsertBuilder {
    pub fn new(dialect: Dialect, table: &str) -> Self {
        Self {
            dialect,
            table: table.to_string(),
            ignore: false,
            columns: Vec::new(),
            rows: Vec::new(),
            suffix: None,
        }
    }

    pub fn columns(mut self, columns: &[&str]) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn values(mut self, row: Vec<Arg>) -> Self {
        self.rows.push(row);
        self
    }

    /// Skip rows that collide with an existing key.
    pub fn ignore_duplicates(mut self) -> Self {
        self.ignore = true;
        self
    }

    /// Turn the insert into an upsert on `conflict_columns`.
    pub fn upsert(mut self, conflict_columns: &[&str], update_columns: &[&str]) -> Self {
        self.suffix = Some(self.dialect.upsert_suffix(conflict_columns, update_columns));
        self
    }

    /// Whether no rows were added; an empty insert must not be executed.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn to_statement(&self) -> Statement {
        let keyword = if self.ignore {
            self.dialect.insert_ignore_keyword()
        } else {
            "INSERT"
        };
        let row_placeholders = format!("({})", vec!["?"; self.columns.len()].join(", "));
        let values = vec![row_placeholders; self.rows.len()].join(", ");

        let mut sql = format!(
            "{keyword} INTO {} ({}) VALUES {values}",
            self.table,
            self.columns.join(", ")
        );

        let suffix = match (&self.suffix, self.ignore) {
            (Some(s), _) => Some(s.as_str()),
            (None, true) => Some(self.dialect.insert_ignore_suffix()),
            (None, false) => None,
        };
        if let Some(suffix) = suffix.filter(|s| !s.is_empty()) {
            sql.push(' ');
            sql.push_str(suffix);
        }

        Statement {
            sql: self.dialect.rebind(&sql),
            args: self.rows.iter().flatten().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone)]
enum SetValue {
    Arg(Arg),
    Raw(String, Vec<Arg>),
}

/// UPDATE builder.
#[derive(Debug, Clone)]
pub struct UpdateBuilder {
    dialect: Dialect,
    table: String,
    sets: Vec<(String, SetValue)>,
    filters: Vec<Expr>,
}

impl UpdateBuilder {
    pub fn new(dialect: Dialect, table: &str) -> Self {
        Self {
            dialect,
            table: table.to_string(),
            sets: Vec::new(),
            filters: Vec::new(),
        }
    }

    pub fn set(mut self, column: &str, value: impl Into<Arg>) -> Self {
        self.sets.push((column.to_string(), SetValue::Arg(value.into())));
        self
    }

    /// `column = <raw expression>`
    pub fn set_raw<I, A>(mut self, column: &str, expression: &str, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.sets.push((
            column.to_string(),
            SetValue::Raw(
                expression.to_string(),
                args.into_iter().map(Into::into).collect(),
            ),
        ));
        self
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    pub fn to_statement(&self) -> Statement {
        let mut sql = format!("UPDATE {} SET ", self.table);
        let mut args = Vec::new();

        for (i, (column, value)) in self.sets.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(column);
            sql.push_str(" = ");
            match value {
                SetValue::Arg(arg) => {
                    sql.push('?');
                    args.push(arg.clone());
                }
                SetValue::Raw(expression, raw_args) => {
                    sql.push_str(expression);
                    args.extend(raw_args.iter().cloned());
                }
            }
        }

        render_where(self.dialect, &self.filters, &mut sql, &mut args);

        Statement {
            sql: self.dialect.rebind(&sql),
            args,
        }
    }
}

/// DELETE builder.
#[derive(Debug, Clone)]
pub struct DeleteBuilder {
    dialect: Dialect,
    table: String,
    filters: Vec<Expr>,
}

impl DeleteBuilder {
    pub fn new(dialect: Dialect, table: &str) -> Self {
        Self {
            dialect,
            table: table.to_string(),
            filters: Vec::new(),
        }
    }

    pub fn where_(mut self, expr: Expr) -> Self {
        self.filters.push(expr);
        self
    }

    pub fn to_statement(&self) -> Statement {
        let mut sql = format!("DELETE FROM {}", self.table);
        let mut args = Vec::new();
        render_where(self.dialect, &self.filters, &mut sql, &mut args);
        Statement {
            sql: self.dialect.rebind(&sql),
            args,
        }
    }
}

/// Entry point handing out builders bound to one dialect.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder {
    dialect: Dialect,
}

impl QueryBuilder {
    pub fn new(dialect: Dialect) -> Self {
        Self { dialect }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn select(&self, columns: &[&str]) -> SelectBuilder {
        SelectBuilder::new(self.dialect).columns(columns)
    }

    pub fn insert(&self, table: &str) -> InsertBuilder {
        InsertBuilder::new(self.dialect, table)
    }

    pub fn update(&self, table: &str) -> UpdateBuilder {
        UpdateBuilder::new(self.dialect, table)
    }

    pub fn delete(&self, table: &str) -> DeleteBuilder {
        DeleteBuilder::new(self.dialect, table)
    }

    /// Raw statement written with `?` placeholders.
    pub fn raw(&self, sql: &str) -> Statement {
        Statement::new(self.dialect, sql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn pg() -> QueryBuilder {
        QueryBuilder::new(Dialect::Postgres)
    }

    fn my() -> QueryBuilder {
        QueryBuilder::new(Dialect::MySql)
    }

    #[test]
    fn test_select_with_join_order_limit() {
        let stmt = pg()
            .select(&["b.UserId", "u.Username"])
            .from("Bots b")
            .join("Users u ON u.Id = b.UserId")
            .where_(Expr::eq("b.OwnerId", "o1"))
            .where_(Expr::eq("b.DeleteAt", 0_i64))
            .order_by("b.CreateAt ASC")
            .order_by("b.UserId ASC")
            .limit(10)
            .offset(20)
            .to_statement();

        assert_eq!(
            stmt.sql,
            "SELECT b.UserId, u.Username FROM Bots b JOIN Users u ON u.Id = b.UserId \
             WHERE b.OwnerId = $1 AND b.DeleteAt = $2 ORDER BY b.CreateAt ASC, b.UserId ASC LIMIT 10 OFFSET 20"
        );
        assert_eq!(stmt.args, vec![Arg::from("o1"), Arg::Int(0)]);
    }

    #[test]
    fn test_select_mysql_placeholders() {
        let stmt = my()
            .select(&["Id"])
            .from("Jobs")
            .where_(Expr::in_list("Status", ["pending", "in_progress"]))
            .where_(Expr::eq("Type", "export"))
            .to_statement();
        assert_eq!(stmt.sql, "SELECT Id FROM Jobs WHERE Status IN (?, ?) AND Type = ?");
        assert_eq!(stmt.args.len(), 3);
    }

    #[test]
    fn test_empty_in_matches_nothing() {
        let stmt = pg()
            .select(&["Id"])
            .from("Users")
            .where_(Expr::in_list::<Vec<String>, String>("Id", vec![]))
            .to_statement();
        assert_eq!(stmt.sql, "SELECT Id FROM Users WHERE (1=0)");
        assert!(stmt.args.is_empty());
    }

    #[test]
    fn test_or_and_not_tree() {
        let stmt = pg()
            .select(&["Id"])
            .from("Users")
            .where_(Expr::or(vec![
                Expr::gte("CreateAt", 5_i64),
                Expr::and(vec![Expr::lt("UpdateAt", 3_i64), Expr::not(Expr::is_null("DeleteAt"))]),
            ]))
            .to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT Id FROM Users WHERE (CreateAt >= $1 OR (UpdateAt < $2 AND NOT (DeleteAt IS NULL)))"
        );
    }

    #[test]
    fn test_ilike_per_dialect() {
        let pg_stmt = pg()
            .select(&["Id"])
            .from("Users u")
            .where_(Expr::ilike("u.Roles", "%System_Admin%"))
            .to_statement();
        assert_eq!(pg_stmt.sql, "SELECT Id FROM Users u WHERE u.Roles ILIKE $1");
        assert_eq!(pg_stmt.args, vec![Arg::from("%System_Admin%")]);

        let my_stmt = my()
            .select(&["Id"])
            .from("Users u")
            .where_(Expr::ilike("u.Roles", "%System_Admin%"))
            .to_statement();
        assert_eq!(my_stmt.sql, "SELECT Id FROM Users u WHERE LOWER(u.Roles) LIKE ?");
        assert_eq!(my_stmt.args, vec![Arg::from("%system_admin%")]);
    }

    #[test]
    fn test_subquery_arguments_are_ordered() {
        let inner = pg()
            .select(&["ChannelId"])
            .from("ChannelMembers")
            .where_(Expr::eq("UserId", "u1"));
        let stmt = pg()
            .select(&["Id"])
            .from("Channels")
            .where_(Expr::eq("TeamId", "t1"))
            .where_(Expr::in_subquery("Id", &inner))
            .where_(Expr::eq("DeleteAt", 0_i64))
            .to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT Id FROM Channels WHERE TeamId = $1 AND Id IN (SELECT ChannelId FROM ChannelMembers WHERE UserId = $2) AND DeleteAt = $3"
        );
        assert_eq!(stmt.args, vec![Arg::from("t1"), Arg::from("u1"), Arg::Int(0)]);
    }

    #[test]
    fn test_group_by_having() {
        let stmt = my()
            .select(&["ChannelId", "COUNT(*) AS Total"])
            .from("ChannelMembers")
            .group_by(&["ChannelId"])
            .having(Expr::raw_with("COUNT(*) > ?", [1_i64]))
            .to_statement();
        assert_eq!(
            stmt.sql,
            "SELECT ChannelId, COUNT(*) AS Total FROM ChannelMembers GROUP BY ChannelId HAVING COUNT(*) > ?"
        );
    }

    #[test]
    fn test_insert_multiple_rows() {
        let stmt = pg()
            .insert("RetentionPoliciesChannels")
            .columns(&["PolicyId", "ChannelId"])
            .values(vec!["p1".into(), "c1".into()])
            .values(vec!["p1".into(), "c2".into()])
            .to_statement();
        assert_eq!(
            stmt.sql,
            "INSERT INTO RetentionPoliciesChannels (PolicyId, ChannelId) VALUES ($1, $2), ($3, $4)"
        );
        assert_eq!(stmt.args.len(), 4);
    }

    #[test]
    fn test_insert_upsert_per_dialect() {
        let build = |qb: QueryBuilder| {
            qb.insert("Preferences")
                .columns(&["UserId", "Category", "Name", "Value"])
                .values(vec!["u".into(), "c".into(), "n".into(), "v".into()])
                .upsert(&["UserId", "Category", "Name"], &["Value"])
                .to_statement()
                .sql
        };
        assert_eq!(
            build(pg()),
            "INSERT INTO Preferences (UserId, Category, Name, Value) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (UserId, Category, Name) DO UPDATE SET Value = EXCLUDED.Value"
        );
        assert_eq!(
            build(my()),
            "INSERT INTO Preferences (UserId, Category, Name, Value) VALUES (?, ?, ?, ?) \
             ON DUPLICATE KEY UPDATE Value = VALUES(Value)"
        );
    }

    #[test]
    fn test_insert_ignore_per_dialect() {
        let build = |qb: QueryBuilder| {
            qb.insert("SidebarChannels")
                .columns(&["ChannelId", "UserId", "CategoryId", "SortOrder"])
                .values(vec!["c".into(), "u".into(), "cat".into(), 0_i64.into()])
                .ignore_duplicates()
                .to_statement()
                .sql
        };
        assert_eq!(
            build(pg()),
            "INSERT INTO SidebarChannels (ChannelId, UserId, CategoryId, SortOrder) VALUES ($1, $2, $3, $4) ON CONFLICT DO NOTHING"
        );
        assert_eq!(
            build(my()),
            "INSERT IGNORE INTO SidebarChannels (ChannelId, UserId, CategoryId, SortOrder) VALUES (?, ?, ?, ?)"
        );
    }

    #[test]
    fn test_update_with_raw_set() {
        let stmt = pg()
            .update("Threads")
            .set_raw("ReplyCount", "ReplyCount + ?", [1_i64])
            .set("LastReplyAt", 42_i64)
            .where_(Expr::eq("PostId", "p1"))
            .to_statement();
        assert_eq!(
            stmt.sql,
            "UPDATE Threads SET ReplyCount = ReplyCount + $1, LastReplyAt = $2 WHERE PostId = $3"
        );
        assert_eq!(stmt.args, vec![Arg::Int(1), Arg::Int(42), Arg::from("p1")]);
    }

    #[test]
    fn test_delete() {
        let stmt = my()
            .delete("SidebarChannels")
            .where_(Expr::eq("CategoryId", "cat1"))
            .to_statement();
        assert_eq!(stmt.sql, "DELETE FROM SidebarChannels WHERE CategoryId = ?");
    }

    #[test]
    fn test_select_for_update_suffix() {
        let stmt = pg()
            .select(&["Id"])
            .from("SidebarCategories")
            .where_(Expr::eq("Id", "c"))
            .suffix("FOR UPDATE")
            .to_statement();
        assert_eq!(stmt.sql, "SELECT Id FROM SidebarCategories WHERE Id = $1 FOR UPDATE");
    }
}
