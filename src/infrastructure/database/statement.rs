//! SQL statements with ordered arguments.

use sqlx::any::AnyArguments;
use sqlx::query::Query;
use sqlx::Any;

use super::dialect::Dialect;

/// A bound argument.
///
/// The `Null*` variants keep the parameter type so PostgreSQL can resolve the
/// placeholder without an explicit cast.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Text(String),
    Int(i64),
    Bool(bool),
    Float(f64),
    NullText,
    NullInt,
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<&String> for Arg {
    fn from(v: &String) -> Self {
        Arg::Text(v.clone())
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<i32> for Arg {
    fn from(v: i32) -> Self {
        Arg::Int(i64::from(v))
    }
}

impl From<u32> for Arg {
    fn from(v: u32) -> Self {
        Arg::Int(i64::from(v))
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Float(v)
    }
}

impl From<Option<i64>> for Arg {
    fn from(v: Option<i64>) -> Self {
        v.map_or(Arg::NullInt, Arg::Int)
    }
}

impl From<Option<String>> for Arg {
    fn from(v: Option<String>) -> Self {
        v.map_or(Arg::NullText, Arg::Text)
    }
}

impl Arg {
    /// Text argument that is stored as NULL when empty. Used for columns
    /// whose uniqueness must ignore blank values (e.g. `Users.AuthData`).
    pub fn text_or_null(v: &str) -> Self {
        if v.is_empty() {
            Arg::NullText
        } else {
            Arg::Text(v.to_string())
        }
    }
}

/// Final SQL text in the dialect's placeholder style plus its arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Arg>,
}

impl Statement {
    /// Build a statement from SQL written with `?` placeholders.
    pub fn new(dialect: Dialect, sql: &str) -> Self {
        Self {
            sql: dialect.rebind(sql),
            args: Vec::new(),
        }
    }

    /// Append an argument.
    pub fn bind(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments.
    pub fn bind_all<I, A>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Arg>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Turn the statement into a bound sqlx query.
    pub(crate) fn query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        let mut query = sqlx::query(&self.sql);
        for arg in &self.args {
            query = match arg {
                Arg::Text(v) => query.bind(v.as_str()),
                Arg::Int(v) => query.bind(*v),
                Arg::Bool(v) => query.bind(*v),
                Arg::Float(v) => query.bind(*v),
                Arg::NullText => query.bind(None::<String>),
                Arg::NullInt => query.bind(None::<i64>),
            };
        }
        query
    }
}

/// `?, ?, ?` for `n` arguments.
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
