use sqlx::any::{Any, AnyArguments, AnyRow};
use sqlx::query::Query;
use sqlx::FromRow;

/// A scalar bound into a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Bound as an `INT8`-typed NULL. SQLite accepts it for any column;
    /// PostgreSQL rejects it for non-integer columns, so there bind a typed
    /// NULL through the query directly.
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Real(value)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// A type mapped onto one table, keyed by an integer primary key.
///
/// Rows decode through `sqlx::FromRow`, so `#[derive(sqlx::FromRow)]` is
/// usually all that is needed besides this impl.
///
/// ```ignore
/// #[derive(Debug, Clone, sqlx::FromRow)]
/// struct Account { id: i64, owner: String, balance: i64 }
///
/// impl Record for Account {
///     const TABLE: &'static str = "accounts";
///     const COLUMNS: &'static [&'static str] = &["id", "owner", "balance"];
///
///     fn primary_key(&self) -> i64 { self.id }
///
///     fn values(&self) -> Vec<Value> {
///         vec![self.id.into(), self.owner.clone().into(), self.balance.into()]
///     }
/// }
/// ```
pub trait Record: for<'r> FromRow<'r, AnyRow> + Clone + Send + 'static {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str = "id";
    /// Every mapped column, primary key included, in `values()` order.
    const COLUMNS: &'static [&'static str];

    fn primary_key(&self) -> i64;

    fn values(&self) -> Vec<Value>;
}

pub(crate) fn insert_sql<M: Record>() -> String {
    let placeholders = (1..=M::COLUMNS.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({})",
        M::TABLE,
        M::COLUMNS.join(", "),
        placeholders
    )
}

pub(crate) fn select_by_pk_sql<M: Record>() -> String {
    format!(
        "SELECT {} FROM {} WHERE {} = $1",
        M::COLUMNS.join(", "),
        M::TABLE,
        M::PRIMARY_KEY
    )
}

pub(crate) fn bind_values<'q>(
    mut query: Query<'q, Any, AnyArguments<'q>>,
    values: &[Value],
) -> Query<'q, Any, AnyArguments<'q>> {
    for value in values {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Bool(b) => query.bind(*b),
            Value::Int(i) => query.bind(*i),
            Value::Real(f) => query.bind(*f),
            Value::Text(s) => query.bind(s.clone()),
        };
    }
    query
}
