//! Driver hand-off through sqlx.
//!
//! Builds an sqlx `Any` query from a [`BoundStatement`]. Running it, pooling
//! and transactions stay with the caller.

use sqlx::any::{Any, AnyArguments};
use sqlx::query::Query;

use crate::engine::BoundStatement;
use crate::value::Value;

impl BoundStatement {
    /// An sqlx query with every parameter bound in order.
    ///
    /// Timestamps travel as RFC 3339 text and composites as JSON text.
    pub fn to_any_query(&self) -> Query<'_, Any, AnyArguments<'_>> {
        let mut query = sqlx::query(&self.sql);

        for param in &self.params {
            query = match param {
                Value::Null => query.bind(None::<String>),
                Value::Bool(v) => query.bind(*v),
                Value::Int(v) => query.bind(*v),
                Value::Float(v) => query.bind(*v),
                Value::String(v) => query.bind(v.as_str()),
                Value::Bytes(v) => query.bind(v.as_slice()),
                Value::Timestamp(v) => query.bind(v.to_rfc3339()),
                Value::List(_) | Value::Map(_) => {
                    query.bind(serde_json::to_string(param).unwrap_or_default())
                }
            };
        }

        query
    }
}
