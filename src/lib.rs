//! # sqlmint — entity-driven SQL with named parameters
//!
//! sqlmint turns record types into canonical CRUD statements and turns SQL
//! text with `#{name}` placeholders into dialect-correct positional SQL plus
//! an ordered parameter list for your driver.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use sqlmint::prelude::*;
//!
//! #[derive(Entity)]
//! #[sql(table = "users")]
//! struct User {
//!     #[sql(autoincr)]
//!     id: i64,
//!     email: String,
//!     created_at: DateTime<Utc>,
//!     updated_at: DateTime<Utc>,
//! }
//!
//! let sql = generate_update_sql::<User>(Dialect::Postgres, &["id"])?;
//! // => "UPDATE users SET email=#{email}, updated_at=now() WHERE id=#{id}"
//!
//! let session = Session::new(Dialect::Postgres);
//! session.register_generated::<User>("user.update", StatementKind::Update, &["id"])?;
//! let bound = session.update("user.update", &["email", "id"], &["a@b.c".into(), 7.into()])?;
//! // bound.sql    == "UPDATE users SET email=$1, updated_at=now() WHERE id=$2"
//! // bound.params == ["a@b.c", 7]
//! ```
//!
//! ## Placeholders
//!
//! | Source      | Question style | Dollar style |
//! |-------------|----------------|--------------|
//! | `#{name}`   | `?`            | `$1`, `$2`…  |
//! | `##`        | `#`            | `#`          |
//! | `??`        | `?`            | `??`         |

pub mod binder;
pub mod config;
pub mod dialect;
#[cfg(feature = "sqlx")]
pub mod driver;
pub mod engine;
pub mod entity;
pub mod error;
pub mod generator;
pub mod mapper;
pub mod parser;
pub mod statement;
pub mod template;
pub mod value;

pub use entity::Entity;
pub use sqlmint_derive::Entity;

pub mod prelude {
    pub use crate::Entity;
    pub use crate::config::Config;
    pub use crate::dialect::{BindStyle, Dialect, InsertId};
    pub use crate::engine::{BoundStatement, Session};
    pub use crate::entity::{EntitySchema, FieldDef, Shape};
    pub use crate::error::*;
    pub use crate::generator::{
        generate_delete_sql, generate_insert_sql, generate_select_sql, generate_update_sql,
    };
    pub use crate::mapper::{Mapper, read_table_name, register_table_name};
    pub use crate::parser::compile;
    pub use crate::statement::{MappedStatement, ResultShape, StatementKind};
    pub use crate::value::Value;
}

/// Compile SQL text with `#{name}` placeholders.
///
/// # Example
///
/// ```
/// let q = sqlmint::compile("SELECT * FROM users WHERE id = #{id}").unwrap();
/// assert_eq!(q.bind_names, vec!["id"]);
/// assert_eq!(q.fragments.len(), 2);
/// ```
pub fn compile(sql: &str) -> Result<parser::CompiledNamedQuery, error::MintError> {
    parser::compile(sql)
}
