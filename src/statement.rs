//! Mapped statements.
//!
//! A [`MappedStatement`] ties an identifier to its SQL body, the operation
//! it performs and the shape of result the caller expects.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

use crate::binder::render;
use crate::dialect::BindStyle;
use crate::error::{MintError, MintResult};
use crate::parser::compile;
use crate::template::{Template, is_template};

/// The operation a statement performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
}

/// The result shape the caller expects from a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultShape {
    #[default]
    None,
    Scalar,
    Struct,
    Map,
    List,
}

/// A statement body compiled for both placeholder styles.
#[derive(Debug, Clone)]
pub struct CompiledSql {
    pub question_sql: String,
    pub dollar_sql: String,
    pub bind_names: Vec<String>,
}

impl CompiledSql {
    pub fn sql(&self, style: BindStyle) -> &str {
        match style {
            BindStyle::Question => &self.question_sql,
            BindStyle::Dollar => &self.dollar_sql,
        }
    }
}

/// The SQL body of a statement.
#[derive(Debug, Clone)]
pub enum StatementBody {
    /// Literal SQL without named placeholders.
    Raw(String),
    /// Named query compiled once at registration.
    Compiled(CompiledSql),
    /// Template expanded against the arguments on every call.
    Template(Template),
}

#[derive(Debug, Clone)]
pub struct MappedStatement {
    pub id: String,
    pub kind: StatementKind,
    pub result: ResultShape,
    pub body: StatementBody,
}

impl MappedStatement {
    /// Build a statement from SQL text.
    ///
    /// Text containing `{{` becomes a template; text with `#{name}`
    /// placeholders is compiled with the dollar numbering starting at
    /// `start_index + 1`; anything else is kept raw.
    pub fn new(
        id: impl Into<String>,
        kind: StatementKind,
        result: ResultShape,
        sql: &str,
        start_index: usize,
    ) -> MintResult<Self> {
        let id = id.into();
        let body = Self::body(sql, start_index).map_err(|e| e.in_statement(id.clone()))?;
        Ok(Self {
            id,
            kind,
            result,
            body,
        })
    }

    fn body(sql: &str, start_index: usize) -> MintResult<StatementBody> {
        if is_template(sql) {
            return Ok(StatementBody::Template(Template::parse(sql)?));
        }

        let compiled = compile(sql)?;
        if !compiled.has_bindings() {
            return Ok(StatementBody::Raw(sql.to_string()));
        }

        Ok(StatementBody::Compiled(CompiledSql {
            question_sql: render(BindStyle::Question, &compiled.fragments, start_index),
            dollar_sql: render(BindStyle::Dollar, &compiled.fragments, start_index),
            bind_names: compiled.bind_names,
        }))
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Insert => write!(f, "insert"),
            StatementKind::Update => write!(f, "update"),
            StatementKind::Delete => write!(f, "delete"),
            StatementKind::Select => write!(f, "select"),
        }
    }
}

impl FromStr for StatementKind {
    type Err = MintError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "insert" => Ok(StatementKind::Insert),
            "update" => Ok(StatementKind::Update),
            "delete" => Ok(StatementKind::Delete),
            "select" => Ok(StatementKind::Select),
            other => Err(MintError::Config(format!("unknown statement kind '{}'", other))),
        }
    }
}
