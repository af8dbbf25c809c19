//! Error types for sqlmint.

use thiserror::Error;

use crate::statement::StatementKind;

/// The main error type for sqlmint operations.
#[derive(Debug, Error)]
pub enum MintError {
    /// A record type could not be resolved to a table or column set.
    #[error("Mapping error for '{type_name}': {message}")]
    Mapping {
        type_name: &'static str,
        message: String,
    },

    /// Malformed named placeholder in SQL text.
    #[error("Parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    /// Template parsing or expansion failed.
    #[error("Template error at position {position}: {message}")]
    Template { position: usize, message: String },

    /// A named reference could not be bound or the arguments have the wrong shape.
    #[error("Bind error: {0}")]
    Bind(String),

    /// No statement registered under the identifier.
    #[error("Statement '{0}' not found")]
    UnknownStatement(String),

    /// The statement exists but was registered for another operation.
    #[error("Statement '{id}' is a {actual} statement, expected {expected}")]
    StatementKind {
        id: String,
        expected: StatementKind,
        actual: StatementKind,
    },

    /// Failure while preparing a registered statement.
    #[error("sql '{id}' error: {source}")]
    Statement {
        id: String,
        #[source]
        source: Box<MintError>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML decode error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// JSON conversion error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl MintError {
    /// Create a parse error at the given position.
    pub fn parse(position: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            position,
            message: message.into(),
        }
    }

    /// Create a template error at the given position.
    pub fn template(position: usize, message: impl Into<String>) -> Self {
        Self::Template {
            position,
            message: message.into(),
        }
    }

    /// Create a mapping error for a type.
    pub fn mapping(type_name: &'static str, message: impl Into<String>) -> Self {
        Self::Mapping {
            type_name,
            message: message.into(),
        }
    }

    /// Create a bind error.
    pub fn bind(message: impl Into<String>) -> Self {
        Self::Bind(message.into())
    }

    /// Attach a statement identifier, keeping this error as the cause.
    pub fn in_statement(self, id: impl Into<String>) -> Self {
        Self::Statement {
            id: id.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping statement wrappers.
    pub fn root_cause(&self) -> &MintError {
        match self {
            Self::Statement { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for sqlmint operations.
pub type MintResult<T> = Result<T, MintError>;
