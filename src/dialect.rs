//! Dialect registry.
//!
//! Maps a driver name to a [`Dialect`] and exposes the per-dialect behavior
//! the rest of the crate needs: placeholder style, how generated keys come
//! back from an INSERT, and the "current timestamp" fragment.

use std::fmt;

/// Supported database dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Dialect {
    #[default]
    None,
    Postgres,
    MySQL,
    MSSQL,
    Oracle,
}

/// How positional placeholders are written in the final SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindStyle {
    /// `?`
    Question,
    /// `$1`, `$2`, ...
    Dollar,
}

/// How the key generated by an INSERT is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertId {
    /// First column of the first row returned by `INSERT ... RETURNING`.
    Returning,
    /// The driver's native last-insert-id facility.
    LastInsertId,
}

impl Dialect {
    pub const ALL: [Dialect; 5] = [
        Dialect::None,
        Dialect::Postgres,
        Dialect::MySQL,
        Dialect::MSSQL,
        Dialect::Oracle,
    ];

    /// Resolve a driver name (case-insensitive). Unknown names map to [`Dialect::None`].
    pub fn from_driver(driver: &str) -> Self {
        match driver.to_ascii_lowercase().as_str() {
            "postgres" => Dialect::Postgres,
            "mysql" => Dialect::MySQL,
            "mssql" | "sqlserver" => Dialect::MSSQL,
            "oracle" | "ora" => Dialect::Oracle,
            _ => Dialect::None,
        }
    }

    /// Canonical driver name.
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::None => "",
            Dialect::Postgres => "postgres",
            Dialect::MySQL => "mysql",
            Dialect::MSSQL => "mssql",
            Dialect::Oracle => "oracle",
        }
    }

    pub fn bind_style(&self) -> BindStyle {
        match self {
            Dialect::Postgres => BindStyle::Dollar,
            _ => BindStyle::Question,
        }
    }

    pub fn insert_id(&self) -> InsertId {
        match self {
            Dialect::Postgres | Dialect::MSSQL => InsertId::Returning,
            _ => InsertId::LastInsertId,
        }
    }

    /// Whether generated INSERT statements may carry a `RETURNING` clause.
    pub fn supports_returning(&self) -> bool {
        self.insert_id() == InsertId::Returning
    }

    /// SQL expression for the current timestamp.
    pub fn now(&self) -> &'static str {
        match self {
            Dialect::Postgres => "now()",
            _ => "CURRENT_TIMESTAMP",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::None => write!(f, "none"),
            other => write!(f, "{}", other.name()),
        }
    }
}

impl BindStyle {
    /// Rewrite `?` placeholders for this style.
    ///
    /// `??` is an escaped literal `?` in both styles.
    pub fn replace_placeholders(&self, sql: &str) -> String {
        self.replace_placeholders_from(sql, 0)
    }

    /// Like [`replace_placeholders`](Self::replace_placeholders), with dollar
    /// numbering starting at `start_index + 1`.
    pub fn replace_placeholders_from(&self, sql: &str, start_index: usize) -> String {
        let mut out = String::with_capacity(sql.len() + 8);
        let mut index = start_index;
        let mut rest = sql;

        while let Some(p) = rest.find('?') {
            out.push_str(&rest[..p]);
            if rest[p..].starts_with("??") {
                out.push('?');
                rest = &rest[p + 2..];
                continue;
            }
            match self {
                BindStyle::Question => out.push('?'),
                BindStyle::Dollar => {
                    index += 1;
                    out.push('$');
                    out.push_str(&index.to_string());
                }
            }
            rest = &rest[p + 1..];
        }

        out.push_str(rest);
        out
    }
}

/// `count` question-mark placeholders joined with commas.
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}
