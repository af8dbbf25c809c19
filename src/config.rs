//! TOML configuration.
//!
//! ```toml
//! driver = "postgres"
//! show_sql = true
//! include = ["users.toml"]
//!
//! [[statements]]
//! id = "user.by_id"
//! kind = "select"
//! result = "struct"
//! sql = "SELECT * FROM users WHERE id = #{id}"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{MintError, MintResult};
use crate::statement::{ResultShape, StatementKind};

/// Session configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Driver name, resolved with `Dialect::from_driver`.
    pub driver: String,
    pub show_sql: bool,
    pub start_index: usize,
    /// Further statement files, relative to this file.
    pub include: Vec<PathBuf>,
    pub statements: Vec<StatementDef>,
}

/// One `[[statements]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StatementDef {
    pub id: String,
    pub kind: StatementKind,
    #[serde(default)]
    pub result: ResultShape,
    pub sql: String,
}

impl Config {
    /// `<config dir>/sqlmint/sqlmint.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("sqlmint").join("sqlmint.toml"))
    }

    /// Parse configuration text. Includes are not followed.
    pub fn from_toml(text: &str) -> MintResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a configuration file and the statement files it includes.
    pub fn load(path: impl AsRef<Path>) -> MintResult<Self> {
        let mut stack = Vec::new();
        Self::load_nested(path.as_ref(), &mut stack)
    }

    fn load_nested(path: &Path, stack: &mut Vec<PathBuf>) -> MintResult<Self> {
        let canonical = fs::canonicalize(path)?;
        if stack.contains(&canonical) {
            return Err(MintError::Config(format!(
                "include cycle through '{}'",
                path.display()
            )));
        }

        let mut config = Self::from_toml(&fs::read_to_string(path)?)?;
        tracing::debug!(
            "loaded {} statements from {}",
            config.statements.len(),
            path.display()
        );

        stack.push(canonical);
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for include in std::mem::take(&mut config.include) {
            let nested = Self::load_nested(&base.join(&include), stack)?;
            config.statements.extend(nested.statements);
        }
        stack.pop();

        config.check_unique_ids()?;
        Ok(config)
    }

    fn check_unique_ids(&self) -> MintResult<()> {
        let mut seen = std::collections::HashSet::new();
        for def in &self.statements {
            if !seen.insert(def.id.as_str()) {
                return Err(MintError::Config(format!("duplicate statement id '{}'", def.id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_toml() {
        let config = Config::from_toml(
            r#"
driver = "mysql"
show_sql = true

[[statements]]
id = "a"
kind = "select"
result = "list"
sql = "SELECT * FROM t"

[[statements]]
id = "b"
kind = "delete"
sql = "DELETE FROM t WHERE id = #{id}"
"#,
        )
        .unwrap();

        assert_eq!(config.driver, "mysql");
        assert!(config.show_sql);
        assert_eq!(config.start_index, 0);
        assert_eq!(config.statements.len(), 2);
        assert_eq!(config.statements[0].result, ResultShape::List);
        assert_eq!(config.statements[1].kind, StatementKind::Delete);
        assert_eq!(config.statements[1].result, ResultShape::None);
    }

    #[test]
    fn test_rejects_unknown_kind() {
        let err = Config::from_toml("[[statements]]\nid = \"a\"\nkind = \"merge\"\nsql = \"\"\n");
        assert!(matches!(err, Err(MintError::Toml(_))));
    }

    #[test]
    fn test_load_with_include() {
        let dir = std::env::temp_dir().join(format!("sqlmint-config-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("main.toml"),
            "driver = \"postgres\"\ninclude = [\"users.toml\"]\n",
        )
        .unwrap();
        fs::write(
            dir.join("users.toml"),
            "[[statements]]\nid = \"user.all\"\nkind = \"select\"\nsql = \"SELECT * FROM users\"\n",
        )
        .unwrap();

        let config = Config::load(dir.join("main.toml")).unwrap();
        assert_eq!(config.driver, "postgres");
        assert_eq!(config.statements.len(), 1);
        assert_eq!(config.statements[0].id, "user.all");

        fs::remove_dir_all(&dir).unwrap();
    }
}
