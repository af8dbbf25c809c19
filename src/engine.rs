//! Statement resolution engine.
//!
//! A [`Session`] holds the registered statements for one dialect and turns
//! a statement identifier plus caller arguments into final SQL and an
//! ordered parameter list. Executing that SQL is left to the driver.

use std::sync::Arc;

use dashmap::DashMap;

use crate::binder::{bind_compiled, bind_values, normalize_args};
use crate::config::Config;
use crate::dialect::{Dialect, InsertId};
use crate::entity::Entity;
use crate::error::{MintError, MintResult};
use crate::mapper::Mapper;
use crate::parser::compile_cached;
use crate::statement::{MappedStatement, ResultShape, StatementBody, StatementKind};
use crate::value::Value;

/// SQL and parameters ready for a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundStatement {
    pub id: String,
    pub kind: StatementKind,
    pub sql: String,
    pub params: Vec<Value>,
    pub result: ResultShape,
    /// How an INSERT hands back its generated key.
    pub insert_id: Option<InsertId>,
}

/// Registered statements for one dialect.
pub struct Session {
    dialect: Dialect,
    statements: DashMap<String, Arc<MappedStatement>>,
    show_sql: bool,
    start_index: usize,
}

impl Session {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            statements: DashMap::new(),
            show_sql: false,
            start_index: 0,
        }
    }

    /// Build a session from configuration, registering its statements.
    pub fn from_config(config: &Config) -> MintResult<Self> {
        let session = Self::new(Dialect::from_driver(&config.driver))
            .with_show_sql(config.show_sql)
            .with_start_index(config.start_index);

        for def in &config.statements {
            session.register(MappedStatement::new(
                def.id.as_str(),
                def.kind,
                def.result,
                &def.sql,
                session.start_index,
            )?);
        }

        tracing::debug!(
            "session for '{}' loaded {} statements",
            session.dialect,
            session.statements.len()
        );
        Ok(session)
    }

    /// Log every bound statement at info level.
    pub fn with_show_sql(mut self, show_sql: bool) -> Self {
        self.show_sql = show_sql;
        self
    }

    /// Offset for dollar numbering, for SQL embedded in a larger statement.
    ///
    /// Applies to raw and template statements and to statements registered
    /// through this session after the call.
    pub fn with_start_index(mut self, start_index: usize) -> Self {
        self.start_index = start_index;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statement(&self, id: &str) -> Option<Arc<MappedStatement>> {
        self.statements.get(id).map(|s| Arc::clone(s.value()))
    }

    /// Register a statement, replacing any previous one with the same id.
    pub fn register(&self, statement: MappedStatement) {
        if self.statements.contains_key(&statement.id) {
            tracing::warn!("statement '{}' registered twice, keeping the latest", statement.id);
        }
        self.statements.insert(statement.id.clone(), Arc::new(statement));
    }

    /// Register a CRUD statement generated from `E`.
    ///
    /// `where_names` feeds the WHERE clause of UPDATE, DELETE and SELECT and
    /// is ignored for INSERT, which keeps `RETURNING` where the dialect has it
    /// (see [`register_generated_insert`](Self::register_generated_insert)).
    pub fn register_generated<E: Entity>(
        &self,
        id: impl Into<String>,
        kind: StatementKind,
        where_names: &[&str],
    ) -> MintResult<()> {
        let id = id.into();
        let mapper = Mapper::global();
        let (sql, result) = match kind {
            StatementKind::Insert => return self.register_generated_insert::<E>(id, false),
            StatementKind::Update => (mapper.generate_update::<E>(self.dialect, where_names), ResultShape::None),
            StatementKind::Delete => (mapper.generate_delete::<E>(self.dialect, where_names), ResultShape::None),
            StatementKind::Select => (mapper.generate_select::<E>(self.dialect, where_names), ResultShape::List),
        };
        let sql = sql.map_err(|e| e.in_statement(id.clone()))?;
        self.register(MappedStatement::new(id, kind, result, &sql, self.start_index)?);
        Ok(())
    }

    /// Register a generated INSERT for `E`, optionally without `RETURNING`.
    pub fn register_generated_insert<E: Entity>(
        &self,
        id: impl Into<String>,
        no_returning: bool,
    ) -> MintResult<()> {
        let id = id.into();
        let sql = Mapper::global()
            .generate_insert::<E>(self.dialect, no_returning)
            .map_err(|e| e.in_statement(id.clone()))?;
        let result = if no_returning { ResultShape::None } else { ResultShape::Scalar };
        self.register(MappedStatement::new(id, StatementKind::Insert, result, &sql, self.start_index)?);
        Ok(())
    }

    /// Resolve a statement against caller arguments.
    ///
    /// `names` and `values` are parallel; a single unnamed composite value
    /// (a map or a record) may stand in for named arguments.
    pub fn bind(
        &self,
        id: &str,
        kind: StatementKind,
        names: &[&str],
        values: &[Value],
    ) -> MintResult<BoundStatement> {
        let statement = self
            .statement(id)
            .ok_or_else(|| MintError::UnknownStatement(id.to_string()))?;

        if statement.kind != kind {
            return Err(MintError::StatementKind {
                id: id.to_string(),
                expected: kind,
                actual: statement.kind,
            });
        }

        let (sql, params) = self
            .resolve(&statement, names, values)
            .map_err(|e| e.in_statement(id))?;

        if self.show_sql {
            tracing::info!("id:\"{}\", sql:\"{}\", params:\"{:?}\"", id, sql, params);
        } else {
            tracing::debug!("id:\"{}\", sql:\"{}\", params:\"{:?}\"", id, sql, params);
        }

        Ok(BoundStatement {
            id: id.to_string(),
            kind,
            sql,
            params,
            result: statement.result,
            insert_id: (kind == StatementKind::Insert).then(|| self.dialect.insert_id()),
        })
    }

    pub fn insert(&self, id: &str, names: &[&str], values: &[Value]) -> MintResult<BoundStatement> {
        self.bind(id, StatementKind::Insert, names, values)
    }

    pub fn update(&self, id: &str, names: &[&str], values: &[Value]) -> MintResult<BoundStatement> {
        self.bind(id, StatementKind::Update, names, values)
    }

    pub fn delete(&self, id: &str, names: &[&str], values: &[Value]) -> MintResult<BoundStatement> {
        self.bind(id, StatementKind::Delete, names, values)
    }

    pub fn select(&self, id: &str, names: &[&str], values: &[Value]) -> MintResult<BoundStatement> {
        self.bind(id, StatementKind::Select, names, values)
    }

    fn resolve(
        &self,
        statement: &MappedStatement,
        names: &[&str],
        values: &[Value],
    ) -> MintResult<(String, Vec<Value>)> {
        let style = self.dialect.bind_style();

        match &statement.body {
            // Positional values pass through only when the caller named them.
            StatementBody::Raw(sql) => {
                let params = if names.is_empty() { Vec::new() } else { values.to_vec() };
                Ok((style.replace_placeholders_from(sql, self.start_index), params))
            }
            StatementBody::Compiled(compiled) => {
                let params = bind_values(&compiled.bind_names, names, values)?;
                Ok((compiled.sql(style).to_string(), params))
            }
            StatementBody::Template(template) => {
                let context = normalize_args(names, values)?;
                let text = template.render(&context)?;
                // cache key is the expanded text, never the template source
                let compiled = compile_cached(&text)?;
                bind_compiled(style, &compiled, self.start_index, names, values)
            }
        }
    }
}
