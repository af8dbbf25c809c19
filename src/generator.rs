//! SQL statement generator.
//!
//! Turns an [`EntityDescriptor`] into canonical INSERT, UPDATE, DELETE and
//! SELECT text. Values are written as `#{column}` named placeholders, ready
//! for the named-query compiler.

use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::MintResult;
use crate::mapper::{EntityDescriptor, Mapper};

/// Generate INSERT SQL.
///
/// The auto-increment column is left out of the value list. Dialects with
/// `RETURNING` support get `RETURNING <pk>` unless `no_returning` is set.
pub fn insert_sql(dialect: Dialect, entity: &EntityDescriptor, no_returning: bool) -> String {
    let columns: Vec<&str> = entity
        .columns
        .iter()
        .filter(|c| !c.auto_increment)
        .map(|c| c.name)
        .collect();

    let mut sql = String::from("INSERT INTO ");
    sql.push_str(&entity.table_name);
    sql.push('(');
    sql.push_str(&columns.join(", "));
    sql.push_str(") VALUES(");
    let values: Vec<String> = columns.iter().map(|c| placeholder(c)).collect();
    sql.push_str(&values.join(", "));
    sql.push(')');

    if let Some(pk) = entity.primary_key() {
        if dialect.supports_returning() && !no_returning {
            sql.push_str(" RETURNING ");
            sql.push_str(pk.name);
        }
    }

    sql
}

/// Generate UPDATE SQL.
///
/// The SET list skips the auto-increment column, both timestamp columns and
/// every column named in `where_names`. The update timestamp is always set
/// to the dialect's current-time expression.
pub fn update_sql(dialect: Dialect, entity: &EntityDescriptor, where_names: &[&str]) -> String {
    let mut set_clauses: Vec<String> = entity
        .columns
        .iter()
        .filter(|c| !c.auto_increment && !c.is_timestamp())
        .filter(|c| !where_names.contains(&c.name))
        .map(|c| format!("{}={}", c.name, placeholder(c.name)))
        .collect();

    if let Some(updated) = entity.updated_column() {
        set_clauses.push(format!("{}={}", updated.name, dialect.now()));
    }

    let mut sql = String::from("UPDATE ");
    sql.push_str(&entity.table_name);
    sql.push_str(" SET ");
    sql.push_str(&set_clauses.join(", "));
    push_where(&mut sql, where_names);
    sql
}

/// Generate DELETE SQL.
pub fn delete_sql(entity: &EntityDescriptor, where_names: &[&str]) -> String {
    let mut sql = String::from("DELETE FROM ");
    sql.push_str(&entity.table_name);
    push_where(&mut sql, where_names);
    sql
}

/// Generate SELECT SQL.
pub fn select_sql(entity: &EntityDescriptor, where_names: &[&str]) -> String {
    let mut sql = String::from("SELECT * FROM ");
    sql.push_str(&entity.table_name);
    push_where(&mut sql, where_names);
    sql
}

fn placeholder(name: &str) -> String {
    format!("#{{{}}}", name)
}

/// `WHERE a=#{a} AND b=#{b}` in caller order.
fn push_where(sql: &mut String, where_names: &[&str]) {
    if where_names.is_empty() {
        return;
    }
    let conditions: Vec<String> = where_names
        .iter()
        .map(|name| format!("{}={}", name, placeholder(name)))
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&conditions.join(" AND "));
}

impl Mapper {
    pub fn generate_insert<E: Entity>(&self, dialect: Dialect, no_returning: bool) -> MintResult<String> {
        let entity = self.descriptor::<E>()?;
        Ok(insert_sql(dialect, &entity, no_returning))
    }

    pub fn generate_update<E: Entity>(&self, dialect: Dialect, where_names: &[&str]) -> MintResult<String> {
        let entity = self.descriptor::<E>()?;
        Ok(update_sql(dialect, &entity, where_names))
    }

    pub fn generate_delete<E: Entity>(&self, _dialect: Dialect, where_names: &[&str]) -> MintResult<String> {
        let entity = self.descriptor::<E>()?;
        Ok(delete_sql(&entity, where_names))
    }

    pub fn generate_select<E: Entity>(&self, _dialect: Dialect, where_names: &[&str]) -> MintResult<String> {
        let entity = self.descriptor::<E>()?;
        Ok(select_sql(&entity, where_names))
    }
}

/// Generate INSERT SQL for `E` with the process-wide mapper.
pub fn generate_insert_sql<E: Entity>(dialect: Dialect, no_returning: bool) -> MintResult<String> {
    Mapper::global().generate_insert::<E>(dialect, no_returning)
}

/// Generate UPDATE SQL for `E` with the process-wide mapper.
pub fn generate_update_sql<E: Entity>(dialect: Dialect, where_names: &[&str]) -> MintResult<String> {
    Mapper::global().generate_update::<E>(dialect, where_names)
}

/// Generate DELETE SQL for `E` with the process-wide mapper.
pub fn generate_delete_sql<E: Entity>(dialect: Dialect, where_names: &[&str]) -> MintResult<String> {
    Mapper::global().generate_delete::<E>(dialect, where_names)
}

/// Generate SELECT SQL for `E` with the process-wide mapper.
pub fn generate_select_sql<E: Entity>(dialect: Dialect, where_names: &[&str]) -> MintResult<String> {
    Mapper::global().generate_select::<E>(dialect, where_names)
}
