//! CRUD generation for derived entities across dialects.

#![allow(dead_code)]

use std::sync::Once;

use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;
use sqlmint::prelude::*;

#[derive(Entity)]
struct T1 {
    #[sql(autoincr)]
    id: i64,
    f1: String,
    f2: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Entity)]
#[sql(table = "t2_table")]
struct T2 {
    #[sql(autoincr)]
    id: i64,
    f1: String,
    f2: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Entity)]
#[sql(table_fn = "T3::table_name")]
struct T3 {
    #[sql(autoincr)]
    id: i64,
    f1: String,
}

impl T3 {
    fn table_name() -> &'static str {
        "t3_table"
    }
}

#[derive(Entity)]
struct T4 {
    #[sql(flatten)]
    t2: T2,
    f3: String,
    f4: String,
}

#[derive(Entity)]
#[sql(table_fn_ref = "T5::table_name")]
struct T5 {
    #[sql(autoincr)]
    id: i64,
    f1: String,
}

impl T5 {
    fn table_name() -> String {
        "t5_table".to_string()
    }
}

#[derive(Entity)]
struct T6 {
    #[sql(autoincr)]
    id: i64,
    #[sql(column = "label")]
    name: String,
    #[sql(skip)]
    scratch: Vec<u8>,
}

#[derive(Entity)]
struct OrderLine {
    #[sql(autoincr)]
    id: i64,
    #[sql(created)]
    placed_on: DateTime<Utc>,
    qty: i32,
}

#[derive(Entity)]
#[sql(table = "marked_table", table_fn = "Marked::table_name")]
struct Marked {
    #[sql(autoincr)]
    id: i64,
    f1: String,
}

impl Marked {
    fn table_name() -> &'static str {
        "method_table"
    }
}

#[derive(Entity)]
#[sql(table_fn_ref = "MarkedLast::table_name", table = "marked_last_table")]
struct MarkedLast {
    f1: String,
}

impl MarkedLast {
    fn table_name() -> &'static str {
        "method_last_table"
    }
}

static REGISTER: Once = Once::new();

fn setup() {
    REGISTER.call_once(|| {
        register_table_name::<T1>(Shape::Value, "t1_table");
        register_table_name::<T6>(Shape::Reference, "t6_table");
    });
}

#[test]
fn test_table_names() {
    setup();
    assert_eq!(read_table_name::<T1>().unwrap(), "t1_table");
    assert_eq!(read_table_name::<T2>().unwrap(), "t2_table");
    assert_eq!(read_table_name::<T3>().unwrap(), "t3_table");
    assert_eq!(read_table_name::<T4>().unwrap(), "t2_table");
    assert_eq!(read_table_name::<T5>().unwrap(), "t5_table");
    assert_eq!(read_table_name::<T6>().unwrap(), "t6_table");
    assert_eq!(read_table_name::<OrderLine>().unwrap(), "order_line");
}

#[test]
fn test_marker_wins_over_method() {
    assert_eq!(read_table_name::<Marked>().unwrap(), "marked_table");
    assert_eq!(read_table_name::<MarkedLast>().unwrap(), "marked_last_table");
    assert_eq!(
        generate_select_sql::<Marked>(Dialect::Postgres, &["id"]).unwrap(),
        "SELECT * FROM marked_table WHERE id=#{id}"
    );
}

#[test]
fn test_insert() {
    setup();
    assert_eq!(
        generate_insert_sql::<T1>(Dialect::Postgres, false).unwrap(),
        "INSERT INTO t1_table(f1, f2, created_at, updated_at) VALUES(#{f1}, #{f2}, #{created_at}, #{updated_at}) RETURNING id"
    );
    assert_eq!(
        generate_insert_sql::<T1>(Dialect::Postgres, true).unwrap(),
        "INSERT INTO t1_table(f1, f2, created_at, updated_at) VALUES(#{f1}, #{f2}, #{created_at}, #{updated_at})"
    );
    assert_eq!(
        generate_insert_sql::<T1>(Dialect::MySQL, false).unwrap(),
        "INSERT INTO t1_table(f1, f2, created_at, updated_at) VALUES(#{f1}, #{f2}, #{created_at}, #{updated_at})"
    );
}

#[test]
fn test_insert_promotes_embedded_fields() {
    setup();
    assert_eq!(
        generate_insert_sql::<T4>(Dialect::Postgres, false).unwrap(),
        "INSERT INTO t2_table(f3, f4, f1, f2, created_at, updated_at) VALUES(#{f3}, #{f4}, #{f1}, #{f2}, #{created_at}, #{updated_at}) RETURNING id"
    );
    assert_eq!(
        generate_insert_sql::<T4>(Dialect::MySQL, false).unwrap(),
        "INSERT INTO t2_table(f3, f4, f1, f2, created_at, updated_at) VALUES(#{f3}, #{f4}, #{f1}, #{f2}, #{created_at}, #{updated_at})"
    );
}

#[test]
fn test_insert_renamed_and_skipped_columns() {
    setup();
    assert_eq!(
        generate_insert_sql::<T6>(Dialect::MSSQL, false).unwrap(),
        "INSERT INTO t6_table(label) VALUES(#{label}) RETURNING id"
    );
    assert_eq!(
        generate_insert_sql::<OrderLine>(Dialect::Oracle, false).unwrap(),
        "INSERT INTO order_line(placed_on, qty) VALUES(#{placed_on}, #{qty})"
    );
}

#[test]
fn test_update() {
    setup();
    assert_eq!(
        generate_update_sql::<T1>(Dialect::Postgres, &[]).unwrap(),
        "UPDATE t1_table SET f1=#{f1}, f2=#{f2}, updated_at=now()"
    );
    assert_eq!(
        generate_update_sql::<T1>(Dialect::MySQL, &["id"]).unwrap(),
        "UPDATE t1_table SET f1=#{f1}, f2=#{f2}, updated_at=CURRENT_TIMESTAMP WHERE id=#{id}"
    );
    assert_eq!(
        generate_update_sql::<T4>(Dialect::Postgres, &["id", "f2"]).unwrap(),
        "UPDATE t2_table SET f3=#{f3}, f4=#{f4}, f1=#{f1}, updated_at=now() WHERE id=#{id} AND f2=#{f2}"
    );
    // explicit created role stays out of SET, no update role means no timestamp
    assert_eq!(
        generate_update_sql::<OrderLine>(Dialect::Postgres, &["id"]).unwrap(),
        "UPDATE order_line SET qty=#{qty} WHERE id=#{id}"
    );
}

#[test]
fn test_delete_and_select() {
    setup();
    assert_eq!(
        generate_delete_sql::<T1>(Dialect::Postgres, &["id"]).unwrap(),
        "DELETE FROM t1_table WHERE id=#{id}"
    );
    assert_eq!(
        generate_delete_sql::<T1>(Dialect::MySQL, &[]).unwrap(),
        "DELETE FROM t1_table"
    );
    assert_eq!(
        generate_select_sql::<T1>(Dialect::Postgres, &["id"]).unwrap(),
        "SELECT * FROM t1_table WHERE id=#{id}"
    );
    assert_eq!(
        generate_select_sql::<T4>(Dialect::Postgres, &["f1", "f3"]).unwrap(),
        "SELECT * FROM t2_table WHERE f1=#{f1} AND f3=#{f3}"
    );
}

#[test]
fn test_generated_sql_compiles() {
    setup();
    let sql = generate_update_sql::<T4>(Dialect::Postgres, &["id"]).unwrap();
    let compiled = compile(&sql).unwrap();
    assert_eq!(compiled.bind_names, vec!["f3", "f4", "f1", "f2", "id"]);
    assert_eq!(compiled.to_source(), sql);
}
