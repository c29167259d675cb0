//! End-to-end scenarios against a real `sqlite::memory:` connection, plus the
//! builder render checks that don't need one.

use dbal::connection::{Connection, DriverParams};
use dbal::driver::sqlite::SqliteParams;
use dbal::expr::ExpressionBuilder;
use dbal::platform::mysql::MySqlPlatform;
use dbal::platform::sqlite::SqlitePlatform;
use dbal::statement::{FetchMode, Params, Value};
use dbal::{Error, SQLBuilder};
use std::collections::HashMap;

async fn memory_connection() -> Connection {
    Connection::connect("sqlite", DriverParams::Sqlite(SqliteParams::default()), true)
        .await
        .expect("in-memory sqlite connects")
}

#[test]
fn s1_select_render() {
    let mut sb = SQLBuilder::new();
    sb.select(["u.id", "u.name"])
        .from("users", Some("u"))
        .where_(vec![ExpressionBuilder::eq("u.id", ":i")])
        .order_by("u.name", "DESC");
    let sql = sb.get_sql(&SqlitePlatform::new()).unwrap();
    assert_eq!(sql, "SELECT u.id, u.name FROM users u WHERE u.id = :i ORDER BY u.name DESC");
}

#[test]
fn s2_join_render() {
    let mut sb = SQLBuilder::new();
    sb.select(["u.id", "u.name"])
        .from("users", Some("u"))
        .inner_join("u", "orders", "o", vec![ExpressionBuilder::eq("o.user_id", "u.id")])
        .where_(vec![ExpressionBuilder::eq("u.id", ":i")]);
    let sql = sb.get_sql(&SqlitePlatform::new()).unwrap();
    assert_eq!(
        sql,
        "SELECT u.id, u.name FROM users u INNER JOIN orders o ON o.user_id = u.id WHERE u.id = :i"
    );
}

#[test]
fn s3_mysql_offset_only_paging() {
    let mut sb = SQLBuilder::new();
    sb.select(["1"]).from("t", None).set_first_result(10);
    let sql = sb.get_sql(&MySqlPlatform::new()).unwrap();
    assert_eq!(sql, "SELECT 1 FROM t LIMIT 18446744073709551615 OFFSET 10");
}

#[test]
fn s4_sqlite_offset_only_paging() {
    let mut sb = SQLBuilder::new();
    sb.select(["1"]).from("t", None).set_first_result(10);
    let sql = sb.get_sql(&SqlitePlatform::new()).unwrap();
    assert_eq!(sql, "SELECT 1 FROM t LIMIT -1 OFFSET 10");
}

#[tokio::test]
async fn s5_insert_then_update_expands_list_into_in_clause() {
    let mut conn = memory_connection().await;
    conn.execute(
        "CREATE TABLE t (id INTEGER PRIMARY KEY, a INTEGER, b INTEGER)",
        Params::new(),
    )
    .await
    .unwrap();

    let mut values = HashMap::new();
    values.insert("a".to_string(), Value::Int(1));
    let id = conn.insert("t", values).await.unwrap();
    assert_eq!(id, 1);

    let rows = conn
        .query(
            "SELECT id FROM t WHERE b IN (?, ?)",
            Params::from_positional(vec![Value::Int(2), Value::Int(3)]),
        )
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn s6_nested_savepoint_cycle_returns_to_zero_nesting() {
    let mut conn = memory_connection().await;
    conn.set_nest_transactions_with_savepoints(true).unwrap();

    conn.begin_transaction().await.unwrap();
    conn.begin_transaction().await.unwrap();
    assert!(conn.is_transaction_active());

    conn.rollback().await.unwrap();
    conn.commit().await.unwrap();

    assert!(!conn.is_transaction_active());
}

#[tokio::test]
async fn s7_rollback_only_fails_outer_commit_without_savepoints() {
    let mut conn = memory_connection().await;

    conn.begin_transaction().await.unwrap();
    conn.begin_transaction().await.unwrap();
    conn.rollback().await.unwrap();

    let err = conn.commit().await.unwrap_err();
    assert!(matches!(err, Error::CommitFailedRollbackOnly));
}

#[tokio::test]
async fn query_round_trips_rows_with_default_fetch_mode() {
    let mut conn = memory_connection().await;
    conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)", Params::new())
        .await
        .unwrap();
    conn.execute(
        "INSERT INTO t (name) VALUES (?)",
        Params::from_positional(vec![Value::Text("alice".to_string())]),
    )
    .await
    .unwrap();

    conn.set_fetch_mode(FetchMode::Dict);
    let rows = conn.query("SELECT id, name FROM t", Params::new()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get("name"), Some(&Value::Text("alice".to_string())));
}

#[tokio::test]
async fn schema_manager_reports_created_table_and_columns() {
    let mut conn = memory_connection().await;
    conn.execute(
        "CREATE TABLE widgets (id INTEGER PRIMARY KEY, label TEXT NOT NULL)",
        Params::new(),
    )
    .await
    .unwrap();

    assert!(conn.contains_table("widgets").await.unwrap());
    assert!(!conn.contains_table("ghosts").await.unwrap());

    let columns = conn.get_table_columns("widgets", None).await.unwrap();
    let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["id", "label"]);
    assert!(columns.iter().find(|c| c.name == "label").unwrap().notnull);
}
