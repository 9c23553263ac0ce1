//! CRUD operations end to end against the scripted driver.

mod common;

use common::{IDENTITY, MockDriver, collections, fast_retry, record, setup};
use oracle_adapter::criteria::{Comparator, Condition, SortDirection};
use oracle_adapter::db::DriverError;
use oracle_adapter::dialect::{sequence_name, trigger_name};
use oracle_adapter::models::{
    AttributeDefinition, BindParam, ColumnType, ConnectionConfig, OutFormat, OutKind, SqlValue,
};
use oracle_adapter::{Criteria, DbError, OracleAdapter, PoolOptions};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;

fn criteria(value: serde_json::Value) -> Criteria {
    Criteria::from_value(&value).unwrap()
}

// =============================================================================
// find
// =============================================================================

#[tokio::test]
async fn test_find_window_selects_ordinals_21_to_30() {
    let (adapter, driver) = setup().await;

    adapter
        .find(
            IDENTITY,
            "orders",
            &criteria(json!({ "where": { "status": "open" }, "limit": 10, "skip": 20 })),
        )
        .await
        .unwrap();

    let executed = driver.executed();
    assert_eq!(executed.len(), 1);
    assert_eq!(
        executed[0].sql,
        "SELECT * FROM (SELECT \"orders\".*, ROW_NUMBER() OVER (ORDER BY \"id\") \"LINE_NUMBER\" FROM \"orders\" WHERE \"status\" = :1) WHERE \"LINE_NUMBER\" > 20 AND \"LINE_NUMBER\" <= 30 ORDER BY \"LINE_NUMBER\""
    );
    assert_eq!(
        executed[0].binds,
        vec![BindParam::In(SqlValue::Text("open".into()))]
    );
    assert_eq!(executed[0].options.out_format, OutFormat::Object);
}

#[tokio::test]
async fn test_find_with_built_criteria() {
    let (adapter, driver) = setup().await;
    let criteria = Criteria::all()
        .and_where(Condition::Compare {
            column: "status".into(),
            op: Comparator::Eq,
            value: json!("open"),
        })
        .with_sort("id", SortDirection::Desc)
        .with_limit(5)
        .with_skip(5);
    assert_eq!(criteria.filter.as_ref().unwrap().columns(), vec!["status"]);

    adapter.find(IDENTITY, "orders", &criteria).await.unwrap();

    let executed = driver.executed();
    assert_eq!(
        executed[0].sql,
        "SELECT * FROM (SELECT \"orders\".*, ROW_NUMBER() OVER (ORDER BY \"id\" DESC) \"LINE_NUMBER\" FROM \"orders\" WHERE \"status\" = :1 ORDER BY \"id\" DESC) WHERE \"LINE_NUMBER\" > 5 AND \"LINE_NUMBER\" <= 10 ORDER BY \"LINE_NUMBER\""
    );
    assert_eq!(
        executed[0].binds,
        vec![BindParam::In(SqlValue::Text("open".into()))]
    );
}

#[tokio::test]
async fn test_find_without_pagination_is_unwrapped() {
    let (adapter, driver) = setup().await;
    adapter
        .find(IDENTITY, "users", &Criteria::all())
        .await
        .unwrap();
    assert!(!driver.sql()[0].starts_with("SELECT * FROM ("));
}

#[tokio::test]
async fn test_find_normalizes_rows() {
    let (adapter, driver) = setup().await;
    driver.push_rows(vec![
        json!({ "id": 1, "active": 1, "name": "ann", "LINE_NUMBER": 1 }),
        json!({ "id": 2, "active": 0, "name": "bob", "LINE_NUMBER": 2 }),
    ]);

    let rows = adapter
        .find(IDENTITY, "users", &Criteria::all())
        .await
        .unwrap();

    assert_eq!(
        rows,
        vec![
            record(json!({ "id": 1, "active": true, "name": "ann" })),
            record(json!({ "id": 2, "active": false, "name": "bob" })),
        ]
    );
}

#[tokio::test]
async fn test_find_no_match_is_empty() {
    let (adapter, _driver) = setup().await;
    let rows = adapter
        .find(IDENTITY, "users", &criteria(json!({ "name": "nobody" })))
        .await
        .unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn test_malformed_criteria_never_reaches_the_database() {
    let (adapter, driver) = setup().await;
    let err = adapter
        .find(IDENTITY, "users", &criteria(json!({ "nickname": "x" })))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::QueryBuild { .. }));
    assert_eq!(driver.acquired(), 0);
}

// =============================================================================
// create / create_each
// =============================================================================

#[tokio::test]
async fn test_create_coerces_booleans_and_returns_generated_id() {
    let (adapter, driver) = setup().await;
    // OUT slots in column order: active, id, name
    driver.push_out_binds(vec![vec![json!(1)], vec![json!(41)], vec![json!("ann")]]);

    let created = adapter
        .create(IDENTITY, "users", &record(json!({ "name": "ann", "active": "yes" })))
        .await
        .unwrap();

    assert_eq!(
        created,
        record(json!({ "active": true, "id": 41, "name": "ann" }))
    );

    let executed = driver.executed();
    let executed = &executed[0];
    assert_eq!(
        executed.sql,
        "INSERT INTO \"users\" (\"active\", \"name\") VALUES (:1, :2) RETURNING \"active\", \"id\", \"name\" INTO :3, :4, :5"
    );
    assert_eq!(executed.binds[0], BindParam::In(SqlValue::Int(1)));
    assert_eq!(executed.binds[2], BindParam::Out(OutKind::Number));
    assert_eq!(executed.binds[3], BindParam::Out(OutKind::Number));
    assert!(matches!(executed.binds[4], BindParam::Out(OutKind::String { .. })));
    assert_eq!(executed.options.out_format, OutFormat::Object);
}

#[tokio::test]
async fn test_create_writes_missing_boolean_as_zero() {
    let (adapter, driver) = setup().await;
    driver.push_out_binds(vec![vec![json!(0)], vec![json!(1)], vec![json!("bob")]]);

    let created = adapter
        .create(IDENTITY, "users", &record(json!({ "name": "bob" })))
        .await
        .unwrap();

    assert_eq!(created["active"], json!(false));
    assert_eq!(driver.executed()[0].binds[0], BindParam::In(SqlValue::Int(0)));
}

#[tokio::test]
async fn test_create_with_no_values_inserts_defaults() {
    let (adapter, driver) = setup().await;
    // OUT slots in column order: id, status, ticket, user_id
    driver.push_out_binds(vec![vec![json!(7)], vec![json!(null)], vec![json!(3)], vec![json!(null)]]);

    let created = adapter
        .create(IDENTITY, "orders", &record(json!({})))
        .await
        .unwrap();

    assert_eq!(created["id"], json!(7));
    assert_eq!(created["ticket"], json!(3));
    assert!(driver.sql()[0].starts_with("INSERT INTO \"orders\" (\"id\") VALUES (DEFAULT) RETURNING"));
}

#[tokio::test]
async fn test_create_each_is_one_atomic_batch() {
    let (adapter, driver) = setup().await;
    driver
        .push_out_binds(vec![vec![json!(1)], vec![json!(1)], vec![json!("a")]])
        .push_out_binds(vec![vec![json!(0)], vec![json!(2)], vec![json!("b")]]);

    let created = adapter
        .create_each(
            IDENTITY,
            "users",
            &[
                record(json!({ "name": "a", "active": true })),
                record(json!({ "name": "b" })),
            ],
        )
        .await
        .unwrap();

    assert_eq!(created.len(), 2);
    assert_eq!(created[0]["id"], json!(1));
    assert_eq!(created[1]["name"], json!("b"));

    let executed = driver.executed();
    assert_eq!(driver.acquired(), 1);
    assert!(!executed[0].options.auto_commit);
    assert!(executed[1].options.auto_commit);
}

#[tokio::test]
async fn test_create_each_failure_rolls_back() {
    let (adapter, driver) = setup().await;
    driver
        .push_out_binds(vec![vec![json!(1)], vec![json!(1)], vec![json!("a")]])
        .push_error(DriverError::new("ORA-12899: value too large for column"));

    let result = adapter
        .create_each(
            IDENTITY,
            "users",
            &[record(json!({ "name": "a" })), record(json!({ "name": "b" }))],
        )
        .await;

    assert!(matches!(result, Err(DbError::Database { .. })));
    assert_eq!(driver.rollbacks(), 1);
    assert_eq!(driver.released(), 1);
}

#[tokio::test]
async fn test_create_each_empty_is_noop() {
    let (adapter, driver) = setup().await;
    let created = adapter.create_each(IDENTITY, "users", &[]).await.unwrap();
    assert!(created.is_empty());
    assert_eq!(driver.acquired(), 0);
}

// =============================================================================
// update
// =============================================================================

#[tokio::test]
async fn test_update_maps_every_affected_row() {
    let (adapter, driver) = setup().await;
    driver.push_out_binds(vec![
        vec![json!(0), json!(0)],
        vec![json!(1), json!(2)],
        vec![json!("x"), json!("y")],
    ]);

    let updated = adapter
        .update(
            IDENTITY,
            "users",
            &criteria(json!({ "id": { "in": [1, 2] } })),
            &record(json!({ "active": false })),
        )
        .await
        .unwrap();

    assert_eq!(
        updated,
        vec![
            record(json!({ "active": false, "id": 1, "name": "x" })),
            record(json!({ "active": false, "id": 2, "name": "y" })),
        ]
    );
    assert_eq!(
        driver.sql()[0],
        "UPDATE \"users\" SET \"active\" = :1 WHERE \"id\" IN (:2, :3) RETURNING \"active\", \"id\", \"name\" INTO :4, :5, :6"
    );
    assert_eq!(driver.executed()[0].binds[0], BindParam::In(SqlValue::Int(0)));
}

#[tokio::test]
async fn test_update_no_match_returns_empty() {
    let (adapter, driver) = setup().await;
    driver.push_out_binds(vec![vec![], vec![], vec![]]);
    let updated = adapter
        .update(
            IDENTITY,
            "users",
            &criteria(json!({ "id": 99 })),
            &record(json!({ "name": "z" })),
        )
        .await
        .unwrap();
    assert!(updated.is_empty());
}

// =============================================================================
// destroy
// =============================================================================

#[tokio::test]
async fn test_destroy_returns_pre_delete_snapshot() {
    let (adapter, driver) = setup().await;
    driver.push_rows(vec![
        json!({ "id": 1, "active": 1, "name": "ann" }),
        json!({ "id": 2, "active": 0, "name": "bob" }),
    ]);

    let destroyed = adapter
        .destroy(IDENTITY, "users", &criteria(json!({ "name": { "startsWith": "a" } })))
        .await
        .unwrap();

    assert_eq!(destroyed.len(), 2);
    assert_eq!(destroyed[0]["active"], json!(true));

    let executed = driver.executed();
    assert_eq!(executed.len(), 2);
    assert_eq!(
        executed[0].sql,
        "SELECT \"users\".* FROM \"users\" WHERE \"name\" LIKE :1 FOR UPDATE"
    );
    assert!(!executed[0].options.auto_commit);
    assert_eq!(executed[1].sql, "DELETE FROM \"users\" WHERE \"name\" LIKE :1");
    assert!(executed[1].options.auto_commit);
    assert_eq!(executed[1].binds, vec![BindParam::In(SqlValue::Text("a%".into()))]);
    assert_eq!(driver.acquired(), 1);
}

#[tokio::test]
async fn test_destroy_snapshot_ignores_max_rows() {
    let driver = MockDriver::new();
    let adapter = OracleAdapter::new(Arc::new(driver.clone())).with_retry(fast_retry());
    adapter
        .register_connection(
            ConnectionConfig::new(IDENTITY).with_pool_options(PoolOptions {
                max_rows: Some(2),
                ..PoolOptions::default()
            }),
            &collections(),
        )
        .await
        .unwrap();
    driver.push_rows(vec![
        json!({ "id": 1, "active": 1, "name": "ann" }),
        json!({ "id": 2, "active": 0, "name": "bob" }),
        json!({ "id": 3, "active": 1, "name": "cy" }),
    ]);

    let destroyed = adapter
        .destroy(IDENTITY, "users", &Criteria::all())
        .await
        .unwrap();
    assert_eq!(destroyed.len(), 3);

    adapter.find(IDENTITY, "users", &Criteria::all()).await.unwrap();

    let executed = driver.executed();
    assert_eq!(executed.len(), 3);
    assert!(executed[0].sql.ends_with("FOR UPDATE"));
    assert_eq!(executed[0].options.max_rows, None);
    assert!(executed[1].sql.starts_with("DELETE"));
    assert_eq!(executed[2].options.max_rows, Some(2));
}

#[tokio::test]
async fn test_destroy_failure_rolls_back_the_snapshot_lock() {
    let (adapter, driver) = setup().await;
    driver
        .push_rows(vec![json!({ "id": 1, "active": 1, "name": "ann" })])
        .push_error(DriverError::new("ORA-02292: integrity constraint violated - child record found"));

    let result = adapter
        .destroy(IDENTITY, "users", &criteria(json!({ "id": 1 })))
        .await;

    assert!(matches!(result, Err(DbError::Database { .. })));
    assert_eq!(driver.rollbacks(), 1);
    assert_eq!(driver.released(), 1);
}

// =============================================================================
// define / describe / drop
// =============================================================================

#[tokio::test]
async fn test_define_creates_sequence_and_trigger_per_auto_increment() {
    let (adapter, driver) = setup().await;
    let definition: BTreeMap<String, AttributeDefinition> = serde_json::from_value(json!({
        "id": { "type": "integer", "autoIncrement": true, "primaryKey": true },
        "label": { "type": "string", "size": 20 }
    }))
    .unwrap();

    adapter.define(IDENTITY, "tags", &definition).await.unwrap();

    let sql = driver.sql();
    assert_eq!(sql.len(), 3);
    assert_eq!(
        sql[0],
        "CREATE TABLE \"tags\" (\"id\" NUMBER(19) NOT NULL, \"label\" VARCHAR2(20), PRIMARY KEY (\"id\"))"
    );
    assert_eq!(sql[1], format!("CREATE SEQUENCE \"{}\"", sequence_name("tags", "id")));
    assert!(sql[2].starts_with(&format!(
        "CREATE OR REPLACE TRIGGER \"{}\" BEFORE INSERT ON \"tags\"",
        trigger_name("tags", "id")
    )));
    assert!(sql[2].contains(":new.\"id\""));
    assert_eq!(driver.acquired(), 1);
}

#[tokio::test]
async fn test_define_rejects_reserved_column() {
    let (adapter, driver) = setup().await;
    let definition: BTreeMap<String, AttributeDefinition> =
        serde_json::from_value(json!({ "LINE_NUMBER": { "type": "integer" } })).unwrap();

    let err = adapter.define(IDENTITY, "bad", &definition).await.unwrap_err();
    assert!(matches!(err, DbError::Configuration { .. }));
    assert!(driver.executed().is_empty());
}

#[tokio::test]
async fn test_describe_merges_catalog_rows() {
    let (adapter, driver) = setup().await;
    driver
        .push_rows(vec![
            json!({ "COLUMN_NAME": "id", "DATA_TYPE": "NUMBER", "NULLABLE": "N" }),
            json!({ "COLUMN_NAME": "active", "DATA_TYPE": "NUMBER", "NULLABLE": "Y" }),
            json!({ "COLUMN_NAME": "name", "DATA_TYPE": "VARCHAR2", "NULLABLE": "Y" }),
        ])
        .push_rows(vec![json!({ "INDEX_NAME": "SYS_C0011", "COLUMN_NAME": "id" })])
        .push_rows(vec![json!({
            "TABLE_NAME": "users", "COLUMN_NAME": "id", "POSITION": 1,
            "STATUS": "ENABLED", "OWNER": "APP"
        })]);

    let description = adapter
        .describe(IDENTITY, "users")
        .await
        .unwrap()
        .expect("table exists");

    assert_eq!(description.len(), 3);
    assert!(description["id"].primary_key);
    assert!(description["id"].auto_increment);
    assert_eq!(description["id"].indexes, vec!["SYS_C0011"]);
    assert_eq!(description["active"].column_type, ColumnType::Boolean);

    let sql = driver.sql();
    assert_eq!(sql.len(), 3);
    assert_eq!(
        sql[0],
        "SELECT COLUMN_NAME, DATA_TYPE, NULLABLE FROM USER_TAB_COLUMNS WHERE TABLE_NAME = 'users'"
    );
    assert_eq!(driver.acquired(), 1);
}

#[tokio::test]
async fn test_describe_missing_table_is_none() {
    let (adapter, _driver) = setup().await;
    assert_eq!(adapter.describe(IDENTITY, "ghosts").await.unwrap(), None);
}

#[tokio::test]
async fn test_describe_query_failure_is_an_error() {
    let (adapter, driver) = setup().await;
    driver.push_error(DriverError::new("ORA-03113: end-of-file on communication channel"));
    let result = adapter.describe(IDENTITY, "users").await;
    assert!(matches!(result, Err(DbError::Database { .. })));
}

#[tokio::test]
async fn test_drop_issues_table_plus_sequence_per_auto_increment() {
    let (adapter, driver) = setup().await;

    adapter.drop(IDENTITY, "orders", &[]).await.unwrap();

    // orders has two auto-increment columns
    assert_eq!(
        driver.sql(),
        vec![
            "DROP TABLE \"orders\"".to_string(),
            format!("DROP SEQUENCE \"{}\"", sequence_name("orders", "id")),
            format!("DROP SEQUENCE \"{}\"", sequence_name("orders", "ticket")),
        ]
    );
}

#[tokio::test]
async fn test_drop_relations_first_then_target() {
    let (adapter, driver) = setup().await;

    adapter
        .drop(IDENTITY, "users", &["orders".to_string(), "audit_log".to_string()])
        .await
        .unwrap();

    let sql = driver.sql();
    // orders: 1 + 2, audit_log (unregistered): 1, users: 1 + 1
    assert_eq!(sql.len(), 6);
    assert_eq!(sql[0], "DROP TABLE \"orders\"");
    assert_eq!(sql[3], "DROP TABLE \"audit_log\"");
    assert_eq!(sql[4], "DROP TABLE \"users\"");
    assert_eq!(sql[5], format!("DROP SEQUENCE \"{}\"", sequence_name("users", "id")));
    assert_eq!(driver.acquired(), 1);
}
