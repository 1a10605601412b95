mod common;

use common::{RecordingExecutor, capture_logs, db, result_set};
use mysql_middleware::prelude::*;

fn text(s: &str) -> Option<RowValues> {
    Some(RowValues::Text(s.to_string()))
}

fn describe_row(field: &str, ty: &str, null: &str, key: &str) -> Vec<Option<RowValues>> {
    vec![text(field), text(ty), text(null), text(key), Some(RowValues::Null), text("")]
}

#[tokio::test]
async fn provably_empty_queries_never_reach_the_executor()
-> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let db = db(&executor);
    let empty: [&str; 0] = [];
    let q = DbQuery::new("t").filter_in("id", empty);

    assert!(db.run_query(&q).await?.is_empty());
    assert_eq!(db.run_query_count(&q).await?, 0);
    assert_eq!(db.delete_by_query(&q).await?, 0);
    assert_eq!(
        db.patch_by_query(&q, &RowObject::new().with("a", 1_i64)).await?,
        0
    );
    assert!(db.stream_query(&q)?.try_collect().await?.is_empty());
    assert!(db.get_by_ids("t", &empty).await?.is_empty());
    assert_eq!(db.delete_by_ids("t", &empty).await?, 0);
    assert_eq!(db.save_batch("t", Vec::new(), SaveMethod::Insert).await?, 0);

    assert_eq!(executor.call_count(), 0);
    Ok(())
}

#[tokio::test]
async fn rows_come_back_with_field_names_and_without_absent_cells()
-> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    executor.push_select(result_set(
        &["id", "address_dot_city", "active"],
        vec![
            vec![text("a"), text("Oslo"), Some(RowValues::Bool(true))],
            vec![text("b"), Some(RowValues::Null), None],
        ],
    ));
    let db = db(&executor);

    let rows = db.get_by_ids("users", &["a", "b"]).await?;
    assert_eq!(
        executor.selected(),
        vec!["SELECT * FROM `users` WHERE `id` IN ('a', 'b')".to_string()]
    );
    assert_eq!(
        rows,
        vec![
            RowObject::new()
                .with("id", "a")
                .with("address.city", "Oslo")
                .with("active", true),
            RowObject::new()
                .with("id", "b")
                .with("address.city", RowValues::Null),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn empty_projection_returns_empty_objects() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    executor.push_select(result_set(&["id"], vec![vec![text("a")], vec![text("b")]]));
    let db = db(&executor);

    let none: [&str; 0] = [];
    let rows = db.run_query(&DbQuery::new("t").select(none)).await?;
    assert_eq!(executor.selected(), vec!["SELECT `id` FROM `t`".to_string()]);
    assert_eq!(rows, vec![RowObject::new(), RowObject::new()]);
    Ok(())
}

#[tokio::test]
async fn count_reads_the_alias_column() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    executor.push_select(result_set(&["_count"], vec![vec![Some(RowValues::Int(5))]]));
    let db = db(&executor);

    let n = db
        .run_query_count(&DbQuery::new("t").filter("n", FilterOperator::Lt, 3_i64).limit(2))
        .await?;
    assert_eq!(n, 5);
    assert_eq!(
        executor.selected(),
        vec!["SELECT COUNT(*) AS `_count` FROM `t` WHERE `n` < 3".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn save_batch_serializes_structured_values() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let db = db(&executor);
    let rows = vec![
        RowObject::new()
            .with("id", "a")
            .with("meta", RowValues::JSON(serde_json::json!({"k": 1}))),
        RowObject::new().with("id", "b").with("blob", vec![0xde_u8, 0xad]),
    ];

    assert_eq!(db.save_batch("t", rows, SaveMethod::Upsert).await?, 1);
    assert_eq!(
        executor.executed_sql(),
        vec![
            "REPLACE INTO `t` (`id`, `meta`, `blob`) VALUES ('a', '{\\\"k\\\":1}', NULL), ('b', NULL, X'dead')"
                .to_string()
        ]
    );
    Ok(())
}

#[tokio::test]
async fn split_batches_run_in_order() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let db = db(&executor);
    let rows: Vec<RowObject> = (0..10)
        .map(|i| RowObject::new().with("id", format!("id{i}")).with("k1", "xxx".repeat(80_000)))
        .collect();

    let affected = db.save_batch("TBL1", rows, SaveMethod::Insert).await?;
    let sqls = executor.executed_sql();
    assert!(sqls.len() > 1);
    assert_eq!(affected, sqls.len() as u64);
    assert!(sqls[0].contains("('id0'"));
    assert!(sqls.last().unwrap().contains("('id9'"));
    Ok(())
}

#[tokio::test]
async fn failure_after_the_first_statement_is_partial() {
    let rows = || -> Vec<RowObject> {
        (0..10)
            .map(|i| RowObject::new().with("id", format!("id{i}")).with("k1", "xxx".repeat(80_000)))
            .collect()
    };

    let executor = RecordingExecutor::failing_at(1);
    let err = db(&executor)
        .save_batch("TBL1", rows(), SaveMethod::Insert)
        .await
        .unwrap_err();
    assert!(err.is_partial());
    match err {
        MysqlMiddlewareError::PartialBatchFailure {
            completed, total, ..
        } => {
            assert_eq!(completed, 1);
            assert!(total > 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
    // nothing after the failed statement is attempted
    assert_eq!(executor.executed().len(), 2);

    let executor = RecordingExecutor::failing_at(0);
    let err = db(&executor)
        .save_batch("TBL1", rows(), SaveMethod::Insert)
        .await
        .unwrap_err();
    assert!(!err.is_partial());
    assert!(matches!(err, MysqlMiddlewareError::ExecutionError(_)));
    assert_eq!(executor.executed().len(), 1);
}

#[tokio::test]
async fn update_method_issues_one_statement_per_row() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let db = db(&executor);
    let rows = vec![
        RowObject::new().with("id", "a").with("n", 1_i64),
        RowObject::new().with("id", "b").with("n", 2_i64).with("x.y", "z"),
    ];
    assert_eq!(db.save_batch("t", rows, SaveMethod::Update).await?, 2);
    assert_eq!(
        executor.executed_sql(),
        vec![
            "UPDATE `t` SET `n` = 1 WHERE `id` = 'a'".to_string(),
            "UPDATE `t` SET `n` = 2, `x_dot_y` = 'z' WHERE `id` = 'b'".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn invalid_rows_fail_before_any_statement() {
    let executor = RecordingExecutor::new();
    let rows = vec![
        RowObject::new().with("id", "a"),
        RowObject::new().with("id", "b").with("bad_dot_name", 1_i64),
    ];
    let err = db(&executor)
        .save_batch("t", rows, SaveMethod::Insert)
        .await
        .unwrap_err();
    assert!(matches!(err, MysqlMiddlewareError::ValidationError(_)));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn deletes_and_patches() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let db = db(&executor);

    assert_eq!(db.delete_by_ids("t", &["a", "b"]).await?, 1);
    let q = DbQuery::new("t").filter_eq("status", "old").limit(100);
    db.delete_by_query(&q).await?;
    db.patch_by_query(&q, &RowObject::new().with("status", "new"))
        .await?;

    assert_eq!(
        executor.executed_sql(),
        vec![
            "DELETE FROM `t` WHERE `id` IN ('a', 'b')".to_string(),
            "DELETE FROM `t` WHERE `status` = 'old' LIMIT 100".to_string(),
            "UPDATE `t` SET `status` = 'new' WHERE `status` = 'old' LIMIT 100".to_string(),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn tables_and_schemas() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let db = db(&executor);

    let schema = TableSchema::new("items")
        .field(SchemaField::new("id", FieldKind::String))
        .field(SchemaField::new("n", FieldKind::Integer));
    db.create_table(
        &schema,
        &CreateTableOptions {
            drop_if_exists: true,
            ..CreateTableOptions::default()
        },
    )
    .await?;
    assert_eq!(
        executor.executed_sql(),
        vec![
            "DROP TABLE IF EXISTS `items`".to_string(),
            "CREATE TABLE `items` (\nid VARCHAR(255) NOT NULL,\n`n` INT(11) DEFAULT NULL,\nPRIMARY KEY (id)\n) ENGINE=InnoDB"
                .to_string(),
        ]
    );

    executor.push_select(result_set(
        &["Tables_in_app"],
        vec![vec![text("items")], vec![text("users")]],
    ));
    assert_eq!(db.get_tables().await?, vec!["items", "users"]);

    executor.push_select(result_set(
        &["Field", "Type", "Null", "Key", "Default", "Extra"],
        vec![
            describe_row("id", "varchar(255)", "NO", "PRI"),
            describe_row("n", "int(11)", "YES", ""),
            describe_row("flag", "tinyint(1)", "YES", ""),
        ],
    ));
    let read_back = db.get_table_schema("items").await?;
    assert_eq!(executor.selected().last().map(String::as_str), Some("DESCRIBE `items`"));
    assert_eq!(read_back.table, "items");
    assert_eq!(read_back.get("id").map(|f| (f.kind, f.required)), Some((FieldKind::String, true)));
    assert_eq!(read_back.get("n").map(|f| f.kind), Some(FieldKind::Integer));
    assert_eq!(read_back.get("flag").map(|f| f.kind), Some(FieldKind::Boolean));
    Ok(())
}

#[tokio::test]
async fn streams_apply_the_projection() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    executor.set_stream_rows(vec![
        RowObject::new().with("id", "a"),
        RowObject::new().with("id", "b"),
    ]);
    let db = db(&executor);

    let rows = db
        .stream_query(&DbQuery::new("t").order("id", false))?
        .try_collect()
        .await?;
    assert_eq!(rows.len(), 2);

    let none: [&str; 0] = [];
    let rows = db
        .stream_query(&DbQuery::new("t").select(none))?
        .try_collect()
        .await?;
    assert_eq!(rows, vec![RowObject::new(), RowObject::new()]);

    assert_eq!(
        executor.streamed(),
        vec![
            "SELECT * FROM `t` ORDER BY `id` ASC".to_string(),
            "SELECT `id` FROM `t`".to_string(),
        ]
    );
    Ok(())
}

#[test]
fn invalid_planner_limits_are_a_config_error() {
    let config = DbConfig {
        planner: PlannerConfig {
            max_packet_size: 10,
            split_threshold: 20,
        },
        ..DbConfig::default()
    };
    let err = MysqlDb::new(RecordingExecutor::new(), config).unwrap_err();
    assert!(matches!(err, MysqlMiddlewareError::ConfigError(_)));
}

#[tokio::test]
async fn connection_events_are_logged_only_when_enabled()
-> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let config = DbConfig {
        debug_connections: true,
        ..DbConfig::default()
    };
    let db = MysqlDb::new(executor.clone(), config)?;

    let (guard, logs) = capture_logs(tracing::Level::DEBUG);
    db.ping().await?;
    db.stream_query(&DbQuery::new("t"))?.try_collect().await?;
    drop(guard);
    let text = logs.text();
    assert!(text.contains("connection check ok"), "{text}");
    assert!(text.contains("opening streaming connection"), "{text}");
    assert!(text.contains("table=t"), "{text}");

    let quiet = common::db(&executor);
    let (guard, logs) = capture_logs(tracing::Level::DEBUG);
    quiet.ping().await?;
    quiet.stream_query(&DbQuery::new("t"))?.try_collect().await?;
    drop(guard);
    assert!(!logs.text().contains("connection"), "{}", logs.text());
    Ok(())
}
