mod common;

use std::sync::Arc;

use common::{RecordingExecutor, result_set};
use mysql_middleware::prelude::*;

fn kv(executor: &Arc<RecordingExecutor>) -> MysqlKeyValueDb<Arc<RecordingExecutor>> {
    MysqlKeyValueDb::new(executor.clone(), DbConfig::default()).unwrap()
}

#[tokio::test]
async fn table_lifecycle_and_saves() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    let kv = kv(&executor);

    kv.create_table("kv", true).await?;
    kv.save_batch("kv", &[("a".to_string(), b"1".to_vec()), ("b".to_string(), vec![0, 255])])
        .await?;
    kv.drop_table("kv").await?;

    let executed = executor.executed();
    let sqls: Vec<&str> = executed.iter().map(|(sql, _)| sql.as_str()).collect();
    assert_eq!(
        sqls,
        vec![
            "DROP TABLE IF EXISTS `kv`",
            "CREATE TABLE `kv` (`id` VARCHAR(64) PRIMARY KEY, `v` LONGBLOB NOT NULL)",
            "REPLACE INTO `kv` (`id`, `v`) VALUES (?, ?)",
            "REPLACE INTO `kv` (`id`, `v`) VALUES (?, ?)",
            "DROP TABLE IF EXISTS `kv`",
        ]
    );
    assert_eq!(
        executed[3].1,
        vec![RowValues::Text("b".into()), RowValues::Blob(vec![0, 255])]
    );
    Ok(())
}

#[tokio::test]
async fn lookups_and_deletes() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    executor.push_select(result_set(
        &["id", "v"],
        vec![vec![
            Some(RowValues::Text("a".into())),
            Some(RowValues::Blob(b"hello".to_vec())),
        ]],
    ));
    let kv = kv(&executor);

    let entries = kv.get_by_ids("kv", &["a", "missing"]).await?;
    assert_eq!(entries, vec![("a".to_string(), b"hello".to_vec())]);
    assert_eq!(
        executor.selected(),
        vec!["SELECT `id`, `v` FROM `kv` WHERE `id` IN ('a', 'missing')".to_string()]
    );

    let none: [&str; 0] = [];
    assert!(kv.get_by_ids("kv", &none).await?.is_empty());
    assert_eq!(kv.delete_by_ids("kv", &none).await?, 0);
    assert_eq!(kv.delete_by_ids("kv", &["a"]).await?, 1);
    assert_eq!(
        executor.executed_sql(),
        vec!["DELETE FROM `kv` WHERE `id` IN ('a')".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn streams_and_count() -> Result<(), Box<dyn std::error::Error>> {
    let executor = RecordingExecutor::new();
    executor.set_stream_rows(vec![
        RowObject::new().with("id", "a").with("v", vec![1_u8]),
        RowObject::new().with("id", "b").with("v", vec![2_u8]),
    ]);
    executor.push_select(result_set(&["_count"], vec![vec![Some(RowValues::Int(2))]]));
    let kv = kv(&executor);

    assert_eq!(kv.stream_ids("kv", None)?.try_collect().await?, vec!["a", "b"]);
    assert_eq!(
        kv.stream_values("kv", Some(2))?.try_collect().await?,
        vec![vec![1_u8], vec![2_u8]]
    );
    assert_eq!(
        kv.stream_entries("kv", Some(1))?.try_collect().await?,
        vec![("a".to_string(), vec![1_u8]), ("b".to_string(), vec![2_u8])]
    );
    assert_eq!(
        executor.streamed(),
        vec![
            "SELECT `id` FROM `kv`".to_string(),
            "SELECT `v` FROM `kv` LIMIT 2".to_string(),
            "SELECT `id`, `v` FROM `kv` LIMIT 1".to_string(),
        ]
    );

    assert_eq!(kv.count("kv").await?, 2);
    assert_eq!(
        executor.selected(),
        vec!["SELECT COUNT(*) AS `_count` FROM `kv`".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn increment_is_not_supported() {
    let executor = RecordingExecutor::new();
    let err = kv(&executor).increment("kv", "a", 1).await.unwrap_err();
    assert!(matches!(err, MysqlMiddlewareError::Unimplemented(_)));
    assert_eq!(executor.call_count(), 0);
}

#[tokio::test]
async fn failed_save_after_the_first_entry_is_partial() {
    let executor = RecordingExecutor::failing_at(2);
    let entries: Vec<KeyValueEntry> = (0..4).map(|i| (format!("k{i}"), vec![i])).collect();
    let err = kv(&executor).save_batch("kv", &entries).await.unwrap_err();
    assert!(matches!(
        err,
        MysqlMiddlewareError::PartialBatchFailure { completed: 2, total: 4, .. }
    ));
}
