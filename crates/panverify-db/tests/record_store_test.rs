use chrono::{TimeZone, Utc};
use panverify_core::{
    DatabaseConfig, Pan, RecordKey, SortOrder, TableConfig, ValidationState, VerificationOutcome,
};
use panverify_db::{RecordStore, SelectionQuery, SqliteRecordStore, StoreError, StoreSession};
use tempfile::TempDir;

async fn seeded_store(dir: &TempDir, rows: &[(&str, f64)]) -> SqliteRecordStore {
    let config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", dir.path().join("tds.db").display()),
        ..DatabaseConfig::default()
    };
    let store = SqliteRecordStore::new(&config, &TableConfig::default()).expect("build store");

    sqlx::query(
        "CREATE TABLE tds_data (
            pan TEXT,
            total_tds REAL,
            pan_valid INTEGER,
            pan_msg TEXT,
            last_checked TEXT
        )",
    )
    .execute(store.pool().pool())
    .await
    .expect("create table");

    for (pan, total) in rows {
        sqlx::query("INSERT INTO tds_data (pan, total_tds) VALUES (?, ?)")
            .bind(*pan)
            .bind(*total)
            .execute(store.pool().pool())
            .await
            .expect("insert row");
    }
    store
}

fn by_priority(limit: u32, offset: u32, exclude: &[RecordKey]) -> SelectionQuery<'_> {
    SelectionQuery {
        order_by: "total_tds",
        direction: SortOrder::Desc,
        limit,
        offset,
        exclude,
    }
}

fn keys(records: &[panverify_core::Record]) -> Vec<RecordKey> {
    records.iter().map(|r| r.key.clone()).collect()
}

#[tokio::test]
async fn test_selection_is_idempotent() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(&dir, &[("AAAAA1111A", 10.0), ("BBBBB2222B", 20.0)]).await;
    let mut session = store.acquire().await.expect("acquire session");

    let first = session
        .select_next_unprocessed(&by_priority(10, 0, &[]))
        .await
        .expect("first selection");
    let second = session
        .select_next_unprocessed(&by_priority(10, 0, &[]))
        .await
        .expect("second selection");

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
}

#[tokio::test]
async fn test_selection_orders_by_priority_then_key() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(
        &dir,
        &[
            ("AAAAA1111A", 5.0),
            ("BBBBB2222B", 50.0),
            ("CCCCC3333C", 5.0),
            ("DDDDD4444D", 500.0),
        ],
    )
    .await;
    let mut session = store.acquire().await.expect("acquire session");

    let desc = session
        .select_next_unprocessed(&by_priority(10, 0, &[]))
        .await
        .expect("select desc");
    assert_eq!(
        keys(&desc),
        vec![
            RecordKey::Id(4),
            RecordKey::Id(2),
            RecordKey::Id(1),
            RecordKey::Id(3)
        ]
    );

    let asc = session
        .select_next_unprocessed(&SelectionQuery {
            direction: SortOrder::Asc,
            ..by_priority(10, 0, &[])
        })
        .await
        .expect("select asc");
    assert_eq!(
        keys(&asc),
        vec![
            RecordKey::Id(1),
            RecordKey::Id(3),
            RecordKey::Id(2),
            RecordKey::Id(4)
        ]
    );
}

#[tokio::test]
async fn test_limit_offset_and_exclusion() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(
        &dir,
        &[("AAAAA1111A", 4.0), ("BBBBB2222B", 3.0), ("CCCCC3333C", 2.0)],
    )
    .await;
    let mut session = store.acquire().await.expect("acquire session");

    let page = session
        .select_next_unprocessed(&by_priority(1, 1, &[]))
        .await
        .expect("select page");
    assert_eq!(keys(&page), vec![RecordKey::Id(2)]);

    let excluded = [RecordKey::Id(1), RecordKey::Id(2)];
    let rest = session
        .select_next_unprocessed(&by_priority(10, 0, &excluded))
        .await
        .expect("select with exclusion");
    assert_eq!(keys(&rest), vec![RecordKey::Id(3)]);
}

#[tokio::test]
async fn test_update_marks_record_processed() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(&dir, &[("abcde1234f", 1.0), ("BBBBB2222B", 0.5)]).await;
    let mut session = store.acquire().await.expect("acquire session");

    let checked_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
    let changed = session
        .update_outcome(
            &RecordKey::Id(1),
            &VerificationOutcome::valid("Existing and Valid"),
            checked_at,
        )
        .await
        .expect("update outcome");
    assert_eq!(changed, 1);

    let remaining = session
        .select_next_unprocessed(&by_priority(10, 0, &[]))
        .await
        .expect("select remaining");
    assert_eq!(keys(&remaining), vec![RecordKey::Id(2)]);

    let (valid, msg, checked): (Option<i64>, Option<String>, Option<String>) =
        sqlx::query_as("SELECT pan_valid, pan_msg, last_checked FROM tds_data WHERE rowid = 1")
            .fetch_one(&mut *store.pool().acquire().await.expect("second connection"))
            .await
            .expect("read back");
    assert_eq!(valid, Some(1));
    assert_eq!(msg.as_deref(), Some("Existing and Valid"));
    assert_eq!(
        checked.as_deref().and_then(panverify_core::types::parse_timestamp),
        Some(checked_at)
    );
}

#[tokio::test]
async fn test_identifier_scope_updates_all_variants() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(
        &dir,
        &[
            ("ABCDE1234F", 3.0),
            (" abcde1234f ", 2.0),
            ("ZZZZZ9999Z", 1.0),
        ],
    )
    .await;
    let mut session = store.acquire().await.expect("acquire session");

    let changed = session
        .update_outcome_by_identifier(
            &Pan::normalize(Some("abcde1234f")),
            &VerificationOutcome::invalid("Not found"),
            Utc::now(),
        )
        .await
        .expect("update by identifier");
    assert_eq!(changed, 2);

    let counts = session.counts().await.expect("counts");
    assert_eq!(counts.total, 3);
    assert_eq!(counts.unchecked, 1);
    assert_eq!(counts.valid, 0);
    assert_eq!(counts.invalid, 2);
}

#[tokio::test]
async fn test_failed_write_leaves_record_unprocessed() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(&dir, &[("ABCDE1234F", 1.0)]).await;
    sqlx::query(
        "CREATE TRIGGER reject_writes BEFORE UPDATE ON tds_data
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(store.pool().pool())
    .await
    .expect("create trigger");

    let mut session = store.acquire().await.expect("acquire session");
    let result = session
        .update_outcome(
            &RecordKey::Id(1),
            &VerificationOutcome::valid("ok"),
            Utc::now(),
        )
        .await;
    assert!(matches!(result, Err(StoreError::Sqlx(_))));

    let remaining = session
        .select_next_unprocessed(&by_priority(10, 0, &[]))
        .await
        .expect("select after failure");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].validation_state, ValidationState::Unchecked);
}

#[tokio::test]
async fn test_verify_schema_reports_missing_pieces() {
    let dir = TempDir::new().expect("create temp dir");
    let store = seeded_store(&dir, &[]).await;
    let mut session = store.acquire().await.expect("acquire session");

    session.verify_schema(&[]).await.expect("default layout");

    let result = session.verify_schema(&["amount"]).await;
    assert!(matches!(
        result,
        Err(StoreError::MissingColumn { ref column, .. }) if column == "amount"
    ));
    drop(session);

    let table = TableConfig {
        name: "excel_data".to_string(),
        ..TableConfig::default()
    };
    let other = SqliteRecordStore::from_pool(
        panverify_db::StorePool::from_pool(store.pool().pool().clone()),
        &table,
    );
    let mut session = other.acquire().await.expect("acquire session");
    let result = session.verify_schema(&[]).await;
    assert!(matches!(result, Err(StoreError::MissingTable { .. })));
    assert!(result.is_err_and(|e| e.is_configuration()));
}
