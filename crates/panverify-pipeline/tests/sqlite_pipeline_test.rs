mod common;

use common::{RecordingReporter, ScriptedVerifier};
use panverify_core::{
    DatabaseConfig, RecordKey, SelectionMode, TableConfig, UpdateScope, VerificationOutcome,
};
use panverify_db::{RecordStore, SqliteRecordStore, StoreSession};
use panverify_pipeline::{Pipeline, PipelineOptions, RunSummary};
use std::time::Duration;
use tempfile::TempDir;

async fn store_with(dir: &TempDir, pans: &[(&str, f64)]) -> SqliteRecordStore {
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
    for (pan, total) in pans {
        sqlx::query("INSERT INTO tds_data (pan, total_tds) VALUES (?, ?)")
            .bind(*pan)
            .bind(*total)
            .execute(store.pool().pool())
            .await
            .expect("insert row");
    }
    store
}

fn fast_options() -> PipelineOptions {
    PipelineOptions {
        min_call_interval: Duration::ZERO,
        ..PipelineOptions::default()
    }
}

async fn row(store: &SqliteRecordStore, rowid: i64) -> (Option<i64>, Option<String>, Option<String>) {
    sqlx::query_as("SELECT pan_valid, pan_msg, last_checked FROM tds_data WHERE rowid = ?")
        .bind(rowid)
        .fetch_one(store.pool().pool())
        .await
        .expect("read row")
}

#[tokio::test]
async fn test_two_record_run_end_to_end() {
    let dir = TempDir::new().expect("create temp dir");
    let store = store_with(&dir, &[("ABCDE1234F", 100.0), ("", 50.0)]).await;
    let verifier = ScriptedVerifier::default().answer(
        "ABCDE1234F",
        VerificationOutcome::valid("Existing and Valid. PAN is Operative"),
    );
    let mut pipeline = Pipeline::new(store, verifier, RecordingReporter::default(), fast_options());

    let summary = pipeline.run().await.expect("run");

    assert_eq!(summary, RunSummary::new(2, 0));
    assert_eq!(pipeline.verifier().called_pans(), vec!["ABCDE1234F"]);

    let (valid, msg, checked) = row(pipeline.store(), 1).await;
    assert_eq!(valid, Some(1));
    assert_eq!(msg.as_deref(), Some("Existing and Valid. PAN is Operative"));
    assert!(checked.is_some());

    let (valid, msg, _) = row(pipeline.store(), 2).await;
    assert_eq!(valid, Some(0));
    assert_eq!(msg.as_deref(), Some("empty identifier"));
}

#[tokio::test]
async fn test_second_run_finds_nothing_to_do() {
    let dir = TempDir::new().expect("create temp dir");
    let store = store_with(&dir, &[("AAAAA1111A", 2.0), ("BBBBB2222B", 1.0)]).await;
    let mut pipeline = Pipeline::new(
        store,
        ScriptedVerifier::default(),
        RecordingReporter::default(),
        fast_options(),
    );
    assert_eq!(pipeline.run().await.expect("first run").processed, 2);

    let summary = pipeline.run().await.expect("second run");
    assert_eq!(summary, RunSummary::new(0, 0));
    assert_eq!(pipeline.verifier().calls().len(), 2);
}

#[tokio::test]
async fn test_rejected_write_leaves_record_for_next_run() {
    let dir = TempDir::new().expect("create temp dir");
    let store = store_with(
        &dir,
        &[("AAAAA1111A", 3.0), ("BBBBB2222B", 2.0), ("CCCCC3333C", 1.0)],
    )
    .await;
    sqlx::query(
        "CREATE TRIGGER reject_b BEFORE UPDATE ON tds_data
         WHEN NEW.pan = 'BBBBB2222B'
         BEGIN SELECT RAISE(ABORT, 'rejected'); END",
    )
    .execute(store.pool().pool())
    .await
    .expect("create trigger");

    let mut pipeline = Pipeline::new(
        store,
        ScriptedVerifier::default(),
        RecordingReporter::default(),
        fast_options(),
    );
    let summary = pipeline.run().await.expect("run terminates");

    assert_eq!(summary.processed, 2);
    assert_eq!(summary.errors, 1);
    assert!(!summary.success);
    assert_eq!(pipeline.reporter().errors, vec![RecordKey::Id(2)]);

    let (valid, msg, checked) = row(pipeline.store(), 2).await;
    assert_eq!((valid, msg, checked), (None, None, None));

    let mut session = pipeline.store().acquire().await.expect("acquire");
    let counts = session.counts().await.expect("counts");
    assert_eq!(counts.unchecked, 1);
    assert_eq!(counts.valid, 2);
}

#[tokio::test]
async fn test_batch_identifier_scope_against_sqlite() {
    let dir = TempDir::new().expect("create temp dir");
    let store = store_with(
        &dir,
        &[("ABCDE1234F", 3.0), ("abcde1234f ", 2.0), ("ZZZZZ9999Z", 1.0)],
    )
    .await;
    let verifier = ScriptedVerifier::default()
        .answer("ZZZZZ9999Z", VerificationOutcome::invalid("PAN does not exist"));
    let options = PipelineOptions {
        mode: SelectionMode::Batch,
        batch_limit: 10,
        update_scope: UpdateScope::Identifier,
        ..fast_options()
    };
    let mut pipeline = Pipeline::new(store, verifier, RecordingReporter::default(), options);

    let summary = pipeline.run().await.expect("run");

    assert_eq!(summary.processed, 2);
    assert_eq!(pipeline.verifier().calls().len(), 2);
    let (valid, msg, _) = row(pipeline.store(), 2).await;
    assert_eq!(valid, Some(1));
    assert_eq!(msg.as_deref(), Some("Existing and Valid"));
    let (valid, _, _) = row(pipeline.store(), 3).await;
    assert_eq!(valid, Some(0));
}

#[tokio::test]
async fn test_unknown_ordering_column_is_fatal() {
    let dir = TempDir::new().expect("create temp dir");
    let store = store_with(&dir, &[("AAAAA1111A", 1.0)]).await;
    let options = PipelineOptions {
        order_by: "amount".to_string(),
        ..fast_options()
    };
    let mut pipeline = Pipeline::new(
        store,
        ScriptedVerifier::default(),
        RecordingReporter::default(),
        options,
    );

    let err = pipeline.run().await.expect_err("schema mismatch");
    assert!(err.is_configuration());
    assert!(err.to_string().contains("amount"));
}
