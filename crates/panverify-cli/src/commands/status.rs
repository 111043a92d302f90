use anyhow::{Context, Result};
use panverify_core::AppConfig;
use panverify_db::{AnyRecordStore, RecordStore, StoreCounts, StoreSession};

use crate::error::Exit;

/// Execute the `status` command: print how far the table has progressed.
pub async fn execute(config: &AppConfig) -> Result<Exit> {
    let store = AnyRecordStore::connect(&config.database, &config.table)
        .context("failed to open record store")?;
    let counts = read_counts(&store).await;
    store.close().await;

    print!("{}", render(&config.table.name, &counts?));
    Ok(Exit::Success)
}

async fn read_counts(store: &AnyRecordStore) -> Result<StoreCounts> {
    let mut session = store
        .acquire()
        .await
        .context("failed to connect to record store")?;
    session.verify_schema(&[]).await?;
    Ok(session.counts().await?)
}

/// Render counts as the aligned block printed by `status`.
pub fn render(table: &str, counts: &StoreCounts) -> String {
    format!(
        "Table '{table}'\n  \
         Total:       {}\n  \
         Unchecked:   {}\n  \
         Valid:       {}\n  \
         Invalid:     {}\n",
        counts.total, counts.unchecked, counts.valid, counts.invalid
    )
}
