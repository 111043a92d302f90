use anyhow::{Context, Result};
use panverify_client::HttpPanApi;
use panverify_core::AppConfig;
use panverify_db::{AnyRecordStore, RecordStore, StoreSession};

use crate::error::Exit;

/// Execute the `check` command: validate everything a run needs without
/// touching any record or calling the service.
pub async fn execute(config: &AppConfig) -> Result<Exit> {
    println!("Configuration: OK");

    let api =
        HttpPanApi::new(config.service.clone()).context("failed to build verification client")?;
    println!("Verification client: OK ({})", api.config().url);

    let store = AnyRecordStore::connect(&config.database, &config.table)
        .context("failed to open record store")?;
    let result = check_table(&store, config).await;
    store.close().await;
    result?;

    Ok(Exit::Success)
}

async fn check_table(store: &AnyRecordStore, config: &AppConfig) -> Result<()> {
    let mut session = store
        .acquire()
        .await
        .context("failed to connect to record store")?;
    println!("Record store: OK");

    let ordering = config.selection.ordering_column(&config.table.columns);
    session.verify_schema(&[ordering]).await?;
    println!("Table '{}': OK", config.table.name);
    Ok(())
}
