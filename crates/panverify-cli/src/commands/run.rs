use anyhow::{Context, Result};
use panverify_client::PanVerifier;
use panverify_core::AppConfig;
use panverify_db::AnyRecordStore;
use panverify_pipeline::{ConsoleReporter, Pipeline, PipelineOptions};

use crate::error::Exit;

/// Execute the `run` command: verify records until the table drains.
pub async fn execute(config: &AppConfig) -> Result<Exit> {
    let store = AnyRecordStore::connect(&config.database, &config.table)
        .context("failed to open record store")?;
    let verifier =
        PanVerifier::from_config(&config.service).context("failed to build verification client")?;
    let options = PipelineOptions::from_config(config);

    tracing::info!(
        table = %config.table.name,
        service = %config.service.url,
        "Starting verification run"
    );

    let mut pipeline = Pipeline::new(store, verifier, ConsoleReporter::stdout(), options);
    let result = pipeline.run().await;
    pipeline.store().close().await;

    let summary = result.context("run aborted")?;
    Ok(if summary.success {
        Exit::Success
    } else {
        Exit::CompletedWithErrors
    })
}
