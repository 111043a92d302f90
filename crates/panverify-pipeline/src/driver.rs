//! The verification run loop.
//!
//! One run repeats a unit of work until no selectable record is left:
//!
//! ```text
//! acquire connection -> select candidates -> for each candidate:
//!     rate-limit wait -> verify -> persist -> report
//! ```
//!
//! Connectivity problems while acquiring or selecting are waited out with the
//! reconnect policy. Persistence failures are counted and the record is left
//! out of later selections in the same run, so the loop always advances. The
//! run stops early once `max_write_failures` records have been left out.

use crate::error::{PipelineError, Result};
use crate::rate_limit::RateLimiter;
use crate::report::Reporter;
use chrono::Utc;
use panverify_client::Verifier;
use panverify_core::{
    AppConfig, Pan, Record, RecordKey, RetryPolicy, SelectionMode, SortOrder, UpdateScope,
    VerificationOutcome,
};
use panverify_db::{RecordStore, SelectionQuery, StoreError, StoreSession};
use std::collections::HashSet;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

/// Counters of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records whose outcome was committed
    pub processed: u64,
    /// Records whose outcome could not be committed
    pub errors: u64,
    /// `true` when no persistence error occurred
    pub success: bool,
}

impl RunSummary {
    /// Summary for the given counters.
    #[must_use]
    pub fn new(processed: u64, errors: u64) -> Self {
        Self {
            processed,
            errors,
            success: errors == 0,
        }
    }
}

/// Selection, pacing and persistence settings of a run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Column candidates are ordered by
    pub order_by: String,
    /// Ordering direction
    pub direction: SortOrder,
    /// Single-record or batch selection
    pub mode: SelectionMode,
    /// Records per selection in batch mode
    pub batch_limit: u32,
    /// Rows skipped by the first selection only
    pub batch_offset: u32,
    /// Rows an outcome is written to
    pub update_scope: UpdateScope,
    /// Minimum time between verification calls
    pub min_call_interval: Duration,
    /// Policy for acquiring a connection and selecting
    pub reconnect: RetryPolicy,
    /// Progress report cadence in processed records
    pub report_every: u64,
    /// Persistence failures after which the run stops
    pub max_write_failures: usize,
}

impl PipelineOptions {
    /// Derive run options from the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let selection = &config.selection;
        Self {
            order_by: selection.ordering_column(&config.table.columns).to_string(),
            direction: selection.order,
            mode: selection.mode,
            batch_limit: selection.batch_limit,
            batch_offset: selection.batch_offset,
            update_scope: selection.update_scope,
            min_call_interval: config.pipeline.min_call_interval(),
            reconnect: config.pipeline.reconnect_policy(),
            report_every: config.pipeline.report_every.max(1),
            max_write_failures: usize::try_from(config.pipeline.max_write_failures)
                .unwrap_or(usize::MAX)
                .max(1),
        }
    }

    fn limit(&self) -> u32 {
        match self.mode {
            SelectionMode::Single => 1,
            SelectionMode::Batch => self.batch_limit.max(1),
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Drives records from unprocessed to processed.
pub struct Pipeline<S, V, R> {
    store: S,
    verifier: V,
    reporter: R,
    options: PipelineOptions,
}

/// State carried across units of work within one run.
struct RunState {
    processed: u64,
    errors: u64,
    excluded: Vec<RecordKey>,
    first_selection: bool,
    schema_checked: bool,
    halted: bool,
    limiter: RateLimiter,
}

impl RunState {
    fn summary(&self) -> RunSummary {
        RunSummary::new(self.processed, self.errors)
    }
}

impl<S, V, R> Pipeline<S, V, R>
where
    S: RecordStore,
    V: Verifier,
    R: Reporter,
{
    /// Assemble a pipeline.
    pub fn new(store: S, verifier: V, reporter: R, options: PipelineOptions) -> Self {
        Self {
            store,
            verifier,
            reporter,
            options,
        }
    }

    /// The record store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The verifier.
    pub fn verifier(&self) -> &V {
        &self.verifier
    }

    /// The reporter.
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Run options.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Process records until none is selectable.
    ///
    /// # Errors
    /// Returns `PipelineError::Configuration` if the table does not match the
    /// configured layout, and `PipelineError::StoreUnavailable` if a bounded
    /// reconnect budget runs out. Persistence failures are not errors; they
    /// are counted in the returned summary.
    pub async fn run(&mut self) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("run", %run_id);
        self.run_inner().instrument(span).await
    }

    async fn run_inner(&mut self) -> Result<RunSummary> {
        tracing::info!(
            order_by = %self.options.order_by,
            direction = self.options.direction.as_sql(),
            mode = ?self.options.mode,
            limit = self.options.limit(),
            offset = self.options.batch_offset,
            scope = ?self.options.update_scope,
            "Run started"
        );

        let mut state = RunState {
            processed: 0,
            errors: 0,
            excluded: Vec::new(),
            first_selection: true,
            schema_checked: false,
            halted: false,
            limiter: RateLimiter::new(self.options.min_call_interval),
        };

        loop {
            let (mut session, records) = self.open_unit(&state).await?;
            state.schema_checked = true;
            state.first_selection = false;

            if records.is_empty() {
                break;
            }
            tracing::debug!(count = records.len(), "Processing unit of work");

            self.process_unit(&mut session, records, &mut state).await;
            // Connection goes back to the pool before the next selection.
            drop(session);

            if state.halted {
                tracing::error!(
                    failures = state.excluded.len(),
                    "Too many outcomes could not be saved, stopping run"
                );
                break;
            }
        }

        let summary = state.summary();
        tracing::info!(
            processed = summary.processed,
            errors = summary.errors,
            "Run drained"
        );
        self.reporter.on_finish(&summary);
        Ok(summary)
    }

    /// Acquire a session and select the next candidates, waiting out
    /// connectivity failures.
    async fn open_unit(&self, state: &RunState) -> Result<(S::Session, Vec<Record>)> {
        let options = &self.options;
        let store = &self.store;
        let query = SelectionQuery {
            order_by: &options.order_by,
            direction: options.direction,
            limit: options.limit(),
            offset: if state.first_selection {
                options.batch_offset
            } else {
                0
            },
            exclude: &state.excluded,
        };
        let check_schema = !state.schema_checked;

        let result = options
            .reconnect
            .run(
                |attempt| async move {
                    if attempt > 1 {
                        tracing::info!(attempt, "Reconnecting to record store");
                    }
                    // Configuration errors pass through as a successful attempt
                    // so the policy does not retry them.
                    match select(store, &query, check_schema).await {
                        Ok(unit) => Ok(Ok(unit)),
                        Err(e) if e.is_configuration() => Ok(Err(e)),
                        Err(e) => Err(e),
                    }
                },
                |attempt, error| {
                    tracing::warn!(
                        attempt,
                        error = %error,
                        "Record store unavailable, retrying in {:?}",
                        options.reconnect.delay()
                    );
                },
            )
            .await;

        match result {
            Ok(Ok(unit)) => Ok(unit),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Record store does not match configuration");
                Err(PipelineError::Configuration(e))
            }
            Err(exhausted) => Err(PipelineError::StoreUnavailable {
                attempts: exhausted.attempts,
                source: exhausted.last_error,
            }),
        }
    }

    async fn process_unit(
        &mut self,
        session: &mut S::Session,
        records: Vec<Record>,
        state: &mut RunState,
    ) {
        // Identifiers already written in this unit under identifier scope.
        let mut written: HashSet<Pan> = HashSet::new();

        for record in records {
            if self.options.update_scope == UpdateScope::Identifier
                && written.contains(&record.identifier)
            {
                tracing::debug!(key = %record.key, "Already updated via identifier, skipping");
                continue;
            }

            let outcome = if record.identifier.is_empty() {
                VerificationOutcome::empty_identifier()
            } else {
                state.limiter.acquire().await;
                self.verifier.verify(&record.identifier).await
            };

            match self.persist(session, &record, &outcome).await {
                Ok(rows) => {
                    state.processed += 1;
                    tracing::debug!(key = %record.key, rows, "Record processed");
                    if self.options.update_scope == UpdateScope::Identifier {
                        written.insert(record.identifier.clone());
                    }
                    self.reporter.on_outcome(&record, &outcome);
                    if state.processed % self.options.report_every == 0 {
                        self.reporter.on_progress(&state.summary());
                    }
                }
                Err(e) => {
                    state.errors += 1;
                    self.reporter.on_error(&record, &e);
                    state.excluded.push(record.key.clone());
                    if state.excluded.len() >= self.options.max_write_failures {
                        state.halted = true;
                        break;
                    }
                    if e.is_connectivity() {
                        // Remaining candidates are picked up by the next unit.
                        break;
                    }
                }
            }
        }
    }

    async fn persist(
        &self,
        session: &mut S::Session,
        record: &Record,
        outcome: &VerificationOutcome,
    ) -> std::result::Result<u64, StoreError> {
        let checked_at = Utc::now();
        match self.options.update_scope {
            UpdateScope::Identifier if !record.identifier.is_empty() => {
                session
                    .update_outcome_by_identifier(&record.identifier, outcome, checked_at)
                    .await
            }
            _ => {
                session
                    .update_outcome(&record.key, outcome, checked_at)
                    .await
            }
        }
    }
}

async fn select<S: RecordStore>(
    store: &S,
    query: &SelectionQuery<'_>,
    check_schema: bool,
) -> std::result::Result<(S::Session, Vec<Record>), StoreError> {
    let mut session = store.acquire().await?;
    if check_schema {
        session.verify_schema(&[query.order_by]).await?;
    }
    let records = session.select_next_unprocessed(query).await?;
    Ok((session, records))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_success_flag() {
        assert!(RunSummary::new(0, 0).success);
        assert!(RunSummary::new(5, 0).success);
        assert!(!RunSummary::new(5, 1).success);
    }

    #[test]
    fn test_options_from_config() {
        let mut config = AppConfig::default();
        config.selection.mode = SelectionMode::Batch;
        config.selection.batch_limit = 25;
        config.selection.ordering_field = Some("amount".to_string());

        let options = PipelineOptions::from_config(&config);
        assert_eq!(options.order_by, "amount");
        assert_eq!(options.limit(), 25);
        assert_eq!(options.min_call_interval, Duration::from_secs(5));
        assert_eq!(options.reconnect.max_attempts(), None);
        assert_eq!(options.max_write_failures, 1000);

        config.selection.mode = SelectionMode::Single;
        assert_eq!(PipelineOptions::from_config(&config).limit(), 1);
    }
}
