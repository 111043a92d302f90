//! In-memory fakes for driving the pipeline without a database or network.
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panverify_client::Verifier;
use panverify_core::{
    Pan, Record, RecordKey, SortOrder, ValidationState, VerificationOutcome,
};
use panverify_db::{Result, SelectionQuery, StoreCounts, StoreError, RecordStore, StoreSession};
use panverify_pipeline::{Reporter, RunSummary};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub struct Row {
    pub key: i64,
    pub pan: Option<String>,
    pub priority: f64,
    pub valid: Option<bool>,
    pub message: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Row>,
    failing_acquires: u32,
    rejected_keys: HashSet<i64>,
    missing_table: bool,
    acquired_at: Vec<Instant>,
}

/// Store over a vector of rows, sorted and filtered like the SQL adapter.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Rows keyed 1.. in the given order.
    pub fn with_rows(rows: &[(Option<&str>, f64)]) -> Self {
        let rows = rows
            .iter()
            .zip(1..)
            .map(|((pan, priority), key)| Row {
                key,
                pan: pan.map(ToString::to_string),
                priority: *priority,
                valid: None,
                message: None,
            })
            .collect();
        Self {
            inner: Arc::new(Mutex::new(Inner {
                rows,
                ..Inner::default()
            })),
        }
    }

    /// The next `n` acquisitions fail with a connection error.
    pub fn fail_acquires(&self, n: u32) {
        self.inner.lock().unwrap().failing_acquires = n;
    }

    /// Updates targeting `key` fail.
    pub fn reject_key(&self, key: i64) {
        self.inner.lock().unwrap().rejected_keys.insert(key);
    }

    pub fn drop_table(&self) {
        self.inner.lock().unwrap().missing_table = true;
    }

    pub fn row(&self, key: i64) -> Row {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.key == key)
            .cloned()
            .expect("row exists")
    }

    pub fn unprocessed(&self) -> usize {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|r| r.message.is_none())
            .count()
    }

    /// Instants of every acquisition attempt, failed ones included.
    pub fn acquired_at(&self) -> Vec<Instant> {
        self.inner.lock().unwrap().acquired_at.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    type Session = MemorySession;

    async fn acquire(&self) -> Result<MemorySession> {
        let mut inner = self.inner.lock().unwrap();
        inner.acquired_at.push(Instant::now());
        if inner.failing_acquires > 0 {
            inner.failing_acquires -= 1;
            return Err(StoreError::Connection("connection refused".to_string()));
        }
        Ok(MemorySession {
            inner: Arc::clone(&self.inner),
        })
    }
}

pub struct MemorySession {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySession {
    fn write(
        &self,
        matches: impl Fn(&Row) -> bool,
        outcome: &VerificationOutcome,
        target: String,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        let rejected = inner.rejected_keys.clone();
        if inner.rows.iter().any(|r| matches(r) && rejected.contains(&r.key)) {
            return Err(StoreError::Sqlx(sqlx::Error::Protocol(
                "write rejected".to_string(),
            )));
        }
        let mut changed = 0;
        for row in inner.rows.iter_mut().filter(|r| matches(r)) {
            row.valid = outcome.is_valid;
            row.message = Some(outcome.message.clone());
            changed += 1;
        }
        if changed == 0 {
            return Err(StoreError::NotFound(target));
        }
        Ok(changed)
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn verify_schema(&mut self, _extra_columns: &[&str]) -> Result<()> {
        if self.inner.lock().unwrap().missing_table {
            return Err(StoreError::MissingTable {
                table: "tds_data".to_string(),
            });
        }
        Ok(())
    }

    async fn select_next_unprocessed(
        &mut self,
        query: &SelectionQuery<'_>,
    ) -> Result<Vec<Record>> {
        let inner = self.inner.lock().unwrap();
        let mut rows: Vec<&Row> = inner
            .rows
            .iter()
            .filter(|r| r.message.is_none())
            .filter(|r| !query.exclude.contains(&RecordKey::Id(r.key)))
            .collect();
        rows.sort_by(|a, b| {
            let by_priority = a.priority.total_cmp(&b.priority);
            let by_priority = match query.direction {
                SortOrder::Asc => by_priority,
                SortOrder::Desc => by_priority.reverse(),
            };
            by_priority.then(a.key.cmp(&b.key))
        });
        Ok(rows
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .map(|r| Record {
                key: RecordKey::Id(r.key),
                identifier: Pan::normalize(r.pan.as_deref()),
                priority_metric: Some(r.priority),
                validation_state: ValidationState::Unchecked,
                validation_message: None,
                last_checked_at: None,
            })
            .collect())
    }

    async fn update_outcome(
        &mut self,
        key: &RecordKey,
        outcome: &VerificationOutcome,
        _checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let key = key.clone();
        self.write(
            |r| RecordKey::Id(r.key) == key,
            outcome,
            format!("key {key}"),
        )
    }

    async fn update_outcome_by_identifier(
        &mut self,
        identifier: &Pan,
        outcome: &VerificationOutcome,
        _checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        self.write(
            |r| Pan::normalize(r.pan.as_deref()) == *identifier,
            outcome,
            format!("identifier {identifier}"),
        )
    }

    async fn counts(&mut self) -> Result<StoreCounts> {
        let inner = self.inner.lock().unwrap();
        let mut counts = StoreCounts::default();
        for row in &inner.rows {
            counts.total += 1;
            match (&row.message, row.valid) {
                (None, _) => counts.unchecked += 1,
                (Some(_), Some(true)) => counts.valid += 1,
                (Some(_), _) => counts.invalid += 1,
            }
        }
        Ok(counts)
    }
}

/// Verifier answering from a table, valid by default, recording call times.
#[derive(Default)]
pub struct ScriptedVerifier {
    answers: HashMap<String, VerificationOutcome>,
    calls: Mutex<Vec<(String, Instant)>>,
}

impl ScriptedVerifier {
    pub fn answer(mut self, pan: &str, outcome: VerificationOutcome) -> Self {
        self.answers.insert(pan.to_string(), outcome);
        self
    }

    pub fn calls(&self) -> Vec<(String, Instant)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn called_pans(&self) -> Vec<String> {
        self.calls().into_iter().map(|(pan, _)| pan).collect()
    }
}

#[async_trait]
impl Verifier for ScriptedVerifier {
    async fn verify(&self, identifier: &Pan) -> VerificationOutcome {
        self.calls
            .lock()
            .unwrap()
            .push((identifier.to_string(), Instant::now()));
        self.answers
            .get(identifier.as_str())
            .cloned()
            .unwrap_or_else(|| VerificationOutcome::valid("Existing and Valid"))
    }
}

/// Reporter keeping every event for inspection.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub outcomes: Vec<(RecordKey, VerificationOutcome)>,
    pub errors: Vec<RecordKey>,
    pub progress: Vec<RunSummary>,
    pub finished: Option<RunSummary>,
}

impl Reporter for RecordingReporter {
    fn on_outcome(&mut self, record: &Record, outcome: &VerificationOutcome) {
        self.outcomes.push((record.key.clone(), outcome.clone()));
    }

    fn on_error(&mut self, record: &Record, _error: &StoreError) {
        self.errors.push(record.key.clone());
    }

    fn on_progress(&mut self, summary: &RunSummary) {
        self.progress.push(*summary);
    }

    fn on_finish(&mut self, summary: &RunSummary) {
        self.finished = Some(*summary);
    }
}
