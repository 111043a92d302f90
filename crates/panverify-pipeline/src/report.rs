//! Progress reporting for pipeline runs.
//!
//! Reporting is observational only: nothing a [`Reporter`] does can change
//! which records are processed or what is persisted.

use crate::driver::RunSummary;
use panverify_core::{Record, VerificationOutcome};
use panverify_db::StoreError;
use std::io::{self, Write};

/// Receives pipeline events as they happen.
pub trait Reporter: Send {
    /// An outcome was committed for `record`.
    fn on_outcome(&mut self, record: &Record, outcome: &VerificationOutcome);

    /// Persisting the outcome for `record` failed; it stays unprocessed.
    fn on_error(&mut self, record: &Record, error: &StoreError);

    /// Periodic snapshot of the run counters.
    fn on_progress(&mut self, summary: &RunSummary);

    /// The run drained.
    fn on_finish(&mut self, summary: &RunSummary);
}

/// Line-oriented reporter for a terminal or log file.
///
/// Every line is also emitted as a `tracing` event.
#[derive(Debug)]
pub struct ConsoleReporter<W = io::Stdout> {
    out: W,
}

impl ConsoleReporter<io::Stdout> {
    /// Reporter writing to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl Default for ConsoleReporter<io::Stdout> {
    fn default() -> Self {
        Self::stdout()
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    /// Reporter writing to `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Consume the reporter and return its writer.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        // A closed stdout must not abort the run.
        if let Err(e) = writeln!(self.out, "{text}") {
            tracing::debug!("Failed to write progress line: {}", e);
        }
    }
}

fn verdict(outcome: &VerificationOutcome) -> &'static str {
    match outcome.is_valid {
        Some(true) => "valid",
        Some(false) => "invalid",
        None => "unknown",
    }
}

impl<W: Write + Send> Reporter for ConsoleReporter<W> {
    fn on_outcome(&mut self, record: &Record, outcome: &VerificationOutcome) {
        tracing::info!(
            key = %record.key,
            pan = %record.identifier,
            valid = ?outcome.is_valid,
            message = %outcome.message,
            "Outcome saved"
        );
        self.line(&format!(
            "{} [{}]: {} - {}",
            record.identifier,
            record.key,
            verdict(outcome),
            outcome.message
        ));
    }

    fn on_error(&mut self, record: &Record, error: &StoreError) {
        tracing::error!(key = %record.key, pan = %record.identifier, error = %error, "Failed to save outcome");
        self.line(&format!(
            "{} [{}]: not saved - {}",
            record.identifier, record.key, error
        ));
    }

    fn on_progress(&mut self, summary: &RunSummary) {
        tracing::info!(
            processed = summary.processed,
            errors = summary.errors,
            "Progress"
        );
        self.line(&format!(
            "progress: processed={} errors={}",
            summary.processed, summary.errors
        ));
    }

    fn on_finish(&mut self, summary: &RunSummary) {
        tracing::info!(
            processed = summary.processed,
            errors = summary.errors,
            success = summary.success,
            "Run finished"
        );
        self.line(&format!(
            "processed={} errors={}",
            summary.processed, summary.errors
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panverify_core::{Pan, RecordKey, ValidationState};

    fn record(pan: &str) -> Record {
        Record {
            key: RecordKey::Id(7),
            identifier: Pan::normalize(Some(pan)),
            priority_metric: None,
            validation_state: ValidationState::Unchecked,
            validation_message: None,
            last_checked_at: None,
        }
    }

    fn output(reporter: ConsoleReporter<Vec<u8>>) -> String {
        String::from_utf8(reporter.into_inner()).expect("utf-8 output")
    }

    #[test]
    fn test_outcome_and_summary_lines() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.on_outcome(
            &record("abcde1234f"),
            &VerificationOutcome::valid("Existing and Valid"),
        );
        reporter.on_progress(&RunSummary::new(10, 1));
        reporter.on_finish(&RunSummary::new(12, 1));

        assert_eq!(
            output(reporter),
            "ABCDE1234F [7]: valid - Existing and Valid\n\
             progress: processed=10 errors=1\n\
             processed=12 errors=1\n"
        );
    }

    #[test]
    fn test_error_line() {
        let mut reporter = ConsoleReporter::new(Vec::new());
        reporter.on_error(
            &record("ABCDE1234F"),
            &StoreError::NotFound("key 7".to_string()),
        );
        assert_eq!(
            output(reporter),
            "ABCDE1234F [7]: not saved - no record matched key 7\n"
        );
    }
}
