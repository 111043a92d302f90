//! Record store adapter.
//!
//! [`RecordStore`] hands out one [`StoreSession`] per unit of work. A session
//! owns a single pooled connection, so everything the pipeline does between
//! selection and persistence happens on the same connection, and the
//! connection goes back to the pool when the session is dropped.

use crate::connection::StorePool;
use crate::error::{Result, StoreError};
use crate::layout::{Dialect, TableLayout};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panverify_core::types::parse_timestamp;
use panverify_core::{
    DatabaseConfig, Pan, Record, RecordKey, SortOrder, TableConfig, ValidationState,
    VerificationOutcome,
};
use serde::{Deserialize, Serialize};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Connection, QueryBuilder, Row, Sqlite};
use std::sync::Arc;

/// Parameters of one candidate selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectionQuery<'a> {
    /// Column candidates are ordered by
    pub order_by: &'a str,
    /// Ordering direction; ties always break by ascending key
    pub direction: SortOrder,
    /// Maximum rows returned
    pub limit: u32,
    /// Rows skipped after ordering
    pub offset: u32,
    /// Keys to leave out even if still unprocessed
    pub exclude: &'a [RecordKey],
}

/// Aggregate state of the target table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounts {
    /// All rows
    pub total: i64,
    /// Rows with no committed attempt
    pub unchecked: i64,
    /// Rows marked valid
    pub valid: i64,
    /// Rows marked invalid or failed
    pub invalid: i64,
}

/// Source of store sessions.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Session type produced by [`RecordStore::acquire`].
    type Session: StoreSession;

    /// Open a session on a fresh connection.
    ///
    /// Connectivity failures are reported as errors for which
    /// [`StoreError::is_connectivity`] holds; the caller decides whether to
    /// wait and retry.
    async fn acquire(&self) -> Result<Self::Session>;
}

/// Operations available while a connection is held.
#[async_trait]
pub trait StoreSession: Send {
    /// Check that the table and every mapped column exist.
    ///
    /// `extra_columns` names additional columns the caller relies on, such as
    /// a custom ordering field.
    async fn verify_schema(&mut self, extra_columns: &[&str]) -> Result<()>;

    /// Select unprocessed records in the requested order.
    ///
    /// Side-effect free: calling it twice without an intervening update
    /// returns the same records.
    async fn select_next_unprocessed(&mut self, query: &SelectionQuery<'_>)
        -> Result<Vec<Record>>;

    /// Persist an outcome to the row with `key`, atomically.
    ///
    /// Returns the number of rows changed. Zero matches is an error and
    /// leaves the table untouched.
    async fn update_outcome(
        &mut self,
        key: &RecordKey,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Persist an outcome to every row whose normalized identifier matches.
    async fn update_outcome_by_identifier(
        &mut self,
        identifier: &Pan,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64>;

    /// Count rows by validation state.
    async fn counts(&mut self) -> Result<StoreCounts>;
}

/// `SQLite` implementation of [`RecordStore`].
#[derive(Debug)]
pub struct SqliteRecordStore {
    pool: StorePool,
    layout: Arc<TableLayout>,
}

impl SqliteRecordStore {
    /// Build a store from configuration. No connection is opened yet.
    pub fn new(database: &DatabaseConfig, table: &TableConfig) -> Result<Self> {
        Ok(Self::from_pool(StorePool::new(database)?, table))
    }

    /// Build a store over an existing pool.
    #[must_use]
    pub fn from_pool(pool: StorePool, table: &TableConfig) -> Self {
        Self {
            pool,
            layout: Arc::new(TableLayout::new(Dialect::Sqlite, table)),
        }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &StorePool {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    type Session = SqliteSession;

    async fn acquire(&self) -> Result<SqliteSession> {
        let conn = self.pool.acquire().await?;
        Ok(SqliteSession {
            conn,
            layout: Arc::clone(&self.layout),
        })
    }
}

/// One held connection plus the table layout.
#[derive(Debug)]
pub struct SqliteSession {
    conn: PoolConnection<Sqlite>,
    layout: Arc<TableLayout>,
}

impl SqliteSession {
    async fn write_outcome(
        &mut self,
        sql: &str,
        target: Target<'_>,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let valid = outcome.is_valid.map(i64::from);
        let checked_at = checked_at.to_rfc3339();

        let mut tx = self.conn.begin().await?;
        let query = sqlx::query(sql)
            .bind(valid)
            .bind(outcome.message.as_str())
            .bind(checked_at);
        let query = match target {
            Target::Key(RecordKey::Id(id)) => query.bind(*id),
            Target::Key(RecordKey::Text(text)) => query.bind(text.as_str()),
            Target::Identifier(pan) => query.bind(pan.as_str()),
        };
        let affected = query.execute(&mut *tx).await?.rows_affected();

        if affected == 0 {
            tx.rollback().await?;
            return Err(StoreError::NotFound(target.to_string()));
        }
        tx.commit().await?;

        tracing::debug!(%target, rows = affected, "Outcome persisted");
        Ok(affected)
    }
}

/// Rows an outcome is written to.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Target<'a> {
    Key(&'a RecordKey),
    Identifier(&'a Pan),
}

impl std::fmt::Display for Target<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Key(key) => write!(f, "key {key}"),
            Self::Identifier(pan) => write!(f, "identifier '{pan}'"),
        }
    }
}

#[async_trait]
impl StoreSession for SqliteSession {
    async fn verify_schema(&mut self, extra_columns: &[&str]) -> Result<()> {
        let table = self.layout.table_name().to_string();

        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM sqlite_master WHERE type IN ('table', 'view') AND name = ? COLLATE NOCASE",
        )
        .bind(&table)
        .fetch_optional(&mut *self.conn)
        .await?;
        if exists.is_none() {
            return Err(StoreError::MissingTable { table });
        }

        let present: Vec<String> = sqlx::query_scalar("SELECT name FROM pragma_table_info(?)")
            .bind(&table)
            .fetch_all(&mut *self.conn)
            .await?;

        for column in self.layout.required_columns(extra_columns) {
            if !present.iter().any(|p| p.eq_ignore_ascii_case(column)) {
                return Err(StoreError::MissingColumn {
                    table,
                    column: column.to_string(),
                });
            }
        }

        tracing::debug!(table = %table, columns = present.len(), "Schema verified");
        Ok(())
    }

    async fn select_next_unprocessed(
        &mut self,
        query: &SelectionQuery<'_>,
    ) -> Result<Vec<Record>> {
        let mut builder = QueryBuilder::<Sqlite>::new(self.layout.select_head());
        if !query.exclude.is_empty() {
            builder.push(self.layout.exclusion_open());
            let mut keys = builder.separated(", ");
            for key in query.exclude {
                match key {
                    RecordKey::Id(id) => keys.push_bind(*id),
                    RecordKey::Text(text) => keys.push_bind(text.clone()),
                };
            }
            keys.push_unseparated(")");
        }
        builder.push(self.layout.order_clause(query.order_by, query.direction));
        builder.push(" LIMIT ");
        builder.push_bind(i64::from(query.limit));
        builder.push(" OFFSET ");
        builder.push_bind(i64::from(query.offset));

        let rows = builder.build().fetch_all(&mut *self.conn).await?;
        let records = rows.iter().map(decode_record).collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            selected = records.len(),
            limit = query.limit,
            offset = query.offset,
            excluded = query.exclude.len(),
            "Selected unprocessed records"
        );
        Ok(records)
    }

    async fn update_outcome(
        &mut self,
        key: &RecordKey,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let sql = self.layout.update_by_key();
        self.write_outcome(&sql, Target::Key(key), outcome, checked_at)
            .await
    }

    async fn update_outcome_by_identifier(
        &mut self,
        identifier: &Pan,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let sql = self.layout.update_by_identifier();
        self.write_outcome(&sql, Target::Identifier(identifier), outcome, checked_at)
            .await
    }

    async fn counts(&mut self) -> Result<StoreCounts> {
        let (total, unchecked, valid, invalid): (i64, i64, i64, i64) =
            sqlx::query_as(&self.layout.counts())
                .fetch_one(&mut *self.conn)
                .await?;
        Ok(StoreCounts {
            total,
            unchecked,
            valid,
            invalid,
        })
    }
}

fn decode_record(row: &SqliteRow) -> Result<Record> {
    let key = match row.try_get::<i64, _>("rec_key") {
        Ok(id) => RecordKey::Id(id),
        Err(_) => row
            .try_get::<String, _>("rec_key")
            .map(RecordKey::Text)
            .map_err(|e| StoreError::Decode(format!("record key: {e}")))?,
    };

    Ok(RawRecord {
        key,
        identifier: row.try_get("rec_identifier")?,
        priority: row.try_get("rec_priority")?,
        valid: row.try_get("rec_valid")?,
        message: row.try_get("rec_message")?,
        checked: row.try_get("rec_checked")?,
    }
    .into_record())
}

/// Column values of one selected row before normalization.
pub(crate) struct RawRecord {
    pub(crate) key: RecordKey,
    pub(crate) identifier: Option<String>,
    pub(crate) priority: Option<f64>,
    pub(crate) valid: Option<i64>,
    pub(crate) message: Option<String>,
    pub(crate) checked: Option<String>,
}

impl RawRecord {
    pub(crate) fn into_record(self) -> Record {
        Record {
            key: self.key,
            identifier: Pan::normalize(self.identifier.as_deref()),
            priority_metric: self.priority,
            validation_state: ValidationState::from_columns(self.message.as_deref(), self.valid),
            validation_message: self.message,
            last_checked_at: self.checked.as_deref().and_then(parse_timestamp),
        }
    }
}
