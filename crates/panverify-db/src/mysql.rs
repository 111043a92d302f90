//! `MySQL` / `MariaDB` record store.
//!
//! Same contract as the `SQLite` store. Differences are confined to the SQL
//! dialect: backtick-quoted names, `information_schema` for the schema check,
//! and `YYYY-MM-DD HH:MM:SS` check timestamps so `DATETIME` columns accept
//! them.

use crate::error::{Result, StoreError};
use crate::layout::{Dialect, TableLayout};
use crate::store::{RawRecord, RecordStore, SelectionQuery, StoreCounts, StoreSession, Target};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panverify_core::{DatabaseConfig, Pan, Record, RecordKey, TableConfig, VerificationOutcome};
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions, MySqlRow};
use sqlx::pool::PoolConnection;
use sqlx::{Connection, MySql, Pool, QueryBuilder, Row};
use std::str::FromStr;
use std::sync::Arc;

/// Layout of check timestamps written to `MySQL`.
pub const MYSQL_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `MySQL` implementation of [`RecordStore`].
#[derive(Debug)]
pub struct MySqlRecordStore {
    pool: Pool<MySql>,
    layout: Arc<TableLayout>,
}

impl MySqlRecordStore {
    /// Build a store from configuration. No connection is opened yet.
    ///
    /// # Errors
    /// Returns `StoreError` if:
    /// - The connection URL cannot be parsed
    /// - An encryption key is configured (only `SQLite` stores support one)
    pub fn new(database: &DatabaseConfig, table: &TableConfig) -> Result<Self> {
        if database.encryption_key.is_some() {
            return Err(StoreError::InvalidKey(
                "encryption keys are only supported for SQLite stores".to_string(),
            ));
        }
        // The driver only knows the `mysql:` scheme.
        let url = match database.url.strip_prefix("mariadb:") {
            Some(rest) => format!("mysql:{rest}"),
            None => database.url.clone(),
        };
        let options = MySqlConnectOptions::from_str(&url)
            .map_err(|e| StoreError::Open(format!("invalid connection string: {e}")))?;
        let host = options.get_host().to_string();

        let pool = MySqlPoolOptions::new()
            .max_connections(database.max_connections)
            .acquire_timeout(database.acquire_timeout())
            .connect_lazy_with(options);

        tracing::info!(%host, "MySQL record store pool configured");
        Ok(Self::from_pool(pool, table))
    }

    /// Build a store over an existing pool.
    #[must_use]
    pub fn from_pool(pool: Pool<MySql>, table: &TableConfig) -> Self {
        Self {
            pool,
            layout: Arc::new(TableLayout::new(Dialect::MySql, table)),
        }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<MySql> {
        &self.pool
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Record store pool closed");
    }
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    type Session = MySqlSession;

    async fn acquire(&self) -> Result<MySqlSession> {
        let conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(MySqlSession {
            conn,
            layout: Arc::clone(&self.layout),
        })
    }
}

/// One held `MySQL` connection plus the table layout.
#[derive(Debug)]
pub struct MySqlSession {
    conn: PoolConnection<MySql>,
    layout: Arc<TableLayout>,
}

impl MySqlSession {
    async fn write_outcome(
        &mut self,
        sql: &str,
        target: Target<'_>,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        let valid = outcome.is_valid.map(i64::from);
        let checked_at = checked_at.format(MYSQL_TIMESTAMP_FORMAT).to_string();

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

#[async_trait]
impl StoreSession for MySqlSession {
    async fn verify_schema(&mut self, extra_columns: &[&str]) -> Result<()> {
        let table = self.layout.table_name().to_string();

        let exists: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM information_schema.TABLES \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
        .bind(&table)
        .fetch_one(&mut *self.conn)
        .await?;
        if exists == 0 {
            return Err(StoreError::MissingTable { table });
        }

        let present: Vec<String> = sqlx::query_scalar(
            "SELECT CAST(COLUMN_NAME AS CHAR) FROM information_schema.COLUMNS \
             WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
        )
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
        let mut builder = QueryBuilder::<MySql>::new(self.layout.select_head());
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

fn decode_record(row: &MySqlRow) -> Result<Record> {
    // Key columns may be signed, unsigned or text.
    let key = if let Ok(id) = row.try_get::<i64, _>("rec_key") {
        RecordKey::Id(id)
    } else if let Ok(id) = row.try_get::<u64, _>("rec_key") {
        i64::try_from(id)
            .map(RecordKey::Id)
            .map_err(|_| StoreError::Decode(format!("record key {id} out of range")))?
    } else {
        row.try_get::<String, _>("rec_key")
            .map(RecordKey::Text)
            .map_err(|e| StoreError::Decode(format!("record key: {e}")))?
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
