//! Backend selection by connection URL scheme.

use crate::error::{Result, StoreError};
use crate::layout::Dialect;
use crate::mysql::{MySqlRecordStore, MySqlSession};
use crate::store::{
    RecordStore, SelectionQuery, SqliteRecordStore, SqliteSession, StoreCounts, StoreSession,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use panverify_core::{DatabaseConfig, Pan, Record, RecordKey, TableConfig, VerificationOutcome};

/// Record store chosen from `database.url`.
///
/// `sqlite:` URLs open a [`SqliteRecordStore`]; `mysql:` and `mariadb:` URLs
/// open a [`MySqlRecordStore`].
#[derive(Debug)]
pub enum AnyRecordStore {
    /// `SQLite` file or in-memory database
    Sqlite(SqliteRecordStore),
    /// `MySQL` or `MariaDB` server
    MySql(MySqlRecordStore),
}

impl AnyRecordStore {
    /// Build the store matching the URL scheme. No connection is opened yet.
    pub fn connect(database: &DatabaseConfig, table: &TableConfig) -> Result<Self> {
        match Dialect::from_url(&database.url) {
            Some(Dialect::Sqlite) => Ok(Self::Sqlite(SqliteRecordStore::new(database, table)?)),
            Some(Dialect::MySql) => Ok(Self::MySql(MySqlRecordStore::new(database, table)?)),
            None => Err(StoreError::Open(format!(
                "unsupported database URL scheme in '{}'; expected sqlite:, mysql: or mariadb:",
                database.url
            ))),
        }
    }

    /// SQL dialect of the selected backend.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Sqlite(_) => Dialect::Sqlite,
            Self::MySql(_) => Dialect::MySql,
        }
    }

    /// Close every pooled connection.
    pub async fn close(&self) {
        match self {
            Self::Sqlite(store) => store.close().await,
            Self::MySql(store) => store.close().await,
        }
    }
}

#[async_trait]
impl RecordStore for AnyRecordStore {
    type Session = AnySession;

    async fn acquire(&self) -> Result<AnySession> {
        Ok(match self {
            Self::Sqlite(store) => AnySession::Sqlite(store.acquire().await?),
            Self::MySql(store) => AnySession::MySql(store.acquire().await?),
        })
    }
}

/// Session of an [`AnyRecordStore`].
#[derive(Debug)]
pub enum AnySession {
    /// Held `SQLite` connection
    Sqlite(SqliteSession),
    /// Held `MySQL` connection
    MySql(MySqlSession),
}

#[async_trait]
impl StoreSession for AnySession {
    async fn verify_schema(&mut self, extra_columns: &[&str]) -> Result<()> {
        match self {
            Self::Sqlite(session) => session.verify_schema(extra_columns).await,
            Self::MySql(session) => session.verify_schema(extra_columns).await,
        }
    }

    async fn select_next_unprocessed(
        &mut self,
        query: &SelectionQuery<'_>,
    ) -> Result<Vec<Record>> {
        match self {
            Self::Sqlite(session) => session.select_next_unprocessed(query).await,
            Self::MySql(session) => session.select_next_unprocessed(query).await,
        }
    }

    async fn update_outcome(
        &mut self,
        key: &RecordKey,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        match self {
            Self::Sqlite(session) => session.update_outcome(key, outcome, checked_at).await,
            Self::MySql(session) => session.update_outcome(key, outcome, checked_at).await,
        }
    }

    async fn update_outcome_by_identifier(
        &mut self,
        identifier: &Pan,
        outcome: &VerificationOutcome,
        checked_at: DateTime<Utc>,
    ) -> Result<u64> {
        match self {
            Self::Sqlite(session) => {
                session
                    .update_outcome_by_identifier(identifier, outcome, checked_at)
                    .await
            }
            Self::MySql(session) => {
                session
                    .update_outcome_by_identifier(identifier, outcome, checked_at)
                    .await
            }
        }
    }

    async fn counts(&mut self) -> Result<StoreCounts> {
        match self {
            Self::Sqlite(session) => session.counts().await,
            Self::MySql(session) => session.counts().await,
        }
    }
}
