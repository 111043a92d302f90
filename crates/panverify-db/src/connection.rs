//! Database connection management.
//!
//! Provides a `StorePool` wrapper around `SQLx` built from injected
//! [`DatabaseConfig`] parameters. The pool connects lazily: building it never
//! touches the database, so an unreachable store surfaces as a
//! [`StoreError::Connection`] at acquisition time, where the pipeline can wait
//! and retry. An optional `SQLCipher` key is held in zeroizing memory.

use crate::error::{Result, StoreError};
use panverify_core::DatabaseConfig;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use zeroize::Zeroizing;

/// Connection pool for the record store.
#[derive(Debug)]
pub struct StorePool {
    pool: Pool<Sqlite>,
    _key: Option<Zeroizing<String>>,
}

impl StorePool {
    /// Create a lazily-connecting pool from configuration.
    ///
    /// # Errors
    /// Returns `StoreError` if:
    /// - The connection URL cannot be parsed
    /// - The encryption key is not valid hex
    pub fn new(config: &DatabaseConfig) -> Result<Self> {
        let mut connect_options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| StoreError::Open(format!("invalid connection string: {e}")))?;

        let key = match &config.encryption_key {
            Some(raw) => {
                let raw = Zeroizing::new(raw.trim().to_string());
                let bytes = Zeroizing::new(
                    hex::decode(raw.as_str())
                        .map_err(|e| StoreError::InvalidKey(format!("key must be hex: {e}")))?,
                );
                if bytes.is_empty() {
                    return Err(StoreError::InvalidKey("key must not be empty".to_string()));
                }
                // SQLCipher expects raw hex keys as x'...'
                let key_pragma = format!("\"x'{}'\"", raw.as_str());
                connect_options = connect_options.pragma("key", key_pragma);
                Some(raw)
            }
            None => None,
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(connect_options);

        tracing::info!(
            url = %config.url,
            encrypted = key.is_some(),
            "Record store pool configured"
        );

        Ok(Self { pool, _key: key })
    }

    /// Wrap an existing pool.
    ///
    /// Pools are Arc-based, so this is useful for sharing one pool between a
    /// test fixture and the store under test.
    #[must_use]
    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool, _key: None }
    }

    /// Get a reference to the underlying `SQLx` pool.
    #[must_use]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Acquire one connection.
    ///
    /// The connection returns to the pool when dropped, on every exit path.
    ///
    /// # Errors
    /// Returns `StoreError::Connection` if no connection can be obtained.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// Close the connection pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Record store pool closed");
    }
}
