//! panverify Record Store
//!
//! Provides `SQLite` (optionally `SQLCipher` encrypted) and `MySQL` access to
//! the table of records awaiting verification. The backend follows the scheme
//! of `database.url`. Table and column names come from
//! configuration, so the adapter works against whatever table the records
//! were imported into.
//!
//! # Architecture
//!
//! - **Backends**: [`AnyRecordStore`] picks `SQLite` or `MySQL` by URL scheme
//! - **Sessions**: one pooled connection per unit of work, released on drop
//! - **Selection**: side-effect free; a record is unprocessed while its
//!   message column is NULL
//! - **Persistence**: each outcome is written in its own transaction, so a
//!   failed write leaves the record unprocessed
//! - **Schema check**: missing tables or columns are reported before the run
//!   starts instead of surfacing as SQL errors mid-run
//!
//! # Example
//!
//! ```ignore
//! use panverify_core::AppConfig;
//! use panverify_db::{AnyRecordStore, RecordStore, StoreSession};
//!
//! let config = AppConfig::load_with_env(None)?;
//! let store = AnyRecordStore::connect(&config.database, &config.table)?;
//! let mut session = store.acquire().await?;
//! session.verify_schema(&[]).await?;
//! println!("{:?}", session.counts().await?);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod backend;
pub mod connection;
pub mod error;
pub mod layout;
pub mod mysql;
pub mod store;

// Re-export commonly used types
pub use backend::{AnyRecordStore, AnySession};
pub use connection::StorePool;
pub use error::{Result, StoreError};
pub use layout::{Dialect, TableLayout};
pub use mysql::{MySqlRecordStore, MySqlSession};
pub use store::{
    RecordStore, SelectionQuery, SqliteRecordStore, SqliteSession, StoreCounts, StoreSession,
};
