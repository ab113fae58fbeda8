//! SQLite backend for the hazard quake ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on dedicated
//! connection threads without blocking the async runtime.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use schema::{API_TABLE, CURRENT_TABLE, HISTORY_TABLE};
pub use store::{LedgerOptions, SqliteLedger};
