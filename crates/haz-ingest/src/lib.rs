//! Ingest driver for the quake ledger.
//!
//! Reads quake events as JSON lines, applies them through a shared
//! [`Ingestor`](haz_core::ingest::Ingestor) with a bounded pool of workers,
//! and keeps the retention sweeper running alongside.

pub mod config;
pub mod source;
pub mod worker;

pub use config::IngestConfig;
pub use worker::{RetryPolicy, RunSummary, Transient};
