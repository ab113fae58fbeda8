//! Core types and trait definitions for the hazard quake ledger.
//!
//! This crate is free of database and transport dependencies. It owns the
//! quake data model, the region table, regional intensity derivation, record
//! assembly and the [`ledger::QuakeLedger`] abstraction the storage backends
//! implement.

// Ledger implementations write `async fn` against `impl Future + Send`
// signatures.
#![allow(async_fn_in_trait)]

pub mod assemble;
pub mod derive;
pub mod error;
pub mod gazetteer;
pub mod ingest;
pub mod intensity;
pub mod ledger;
pub mod quake;
pub mod region;

pub use error::{Error, Result};
