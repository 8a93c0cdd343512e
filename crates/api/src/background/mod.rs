//! Background jobs.
//!
//! Each submodule provides a long-running async function intended to be
//! spawned via `tokio::spawn`. All jobs accept a `CancellationToken` for
//! graceful shutdown.

pub mod ledger_reconcile;
