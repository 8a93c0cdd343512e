//! Domain logic for Taleforge story runs and the coin economy.
//!
//! Everything in this crate is pure: no database, no network. The `db`,
//! `events`, and `api` crates call into these modules to make decisions and
//! then persist the results.

pub mod coin_ledger;
pub mod error;
pub mod pagination;
pub mod roles;
pub mod story_run;
pub mod types;
pub mod unlock_gate;
