//! The append-only run ledger: decisions, costs, trust deltas and variance
//! tracking for a single `runSessionId`.

pub mod store;

pub use store::{LedgerStore, SharedLedgerStore};
