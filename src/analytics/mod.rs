//! Ledger analytics and deterministic tuning-proposal generation.

pub mod kpi;
pub mod tuning;

pub use kpi::{aggregate_kpis, summarize_ledger, KpiAggregate, LedgerSummary};
pub use tuning::{can_auto_apply, generate_proposals};
