//! Core data model shared by every subsystem.
//!
//! These are the shared entities: registry entries, priors,
//! observations, HR signals/actions, work packages, the ledger, tuning
//! proposals, portfolio recommendations and tenant procurement config.

pub mod ledger;
pub mod model;
pub mod tenant;
pub mod tuning;
pub mod work_package;

pub use ledger::*;
pub use model::*;
pub use tenant::*;
pub use tuning::*;
pub use work_package::*;

use chrono::{DateTime, Utc};

/// Canonical model id: `<provider>/<modelId>` (invariant I1).
pub fn canonical_id(provider: &str, model_id: &str) -> String {
    format!("{provider}/{model_id}")
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}
