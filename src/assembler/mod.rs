//! Turns a worker's aggregation report into a verified, materialised
//! deliverable: validate, write to disk, optionally type-check, then copy
//! into a deliverable workspace and zip it.

pub mod assembly;
pub mod materialize;
pub mod validators;

pub use assembly::{assemble, verify_with_tsc, AssemblyResult, ManifestEntry, TypeCheckResult};
pub use materialize::{materialize, MaterializeOptions, MaterializeResult};
pub use validators::{validate_aggregation_report, AggregationReport, FileEntry};
