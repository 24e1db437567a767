//! Small shared helpers used across subsystems.

pub mod hashing;
pub mod sanitize;

pub use hashing::*;
pub use sanitize::*;
