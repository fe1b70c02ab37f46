//! riskscope Runtime
//!
//! Wires detectors, the aggregator and persistence together:
//! - Scoring service entry points for photo, fraud and phishing checks
//! - Append-only verdict history per subject
//! - Activity records for every assessment and rule change
//! - Parallel batch scoring over a shared rule registry

pub mod traits;
pub mod store;
pub mod service;

pub use traits::*;
pub use store::*;
pub use service::*;
