//! riskscope Core - signals, rules and verdicts for risk scoring
//!
//! This crate provides the scoring primitives:
//! - Validated evidence signals with a normalized strength
//! - A rule registry with snapshot reads and serialized writes
//! - The aggregator that turns signals into a bounded score and tier
//! - Immutable, digestible verdict records

pub mod error;
pub mod signals;
pub mod rules;
pub mod registry;
pub mod aggregator;
pub mod verdict;
pub mod config;

pub use error::*;
pub use signals::*;
pub use rules::*;
pub use registry::*;
pub use aggregator::*;
pub use verdict::*;
pub use config::*;

/// Lowest valid signal strength
pub const MIN_STRENGTH: f64 = 0.0;

/// Highest valid signal strength, also the score ceiling
pub const MAX_STRENGTH: f64 = 1.0;
