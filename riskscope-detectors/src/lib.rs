//! riskscope Detectors
//!
//! Adapters that turn raw observations into validated signals:
//! - **Face**: face-box detector output → face confidence signals
//! - **Fraud**: transaction payloads → amount / velocity / location signals
//! - **Phishing**: email messages → link, urgency and impersonation signals
//!
//! Every adapter implements [`Detector`] and takes an explicit config value
//! owned by the caller.

pub mod traits;
pub mod face;
pub mod fraud;
pub mod phishing;

pub use traits::*;
pub use face::*;
pub use fraud::*;
pub use phishing::*;
