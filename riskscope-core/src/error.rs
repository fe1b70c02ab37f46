//! Errors surfaced by the scoring core

use thiserror::Error;

use crate::RuleId;

/// Errors from signal construction, rule management and configuration
#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rule {0} not found")]
    NotFound(RuleId),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RiskError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RiskError::Validation(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RiskError::NotFound(_))
    }

    /// HTTP-equivalent status for the external CRUD layer
    pub fn status_code(&self) -> u16 {
        match self {
            RiskError::Validation(_) => 400,
            RiskError::NotFound(_) => 404,
            RiskError::Config(_) | RiskError::Io(_) => 500,
        }
    }
}
