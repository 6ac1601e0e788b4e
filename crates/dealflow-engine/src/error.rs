//! Engine error types.

use dealflow_core::error::DealflowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("cannot {action} a deal that is {status}")]
    InvalidTransition {
        action: &'static str,
        status: &'static str,
    },

    #[error("a reason is required to mark a deal as lost")]
    MissingLossReason,

    #[error("invalid deal: {0}")]
    InvalidDeal(String),

    #[error("invalid stage catalog: {0}")]
    InvalidCatalog(String),
}

impl From<EngineError> for DealflowError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidTransition { action, status } => {
                DealflowError::InvalidTransition {
                    action: action.into(),
                    status: status.into(),
                }
            }
            EngineError::MissingLossReason
            | EngineError::InvalidDeal(_)
            | EngineError::InvalidCatalog(_) => DealflowError::Validation {
                message: err.to_string(),
            },
        }
    }
}
