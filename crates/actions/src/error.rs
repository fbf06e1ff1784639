use fasset_flow_protocol::ProtocolError;
use fasset_flow_types::TypesError;
use thiserror::Error;

use crate::kind::ActionKind;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{action} not eligible: {reason}")]
    NotEligible { action: ActionKind, reason: String },

    #[error("{0} needs a partner identity")]
    MissingPartner(ActionKind),

    #[error("unknown action: {0}")]
    UnknownAction(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl ActionError {
    pub fn not_eligible(action: ActionKind, reason: impl Into<String>) -> Self {
        ActionError::NotEligible {
            action,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ActionError>;
