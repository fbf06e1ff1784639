use fasset_flow_actions::ActionError;
use fasset_flow_protocol::ProtocolError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error(transparent)]
    Action(#[from] ActionError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type Result<T> = std::result::Result<T, FlowError>;
