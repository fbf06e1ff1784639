use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TypesError {
    #[error("amount {amount} of {token} does not fit the smallest-unit range")]
    AmountOverflow { token: String, amount: String },

    #[error("negative amount {amount} of {token}")]
    NegativeAmount { token: String, amount: String },

    #[error("token not tracked in balances: {0}")]
    MissingToken(String),

    #[error("invalid record: {0}")]
    InvalidRecord(String),
}
