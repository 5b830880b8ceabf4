//! Error types for the ping-pong transfer loop

use thiserror::Error;

/// Main error type for the transfer loop
#[derive(Error, Debug)]
pub enum PingPongError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Chain connection error: {message}")]
    ChainConnection { message: String },

    #[error("Fee query error: {0}")]
    FeeQuery(String),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Nonce error for account {account}: {message}")]
    Nonce { account: String, message: String },

    #[error("Broadcast rejected: {0}")]
    Broadcast(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Timeout waiting for {operation}")]
    Timeout { operation: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PingPongError {
    /// Errors that must stop the process instead of being absorbed by a cycle
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PingPongError::ChainConnection { .. } | PingPongError::Config(_)
        )
    }
}

/// Result type for transfer loop operations
pub type PingPongResult<T> = Result<T, PingPongError>;
