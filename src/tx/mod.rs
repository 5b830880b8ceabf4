//! Transaction pipeline: fees, gas limit, nonces, signing and submission

mod builder;
mod fees;
mod gas;
mod nonce;
mod sender;

pub use builder::{SignedTransfer, TransferRequest};
pub use fees::{FeeEstimator, FeeParams, BASE_FEE_MULTIPLIER_PERCENT, FALLBACK_PRIORITY_FEE_WEI};
pub use gas::{GasLimitEstimator, GAS_LIMIT_BUFFER_PERCENT, PLAIN_TRANSFER_GAS};
pub use nonce::NonceTracker;
pub use sender::{classify_broadcast_error, BroadcastFailure, SubmissionOutcome, TransactionSender};
