//! Unified error type for the txtree library
//!
//! Protocol failures are not errors here: a participant that cannot commit
//! votes `ReadinessReport { can_commit: false, .. }` and the tree rolls
//! back. This enum covers misuse of the API surface only.

use thiserror::Error;

use crate::model::{Decision, TransactionId};

/// Errors surfaced by the coordination API
#[derive(Debug, Error)]
pub enum TxTreeError {
    /// Progress reports must stay within 0..=100
    #[error("invalid progress percent {value} for {transaction}")]
    InvalidPercent {
        transaction: TransactionId,
        value: f64,
    },

    /// The decision already reached this node; its reports are final
    #[error("{transaction} already decided: {decision:?}")]
    AlreadyDecided {
        transaction: TransactionId,
        decision: Decision,
    },
}

pub type Result<T> = std::result::Result<T, TxTreeError>;
