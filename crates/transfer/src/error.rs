use serde::{Deserialize, Serialize};
use thiserror::Error;

use dualbook_core::{LedgerError, TransactionId};

use crate::request::TransferToken;

/// Which posting of a dual transfer.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Leg {
    First,
    Second,
}

impl Leg {
    pub fn as_str(self) -> &'static str {
        match self {
            Leg::First => "first",
            Leg::Second => "second",
        }
    }

    /// Ledger idempotency key of this leg under `token`.
    pub fn key(self, token: &TransferToken) -> String {
        format!("{token}:{}", self.as_str())
    }
}

impl core::fmt::Display for Leg {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State left behind when the second leg failed after the first committed.
///
/// The books are transiently inconsistent. Retrying the dual transfer with the
/// same `token` skips the committed leg and re-attempts the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTransfer {
    pub token: TransferToken,
    pub completed: Leg,
    pub completed_transaction: TransactionId,
    pub failed: Leg,
    pub source: LedgerError,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Nothing was posted (single transfer, or the first leg of a dual one).
    #[error(transparent)]
    Leg(#[from] LedgerError),

    #[error(
        "partial transfer {}: {} leg committed as transaction {}, {} leg failed: {}",
        .0.token, .0.completed, .0.completed_transaction, .0.failed, .0.source
    )]
    Partial(PartialTransfer),
}

impl TransferError {
    pub fn is_partial(&self) -> bool {
        matches!(self, TransferError::Partial(_))
    }
}
