//! Ledger error model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::AccountId;

/// Result type used across the bookkeeping layer.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Which kind of entity a symbol belongs to.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Currency,
    Category,
}

impl core::fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SymbolKind::Currency => f.write_str("currency"),
            SymbolKind::Category => f.write_str("category"),
        }
    }
}

/// Ledger-level error.
///
/// Every variant is local to the operation that raised it. A failed command
/// never leaves partial state behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Distributions of a transaction do not sum to exactly zero.
    #[error("unbalanced transaction: distributions sum to {imbalance}")]
    UnbalancedTransaction { imbalance: Decimal },

    /// A referenced account does not exist in this ledger.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// A referenced category (by symbol or id) does not exist in this ledger.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// A referenced currency (by symbol or id) does not exist in this ledger.
    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    /// Setup-time uniqueness violation.
    #[error("duplicate {kind} symbol: {symbol}")]
    DuplicateSymbol { kind: SymbolKind, symbol: String },

    /// A category resolved to several accounts where exactly one was required.
    #[error("category {symbol} resolves to {} accounts, expected exactly one", .candidates.len())]
    AmbiguousCategory {
        symbol: String,
        candidates: Vec<AccountId>,
    },

    /// An amount cannot be represented exactly (scale out of range, overflow).
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Malformed input (empty transaction, blank symbol, ...).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A journal could not be replayed (gap, foreign ledger, bad payload).
    #[error("journal inconsistency: {0}")]
    Journal(String),

    /// The backing store is unusable (e.g. poisoned lock).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    pub fn journal(msg: impl Into<String>) -> Self {
        Self::Journal(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn unknown_category(category: impl core::fmt::Display) -> Self {
        Self::UnknownCategory(category.to_string())
    }

    pub fn unknown_currency(currency: impl core::fmt::Display) -> Self {
        Self::UnknownCurrency(currency.to_string())
    }

    pub fn duplicate(kind: SymbolKind, symbol: impl Into<String>) -> Self {
        Self::DuplicateSymbol {
            kind,
            symbol: symbol.into(),
        }
    }
}
