//! Ledger entities.
//!
//! Currencies, accounts and categories are created once and never change.
//! Transactions are append-only; corrections are new offsetting transactions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dualbook_core::{AccountId, Amount, CategoryId, CurrencyId, TransactionId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Currency {
    pub id: CurrencyId,
    pub symbol: String,
    pub title: String,
}

/// A balance-holding account, denominated in exactly one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub currency_id: CurrencyId,
    pub title: String,
}

/// Symbolic role tag. The symbol (not the id) is what two ledgers agree on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub symbol: String,
    pub title: String,
}

/// One signed posting: positive = debit, negative = credit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub account_id: AccountId,
    pub amount: Amount,
}

impl Distribution {
    pub fn new(account_id: AccountId, mantissa: i64, exponent: i32) -> Self {
        Self {
            account_id,
            amount: Amount::new(mantissa, exponent),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub notes: String,
    pub time: DateTime<Utc>,
    pub distributions: Vec<Distribution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
}
