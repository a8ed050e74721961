//! Bookkeeping building blocks shared by every ledger.
//!
//! This crate contains **pure domain** primitives (no storage, no IO).

pub mod aggregate;
pub mod amount;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot};
pub use amount::{Amount, add_exact, sum_exact};
pub use error::{LedgerError, LedgerResult, SymbolKind};
pub use id::{AccountId, CategoryId, CurrencyId, LedgerId, TransactionId};
