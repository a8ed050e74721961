//! Double-entry ledger store (event-journaled, in-memory).
//!
//! A ledger owns its currencies, accounts, categories and transactions. Every
//! accepted command is recorded in the ledger's journal; the current state is
//! the fold of that journal.

pub mod balance;
pub mod ledger;
pub mod model;
pub mod store;

pub use balance::{aggregate, aggregate_category, aggregate_in_currency};
pub use ledger::{LedgerCommand, LedgerEvent, LedgerState, PostTransaction};
pub use model::{Account, Category, Currency, Distribution, Transaction};
pub use store::{InMemoryLedger, Journal, LedgerStore};
