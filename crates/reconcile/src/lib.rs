//! Cross-ledger reconciliation.
//!
//! Pairs same-symbol category aggregates of two ledgers and reports every
//! category where they differ. An empty report means the books agree.

pub mod comparator;
pub mod comparison;
pub mod config;
pub mod correspondence;

pub use comparator::{compare, compare_in_currency, compare_with_table};
pub use comparison::Comparison;
pub use config::{ConfigError, DiscrepancyPolicy, LedgerConfig, ReconcileConfig, TransferEndpoint};
pub use correspondence::{Correspondence, CorrespondenceTable, Role};
