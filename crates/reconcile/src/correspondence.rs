//! Symbol-keyed category correspondence between two ledgers.
//!
//! Category ids are assigned independently by each ledger, so the only thing
//! two ledgers share is the symbol. The table records, per symbol, which local
//! category id stands for it on each side.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use dualbook_core::{CategoryId, LedgerError, LedgerResult, SymbolKind};
use dualbook_ledger::LedgerState;

/// Well-known category roles and their conventional symbols.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Funding,
    SpotAvailable,
    SpotHold,
    HotWallet,
    Deposit,
    CustomerLiability,
    Clearing,
}

impl Role {
    pub const ALL: [Role; 7] = [
        Role::Funding,
        Role::SpotAvailable,
        Role::SpotHold,
        Role::HotWallet,
        Role::Deposit,
        Role::CustomerLiability,
        Role::Clearing,
    ];

    pub fn symbol(self) -> &'static str {
        match self {
            Role::Funding => "F",
            Role::SpotAvailable => "SA",
            Role::SpotHold => "SH",
            Role::HotWallet => "H",
            Role::Deposit => "D",
            Role::CustomerLiability => "L",
            Role::Clearing => "C",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Role::Funding => "Funding",
            Role::SpotAvailable => "Spot available",
            Role::SpotHold => "Spot hold",
            Role::HotWallet => "Hot wallet",
            Role::Deposit => "Deposit",
            Role::CustomerLiability => "Customer liabilities",
            Role::Clearing => "Deposit clearing",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.symbol() == symbol)
    }
}

/// One row: a symbol and its local category id in each ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Correspondence {
    pub symbol: String,
    #[serde(default)]
    pub ledger_a: Option<CategoryId>,
    #[serde(default)]
    pub ledger_b: Option<CategoryId>,
}

/// Read-only correspondence table, in row order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrespondenceTable {
    entries: Vec<Correspondence>,
}

impl CorrespondenceTable {
    /// Build a table; each symbol may appear only once.
    pub fn new(entries: Vec<Correspondence>) -> LedgerResult<Self> {
        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.symbol.as_str()) {
                return Err(LedgerError::duplicate(SymbolKind::Category, entry.symbol.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// Derive the table by looking each symbol up in both ledgers.
    pub fn resolve<S: AsRef<str>>(
        a: &LedgerState,
        b: &LedgerState,
        symbols: &[S],
    ) -> LedgerResult<Self> {
        let entries = symbols
            .iter()
            .map(|s| {
                let symbol = s.as_ref();
                Correspondence {
                    symbol: symbol.to_string(),
                    ledger_a: a.category_by_symbol(symbol).map(|c| c.id),
                    ledger_b: b.category_by_symbol(symbol).map(|c| c.id),
                }
            })
            .collect();
        Self::new(entries)
    }

    pub fn get(&self, symbol: &str) -> Option<&Correspondence> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    pub fn entries(&self) -> &[Correspondence] {
        &self.entries
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.symbol.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
