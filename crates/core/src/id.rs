//! Strongly-typed identifiers.
//!
//! Entity ids are ledger-local sequential integers. Two ledgers assign them
//! independently, so an `AccountId` from one ledger means nothing in another.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Identifier of a ledger instance (one set of books).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LedgerId(Uuid);

impl LedgerId {
    /// Create a new identifier (UUIDv7, time-ordered).
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for LedgerId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for LedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl FromStr for LedgerId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let uuid =
            Uuid::from_str(s).map_err(|e| LedgerError::validation(format!("LedgerId: {e}")))?;
        Ok(Self(uuid))
    }
}

macro_rules! impl_sequential_id {
    ($t:ident, $name:literal) => {
        #[derive(
            Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $t(u32);

        impl $t {
            /// First id handed out by a ledger.
            pub const FIRST: Self = Self(1);

            pub const fn new(value: u32) -> Self {
                Self(value)
            }

            pub const fn get(self) -> u32 {
                self.0
            }

            /// The id that follows this one in the same ledger.
            pub const fn next(self) -> Self {
                Self(self.0 + 1)
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<u32> for $t {
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<$t> for u32 {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let value = s
                    .parse::<u32>()
                    .map_err(|e| LedgerError::validation(format!("{}: {}", $name, e)))?;
                Ok(Self(value))
            }
        }
    };
}

impl_sequential_id!(CurrencyId, "CurrencyId");
impl_sequential_id!(AccountId, "AccountId");
impl_sequential_id!(CategoryId, "CategoryId");
impl_sequential_id!(TransactionId, "TransactionId");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_ids_start_at_one_and_increment() {
        assert_eq!(AccountId::FIRST.get(), 1);
        assert_eq!(AccountId::FIRST.next(), AccountId::new(2));
    }

    #[test]
    fn sequential_ids_serialize_as_plain_integers() {
        let json = serde_json::to_string(&CategoryId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: CategoryId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, CategoryId::new(7));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert!("12".parse::<TransactionId>().is_ok());
        assert!(matches!(
            "x12".parse::<TransactionId>(),
            Err(LedgerError::Validation(_))
        ));
    }
}
