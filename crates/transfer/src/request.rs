use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use dualbook_core::{LedgerError, LedgerResult};

/// Caller-supplied idempotency token for a dual transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferToken(String);

impl TransferToken {
    pub fn new(token: impl Into<String>) -> LedgerResult<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(LedgerError::validation("transfer token must not be blank"));
        }
        Ok(Self(token))
    }

    /// Fresh token (UUIDv7) for callers that do not bring their own.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for TransferToken {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A further source and destination category moved by the same request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMove {
    pub from_category: String,
    pub to_category: String,
}

/// Move `quantity` of `currency` from the account tagged `from_category` to the
/// account tagged `to_category`.
///
/// Moves added with [`with_move`](Self::with_move) carry the same quantity and
/// currency and post in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub currency: String,
    pub quantity: Decimal,
    pub from_category: String,
    pub to_category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub also: Vec<CategoryMove>,
    pub notes: Option<String>,
    pub time: DateTime<Utc>,
}

impl TransferRequest {
    pub fn new(
        currency: impl Into<String>,
        quantity: Decimal,
        from_category: impl Into<String>,
        to_category: impl Into<String>,
    ) -> Self {
        Self {
            currency: currency.into(),
            quantity,
            from_category: from_category.into(),
            to_category: to_category.into(),
            also: Vec::new(),
            notes: None,
            time: Utc::now(),
        }
    }

    pub fn with_move(
        mut self,
        from_category: impl Into<String>,
        to_category: impl Into<String>,
    ) -> Self {
        self.also.push(CategoryMove {
            from_category: from_category.into(),
            to_category: to_category.into(),
        });
        self
    }

    /// Every (from, to) pair, primary move first.
    pub fn moves(&self) -> impl Iterator<Item = (&str, &str)> {
        std::iter::once((self.from_category.as_str(), self.to_category.as_str())).chain(
            self.also
                .iter()
                .map(|m| (m.from_category.as_str(), m.to_category.as_str())),
        )
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn at(mut self, time: DateTime<Utc>) -> Self {
        self.time = time;
        self
    }

    pub(crate) fn notes_or_default(&self) -> String {
        self.notes.clone().unwrap_or_else(|| {
            format!(
                "Transfer {} {} from {} to {}",
                self.quantity, self.currency, self.from_category, self.to_category
            )
        })
    }
}
