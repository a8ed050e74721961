use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One category where the two ledgers disagree.
///
/// `None` on a side means "absent": the category is unknown there or has no
/// tagged accounts. On the wire each side is `{"balance": "<decimal>",
/// "absent": <bool>}` so that absent never reads as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comparison {
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(with = "maybe_balance")]
    pub ledger_a: Option<Decimal>,
    #[serde(with = "maybe_balance")]
    pub ledger_b: Option<Decimal>,
}

impl Comparison {
    pub fn new(
        category: impl Into<String>,
        ledger_a: Option<Decimal>,
        ledger_b: Option<Decimal>,
    ) -> Self {
        Self {
            category: category.into(),
            currency: None,
            ledger_a,
            ledger_b,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

mod maybe_balance {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Wire {
        balance: Decimal,
        absent: bool,
    }

    pub fn serialize<S: Serializer>(
        value: &Option<Decimal>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        Wire {
            balance: value.unwrap_or(Decimal::ZERO),
            absent: value.is_none(),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Decimal>, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        Ok((!wire.absent).then_some(wire.balance))
    }
}
