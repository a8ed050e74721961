//! Reconciliation configuration.
//!
//! Loaded from TOML and passed into the engine explicitly; nothing here is
//! process-global.
//!
//! ```toml
//! categories = ["F", "SA", "SH"]
//! on_discrepancy = "fail"
//!
//! [ledger_a]
//! name = "okcatbox"
//! journal = "okcatbox.journal.json"
//!
//! [ledger_b]
//! name = "customer"
//! journal = "customer.journal.json"
//!
//! [transfer_endpoints.6]
//! available = "F"
//!
//! [transfer_endpoints.1]
//! available = "SA"
//! hold = "SH"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::correspondence::{Correspondence, CorrespondenceTable, Role};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// What a reconciliation run does when the report is not empty.
///
/// `Fail` treats any discrepancy as an error (strict point-in-time
/// consistency). `Warn` logs it and carries on, for setups where one side is
/// expected to catch up later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyPolicy {
    #[default]
    Fail,
    Warn,
}

/// Where one ledger's journal lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub name: String,
    pub journal: PathBuf,
}

/// An exchange account type ("6" funding, "1" spot) and the categories that
/// hold its available and on-hold balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEndpoint {
    pub available: String,
    #[serde(default)]
    pub hold: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// The exchange's internal books.
    pub ledger_a: LedgerConfig,
    /// The customer's books.
    pub ledger_b: LedgerConfig,

    /// Category symbols compared on every pass, in report order.
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    /// Restrict comparisons to accounts in this currency.
    #[serde(default)]
    pub currency: Option<String>,

    /// Explicit category ids per ledger. When empty, symbols are resolved
    /// against each ledger on every pass.
    #[serde(default)]
    pub correspondence: Vec<Correspondence>,

    #[serde(default)]
    pub on_discrepancy: DiscrepancyPolicy,

    #[serde(default = "default_transfer_endpoints")]
    pub transfer_endpoints: BTreeMap<String, TransferEndpoint>,
}

fn default_categories() -> Vec<String> {
    [Role::Funding, Role::SpotAvailable, Role::SpotHold]
        .iter()
        .map(|r| r.symbol().to_string())
        .collect()
}

fn default_transfer_endpoints() -> BTreeMap<String, TransferEndpoint> {
    BTreeMap::from([
        (
            "1".to_string(),
            TransferEndpoint {
                available: Role::SpotAvailable.symbol().to_string(),
                hold: Some(Role::SpotHold.symbol().to_string()),
            },
        ),
        (
            "6".to_string(),
            TransferEndpoint {
                available: Role::Funding.symbol().to_string(),
                hold: None,
            },
        ),
    ])
}

impl ReconcileConfig {
    /// Config for two ledgers with every other setting at its default.
    pub fn new(ledger_a: LedgerConfig, ledger_b: LedgerConfig) -> Self {
        Self {
            ledger_a,
            ledger_b,
            categories: default_categories(),
            currency: None,
            correspondence: Vec::new(),
            on_discrepancy: DiscrepancyPolicy::default(),
            transfer_endpoints: default_transfer_endpoints(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;

        tracing::debug!(
            path = %path.display(),
            ledger_a = %config.ledger_a.name,
            ledger_b = %config.ledger_b.name,
            categories = config.categories.len(),
            "reconcile config loaded"
        );
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.categories.is_empty() && self.correspondence.is_empty() {
            return Err(ConfigError::Invalid("no categories to reconcile".to_string()));
        }
        if let Some(blank) = self.categories.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("blank category symbol {blank:?}")));
        }
        if self.ledger_a.journal == self.ledger_b.journal {
            return Err(ConfigError::Invalid(
                "both ledgers point at the same journal".to_string(),
            ));
        }
        for (code, endpoint) in &self.transfer_endpoints {
            if endpoint.available.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "transfer endpoint {code} has no available category"
                )));
            }
        }
        self.correspondence_table()?;
        Ok(())
    }

    /// The configured table, or `None` when symbols should be resolved live.
    pub fn correspondence_table(&self) -> Result<Option<CorrespondenceTable>, ConfigError> {
        if self.correspondence.is_empty() {
            return Ok(None);
        }
        CorrespondenceTable::new(self.correspondence.clone())
            .map(Some)
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn endpoint(&self, code: &str) -> Result<&TransferEndpoint, ConfigError> {
        self.transfer_endpoints
            .get(code)
            .ok_or_else(|| ConfigError::Invalid(format!("unknown transfer endpoint {code}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualbook_core::CategoryId;

    const MINIMAL: &str = r#"
        [ledger_a]
        name = "okcatbox"
        journal = "a.json"

        [ledger_b]
        name = "customer"
        journal = "b.json"
    "#;

    #[test]
    fn defaults_fill_in_roles_and_endpoints() {
        let config = ReconcileConfig::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.categories, vec!["F", "SA", "SH"]);
        assert_eq!(config.on_discrepancy, DiscrepancyPolicy::Fail);
        assert_eq!(config.endpoint("6").unwrap().available, "F");
        assert_eq!(config.endpoint("1").unwrap().hold.as_deref(), Some("SH"));
        assert!(config.correspondence_table().unwrap().is_none());
    }

    #[test]
    fn explicit_correspondence_is_loaded() {
        let raw = r#"
            on_discrepancy = "warn"
            currency = "BTC"

            [ledger_a]
            name = "okcatbox"
            journal = "a.json"

            [ledger_b]
            name = "customer"
            journal = "b.json"

            [[correspondence]]
            symbol = "F"
            ledger_a = 1
            ledger_b = 3
        "#;
        let config = ReconcileConfig::from_toml_str(raw).unwrap();
        let table = config.correspondence_table().unwrap().unwrap();

        assert_eq!(config.on_discrepancy, DiscrepancyPolicy::Warn);
        assert_eq!(config.currency.as_deref(), Some("BTC"));
        assert_eq!(table.get("F").unwrap().ledger_b, Some(CategoryId::new(3)));
    }

    #[test]
    fn constructed_config_matches_parsed_defaults() {
        let parsed = ReconcileConfig::from_toml_str(MINIMAL).unwrap();
        let built = ReconcileConfig::new(parsed.ledger_a.clone(), parsed.ledger_b.clone());
        assert_eq!(built, parsed);
    }

    #[test]
    fn same_journal_for_both_ledgers_is_rejected() {
        let raw = MINIMAL.replace("b.json", "a.json");
        assert!(matches!(
            ReconcileConfig::from_toml_str(&raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_endpoint_is_an_error() {
        let config = ReconcileConfig::from_toml_str(MINIMAL).unwrap();
        assert!(matches!(config.endpoint("3"), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn load_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dualbook.toml");
        std::fs::write(&path, MINIMAL).unwrap();

        let config = ReconcileConfig::load(&path).unwrap();
        assert_eq!(config.ledger_b.name, "customer");

        assert!(matches!(
            ReconcileConfig::load(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
