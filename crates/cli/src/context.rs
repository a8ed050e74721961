//! Command context: configuration plus both ledgers, loaded from their journals.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;

use dualbook_core::LedgerId;
use dualbook_ledger::{InMemoryLedger, Journal, LedgerStore};
use dualbook_reconcile::{LedgerConfig, ReconcileConfig};

pub struct BookContext {
    pub config: ReconcileConfig,
    /// Ledger A: the exchange's internal books.
    pub exchange: Arc<InMemoryLedger>,
    /// Ledger B: the customer's books.
    pub customer: Arc<InMemoryLedger>,
    base_dir: PathBuf,
}

impl BookContext {
    /// Load the config file and replay both journals. Journal paths are
    /// relative to the config file's directory; a missing journal starts an
    /// empty ledger.
    pub fn open(config_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = config_path.as_ref();
        let config = ReconcileConfig::load(config_path)?;
        let base_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::from_config(config, base_dir)
    }

    pub fn from_config(
        config: ReconcileConfig,
        base_dir: impl Into<PathBuf>,
    ) -> anyhow::Result<Self> {
        let base_dir = base_dir.into();
        let exchange = open_ledger(&base_dir, &config.ledger_a)?;
        let customer = open_ledger(&base_dir, &config.ledger_b)?;

        Ok(Self {
            config,
            exchange: Arc::new(exchange),
            customer: Arc::new(customer),
            base_dir,
        })
    }

    pub fn journal_path(&self, ledger: &LedgerConfig) -> PathBuf {
        self.base_dir.join(&ledger.journal)
    }

    /// Whether either journal file already exists on disk.
    pub fn has_journals(&self) -> bool {
        self.journal_path(&self.config.ledger_a).exists()
            || self.journal_path(&self.config.ledger_b).exists()
    }

    /// Write both journals back to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        write_journal(&self.journal_path(&self.config.ledger_a), &self.exchange.journal()?)?;
        write_journal(&self.journal_path(&self.config.ledger_b), &self.customer.journal()?)?;
        Ok(())
    }
}

fn open_ledger(base_dir: &Path, ledger: &LedgerConfig) -> anyhow::Result<InMemoryLedger> {
    let path = base_dir.join(&ledger.journal);

    if !path.exists() {
        let id = LedgerId::new();
        tracing::info!(
            ledger = %ledger.name,
            ledger_id = %id,
            path = %path.display(),
            "no journal yet; starting empty ledger"
        );
        return Ok(InMemoryLedger::new(id));
    }

    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("reading journal {}", path.display()))?;
    let journal: Journal =
        serde_json::from_str(&raw).with_context(|| format!("decoding journal {}", path.display()))?;
    let entries = journal.entries.len();
    let rebuilt = InMemoryLedger::from_journal(journal)
        .with_context(|| format!("replaying journal {}", path.display()))?;

    tracing::debug!(ledger = %ledger.name, entries, "journal loaded");
    Ok(rebuilt)
}

/// Replace the journal file via a sibling temp file and rename.
fn write_journal(path: &Path, journal: &Journal) -> anyhow::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let tmp = path.with_extension("tmp");
    let raw = serde_json::to_string_pretty(journal)?;
    std::fs::write(&tmp, raw).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;

    tracing::debug!(path = %path.display(), entries = journal.entries.len(), "journal written");
    Ok(())
}
