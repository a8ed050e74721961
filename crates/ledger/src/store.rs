use std::collections::BTreeSet;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use dualbook_core::{
    AccountId, Aggregate, AggregateRoot, CategoryId, CurrencyId, LedgerError, LedgerId,
    LedgerResult, TransactionId,
};
use dualbook_events::{Event, EventEnvelope};

use crate::ledger::{LedgerCommand, LedgerEvent, LedgerState, PostTransaction};
use crate::model::Distribution;

/// The complete, ordered journal of one ledger.
///
/// This is the persisted form of a ledger: replaying it rebuilds the state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Journal {
    pub ledger_id: LedgerId,
    pub entries: Vec<EventEnvelope<LedgerEvent>>,
}

impl Journal {
    pub fn empty(ledger_id: LedgerId) -> Self {
        Self {
            ledger_id,
            entries: Vec::new(),
        }
    }
}

/// One independently-owned set of books.
///
/// ## Write semantics
///
/// `execute()`:
/// - validates the command against the current state
/// - commits all resulting events or none of them
/// - assigns journal sequence numbers (last + 1, no gaps)
/// - serializes with every other write to the same ledger
///
/// ## Read semantics
///
/// `snapshot()` returns the state as of one journal sequence point. A snapshot
/// never contains part of a transaction, and later writes do not change it.
pub trait LedgerStore: Send + Sync {
    fn ledger_id(&self) -> LedgerId;

    /// Validate and atomically commit a command. Returns the committed envelopes
    /// (empty when the command was an idempotent no-op).
    fn execute(&self, command: LedgerCommand) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>>;

    /// Consistent read view at the latest committed sequence point.
    fn snapshot(&self) -> LedgerResult<Arc<LedgerState>>;

    /// All committed journal entries, in sequence order.
    fn journal(&self) -> LedgerResult<Journal>;

    fn create_currency(&self, symbol: &str, title: &str) -> LedgerResult<CurrencyId> {
        let committed = self.execute(LedgerCommand::CreateCurrency {
            symbol: symbol.to_string(),
            title: title.to_string(),
        })?;
        match single_payload(&committed)? {
            LedgerEvent::CurrencyCreated(c) => Ok(c.id),
            other => Err(unexpected(other)),
        }
    }

    fn create_account(&self, currency_id: CurrencyId, title: &str) -> LedgerResult<AccountId> {
        let committed = self.execute(LedgerCommand::CreateAccount {
            currency_id,
            title: title.to_string(),
        })?;
        match single_payload(&committed)? {
            LedgerEvent::AccountCreated(a) => Ok(a.id),
            other => Err(unexpected(other)),
        }
    }

    fn create_category(&self, symbol: &str, title: &str) -> LedgerResult<CategoryId> {
        let committed = self.execute(LedgerCommand::CreateCategory {
            symbol: symbol.to_string(),
            title: title.to_string(),
        })?;
        match single_payload(&committed)? {
            LedgerEvent::CategoryCreated(c) => Ok(c.id),
            other => Err(unexpected(other)),
        }
    }

    /// Tag an account with a category. Tagging an already-tagged pair succeeds
    /// and changes nothing.
    fn tag_account(&self, account_id: AccountId, category_id: CategoryId) -> LedgerResult<()> {
        self.execute(LedgerCommand::TagAccount {
            account_id,
            category_id,
        })?;
        Ok(())
    }

    fn accounts_for_category(&self, category_id: CategoryId) -> LedgerResult<BTreeSet<AccountId>> {
        self.snapshot()?.accounts_for_category(category_id)
    }

    fn post_transaction(
        &self,
        notes: &str,
        time: DateTime<Utc>,
        distributions: Vec<Distribution>,
    ) -> LedgerResult<TransactionId> {
        let committed = self.execute(LedgerCommand::PostTransaction(PostTransaction {
            notes: notes.to_string(),
            time,
            distributions,
            idempotency_key: None,
        }))?;
        match single_payload(&committed)? {
            LedgerEvent::TransactionPosted(t) => Ok(t.id),
            other => Err(unexpected(other)),
        }
    }

    /// Post at most once per `key`. A repeated key returns the id of the
    /// transaction that was posted the first time, or a `Validation` error if
    /// the postings differ from it.
    fn post_transaction_idempotent(
        &self,
        key: &str,
        notes: &str,
        time: DateTime<Utc>,
        distributions: Vec<Distribution>,
    ) -> LedgerResult<TransactionId> {
        let committed = self.execute(LedgerCommand::PostTransaction(PostTransaction {
            notes: notes.to_string(),
            time,
            distributions,
            idempotency_key: Some(key.to_string()),
        }))?;

        if committed.is_empty() {
            return self
                .snapshot()?
                .transaction_by_key(key)
                .map(|t| t.id)
                .ok_or_else(|| LedgerError::storage(format!("idempotency key {key} not indexed")));
        }

        match single_payload(&committed)? {
            LedgerEvent::TransactionPosted(t) => Ok(t.id),
            other => Err(unexpected(other)),
        }
    }
}

fn single_payload(committed: &[EventEnvelope<LedgerEvent>]) -> LedgerResult<&LedgerEvent> {
    match committed {
        [one] => Ok(one.payload()),
        _ => Err(LedgerError::storage(format!(
            "expected exactly one committed event, found {}",
            committed.len()
        ))),
    }
}

fn unexpected(event: &LedgerEvent) -> LedgerError {
    LedgerError::storage(format!("unexpected event committed: {event:?}"))
}

impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    fn ledger_id(&self) -> LedgerId {
        (**self).ledger_id()
    }

    fn execute(&self, command: LedgerCommand) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        (**self).execute(command)
    }

    fn snapshot(&self) -> LedgerResult<Arc<LedgerState>> {
        (**self).snapshot()
    }

    fn journal(&self) -> LedgerResult<Journal> {
        (**self).journal()
    }
}

#[derive(Debug)]
struct Inner {
    state: Arc<LedgerState>,
    entries: Vec<EventEnvelope<LedgerEvent>>,
}

/// In-memory ledger.
///
/// Writers take the lock exclusively; readers clone the current `Arc` and
/// release the lock immediately. A write while snapshots are outstanding
/// copies the state first, so outstanding snapshots stay frozen.
#[derive(Debug)]
pub struct InMemoryLedger {
    id: LedgerId,
    inner: RwLock<Inner>,
}

impl InMemoryLedger {
    pub fn new(id: LedgerId) -> Self {
        Self {
            id,
            inner: RwLock::new(Inner {
                state: Arc::new(LedgerState::empty(id)),
                entries: Vec::new(),
            }),
        }
    }

    /// Rebuild a ledger from its journal.
    ///
    /// Every entry is re-validated: it must belong to this ledger, be labelled
    /// with its payload's type and version, carry the next sequence number, and
    /// be exactly what handling its command against the preceding state
    /// produces.
    pub fn from_journal(journal: Journal) -> LedgerResult<Self> {
        let ledger_id = journal.ledger_id;
        let mut state = LedgerState::empty(ledger_id);

        for env in &journal.entries {
            let seq = env.sequence_number();

            if env.ledger_id() != ledger_id {
                return Err(LedgerError::journal(format!(
                    "entry {seq} belongs to ledger {}, not {ledger_id}",
                    env.ledger_id()
                )));
            }

            let payload = env.payload();
            if env.event_type() != payload.event_type()
                || env.event_version() != payload.version()
            {
                return Err(LedgerError::journal(format!(
                    "entry {seq} is labelled {} v{} but carries {} v{}",
                    env.event_type(),
                    env.event_version(),
                    payload.event_type(),
                    payload.version()
                )));
            }

            let expected = state.version() + 1;
            if seq != expected {
                return Err(LedgerError::journal(format!(
                    "non-monotonic sequence number (expected={expected}, found={seq})"
                )));
            }

            let produced = state
                .handle(&env.payload().to_command())
                .map_err(|e| LedgerError::journal(format!("entry {seq} rejected: {e}")))?;

            if produced.as_slice() != std::slice::from_ref(env.payload()) {
                return Err(LedgerError::journal(format!(
                    "entry {seq} does not match the state it was recorded against"
                )));
            }

            state.apply(env.payload());
        }

        tracing::debug!(
            ledger_id = %ledger_id,
            entries = journal.entries.len(),
            "ledger rebuilt from journal"
        );

        Ok(Self {
            id: ledger_id,
            inner: RwLock::new(Inner {
                state: Arc::new(state),
                entries: journal.entries,
            }),
        })
    }
}

impl LedgerStore for InMemoryLedger {
    fn ledger_id(&self) -> LedgerId {
        self.id
    }

    fn execute(&self, command: LedgerCommand) -> LedgerResult<Vec<EventEnvelope<LedgerEvent>>> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;

        let events = match inner.state.handle(&command) {
            Ok(events) => events,
            Err(err) => {
                tracing::warn!(ledger_id = %self.id, error = %err, "ledger command rejected");
                return Err(err);
            }
        };

        if events.is_empty() {
            return Ok(vec![]);
        }

        let mut committed = Vec::with_capacity(events.len());
        for event in events {
            let state = Arc::make_mut(&mut inner.state);
            state.apply(&event);
            let env = EventEnvelope::seal(self.id, state.version(), event);

            tracing::debug!(
                ledger_id = %self.id,
                sequence_number = env.sequence_number(),
                event_type = env.event_type(),
                "ledger event committed"
            );

            inner.entries.push(env.clone());
            committed.push(env);
        }

        Ok(committed)
    }

    fn snapshot(&self) -> LedgerResult<Arc<LedgerState>> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;
        Ok(Arc::clone(&inner.state))
    }

    fn journal(&self) -> LedgerResult<Journal> {
        let inner = self
            .inner
            .read()
            .map_err(|_| LedgerError::storage("lock poisoned"))?;
        Ok(Journal {
            ledger_id: self.id,
            entries: inner.entries.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn seeded() -> (InMemoryLedger, AccountId, AccountId, CategoryId) {
        let ledger = InMemoryLedger::new(LedgerId::new());
        let btc = ledger.create_currency("BTC", "Bitcoin").unwrap();
        let wallet = ledger.create_account(btc, "Local wallet").unwrap();
        let equity = ledger.create_account(btc, "Owner's equity").unwrap();
        let funding = ledger.create_category("F", "Funding").unwrap();
        ledger.tag_account(wallet, funding).unwrap();
        (ledger, wallet, equity, funding)
    }

    #[test]
    fn ids_are_sequential_per_entity_kind() {
        let ledger = InMemoryLedger::new(LedgerId::new());
        let btc = ledger.create_currency("BTC", "Bitcoin").unwrap();
        let ltc = ledger.create_currency("LTC", "Litecoin").unwrap();
        let a1 = ledger.create_account(btc, "Hot wallet").unwrap();
        let a2 = ledger.create_account(ltc, "Hot wallet").unwrap();

        assert_eq!((btc.get(), ltc.get()), (1, 2));
        assert_eq!((a1.get(), a2.get()), (1, 2));
    }

    #[test]
    fn account_needs_an_existing_currency() {
        let ledger = InMemoryLedger::new(LedgerId::new());
        let err = ledger
            .create_account(CurrencyId::new(5), "orphan")
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownCurrency("5".to_string()));
    }

    #[test]
    fn tagging_many_times_equals_tagging_once() {
        let (ledger, wallet, _, funding) = seeded();
        let once = ledger.accounts_for_category(funding).unwrap();
        for _ in 0..5 {
            ledger.tag_account(wallet, funding).unwrap();
        }
        assert_eq!(ledger.accounts_for_category(funding).unwrap(), once);
    }

    #[test]
    fn journal_sequence_numbers_are_gap_free() {
        let (ledger, wallet, equity, funding) = seeded();
        ledger.tag_account(wallet, funding).unwrap();
        ledger
            .post_transaction(
                "Initial Equity",
                Utc::now(),
                vec![Distribution::new(wallet, 2, 0), Distribution::new(equity, -2, 0)],
            )
            .unwrap();

        let journal = ledger.journal().unwrap();
        let seqs: Vec<u64> = journal.entries.iter().map(|e| e.sequence_number()).collect();
        assert_eq!(seqs, (1..=seqs.len() as u64).collect::<Vec<_>>());
        assert_eq!(ledger.snapshot().unwrap().version(), seqs.len() as u64);
    }

    #[test]
    fn snapshot_is_frozen_at_its_sequence_point() {
        let (ledger, wallet, equity, _) = seeded();
        let before = ledger.snapshot().unwrap();

        ledger
            .post_transaction(
                "Initial Equity",
                Utc::now(),
                vec![Distribution::new(wallet, 2, 0), Distribution::new(equity, -2, 0)],
            )
            .unwrap();

        assert_eq!(before.account_balance(wallet).unwrap(), dec!(0));
        assert_eq!(ledger.snapshot().unwrap().account_balance(wallet).unwrap(), dec!(2));
    }

    #[test]
    fn idempotent_post_returns_first_id() {
        let (ledger, wallet, equity, _) = seeded();
        let lines = vec![Distribution::new(wallet, 1, 0), Distribution::new(equity, -1, 0)];

        let first = ledger
            .post_transaction_idempotent("k1", "deposit", Utc::now(), lines.clone())
            .unwrap();
        let second = ledger
            .post_transaction_idempotent("k1", "deposit", Utc::now(), lines)
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(ledger.snapshot().unwrap().transactions().len(), 1);
    }

    #[test]
    fn replay_rebuilds_identical_state() {
        let (ledger, wallet, equity, _) = seeded();
        ledger
            .post_transaction(
                "Xfer",
                Utc::now(),
                vec![Distribution::new(wallet, 15, -1), Distribution::new(equity, -15, -1)],
            )
            .unwrap();

        let journal = ledger.journal().unwrap();
        let json = serde_json::to_string(&journal).unwrap();
        let restored = InMemoryLedger::from_journal(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(*restored.snapshot().unwrap(), *ledger.snapshot().unwrap());
        assert_eq!(restored.journal().unwrap(), journal);
    }

    #[test]
    fn replay_rejects_gaps() {
        let (ledger, _, _, _) = seeded();
        let mut journal = ledger.journal().unwrap();
        journal.entries.remove(1);

        assert!(matches!(
            InMemoryLedger::from_journal(journal),
            Err(LedgerError::Journal(_))
        ));
    }

    #[test]
    fn replay_rejects_foreign_entries() {
        let (ledger, _, _, _) = seeded();
        let journal = ledger.journal().unwrap();
        let foreign = Journal {
            ledger_id: LedgerId::new(),
            entries: journal.entries,
        };

        assert!(matches!(
            InMemoryLedger::from_journal(foreign),
            Err(LedgerError::Journal(_))
        ));
    }

    #[test]
    fn replay_rejects_relabelled_entries() {
        let (ledger, _, _, _) = seeded();
        let journal = serde_json::to_value(ledger.journal().unwrap()).unwrap();

        for (field, value) in [
            ("event_type", serde_json::json!("ledger.category_created")),
            ("event_version", serde_json::json!(2)),
        ] {
            let mut relabelled = journal.clone();
            relabelled["entries"][0][field] = value;
            let relabelled: Journal = serde_json::from_value(relabelled).unwrap();

            assert!(matches!(
                InMemoryLedger::from_journal(relabelled),
                Err(LedgerError::Journal(_))
            ));
        }
    }

    #[test]
    fn concurrent_posts_are_serialized() {
        let (ledger, wallet, equity, _) = seeded();
        let ledger = Arc::new(ledger);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        ledger
                            .post_transaction(
                                "tick",
                                Utc::now(),
                                vec![
                                    Distribution::new(wallet, 1, -2),
                                    Distribution::new(equity, -1, -2),
                                ],
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let snap = ledger.snapshot().unwrap();
        assert_eq!(snap.transactions().len(), 200);
        assert_eq!(snap.account_balance(wallet).unwrap(), dec!(2));
    }
}
