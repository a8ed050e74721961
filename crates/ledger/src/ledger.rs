use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dualbook_core::{
    AccountId, Aggregate, AggregateRoot, CategoryId, CurrencyId, LedgerError, LedgerId,
    LedgerResult, SymbolKind, TransactionId, add_exact,
};
use dualbook_events::Event;

use crate::model::{Account, Category, Currency, Distribution, Transaction};

/// Command: post a balanced transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostTransaction {
    pub notes: String,
    pub time: DateTime<Utc>,
    pub distributions: Vec<Distribution>,
    /// When set, a second post with the same key and postings is a no-op.
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerCommand {
    CreateCurrency { symbol: String, title: String },
    CreateAccount { currency_id: CurrencyId, title: String },
    CreateCategory { symbol: String, title: String },
    TagAccount { account_id: AccountId, category_id: CategoryId },
    PostTransaction(PostTransaction),
}

/// Journal events of a ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    CurrencyCreated(Currency),
    AccountCreated(Account),
    CategoryCreated(Category),
    AccountTagged {
        account_id: AccountId,
        category_id: CategoryId,
    },
    TransactionPosted(Transaction),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::CurrencyCreated(_) => "ledger.currency_created",
            LedgerEvent::AccountCreated(_) => "ledger.account_created",
            LedgerEvent::CategoryCreated(_) => "ledger.category_created",
            LedgerEvent::AccountTagged { .. } => "ledger.account_tagged",
            LedgerEvent::TransactionPosted(_) => "ledger.transaction_posted",
        }
    }

    fn version(&self) -> u32 {
        1
    }
}

impl LedgerEvent {
    /// The command that, handled against the preceding state, yields this event.
    ///
    /// Journal replay uses this to re-validate every recorded fact.
    pub fn to_command(&self) -> LedgerCommand {
        match self {
            LedgerEvent::CurrencyCreated(c) => LedgerCommand::CreateCurrency {
                symbol: c.symbol.clone(),
                title: c.title.clone(),
            },
            LedgerEvent::AccountCreated(a) => LedgerCommand::CreateAccount {
                currency_id: a.currency_id,
                title: a.title.clone(),
            },
            LedgerEvent::CategoryCreated(c) => LedgerCommand::CreateCategory {
                symbol: c.symbol.clone(),
                title: c.title.clone(),
            },
            LedgerEvent::AccountTagged {
                account_id,
                category_id,
            } => LedgerCommand::TagAccount {
                account_id: *account_id,
                category_id: *category_id,
            },
            LedgerEvent::TransactionPosted(t) => LedgerCommand::PostTransaction(PostTransaction {
                notes: t.notes.clone(),
                time: t.time,
                distributions: t.distributions.clone(),
                idempotency_key: t.idempotency_key.clone(),
            }),
        }
    }
}

/// Aggregate root: one set of books.
///
/// Holds the entities plus two derived indexes: running net balance per
/// account and idempotency key → transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerState {
    id: LedgerId,
    version: u64,
    currencies: BTreeMap<CurrencyId, Currency>,
    currency_symbols: HashMap<String, CurrencyId>,
    accounts: BTreeMap<AccountId, Account>,
    categories: BTreeMap<CategoryId, Category>,
    category_symbols: HashMap<String, CategoryId>,
    tags: BTreeMap<CategoryId, BTreeSet<AccountId>>,
    transactions: Vec<Transaction>,
    balances: HashMap<AccountId, Decimal>,
    idempotency_keys: HashMap<String, TransactionId>,
}

impl LedgerState {
    /// Empty ledger (also the starting point for replay).
    pub fn empty(id: LedgerId) -> Self {
        Self {
            id,
            version: 0,
            currencies: BTreeMap::new(),
            currency_symbols: HashMap::new(),
            accounts: BTreeMap::new(),
            categories: BTreeMap::new(),
            category_symbols: HashMap::new(),
            tags: BTreeMap::new(),
            transactions: Vec::new(),
            balances: HashMap::new(),
            idempotency_keys: HashMap::new(),
        }
    }

    pub fn ledger_id(&self) -> LedgerId {
        self.id
    }

    pub fn currency(&self, id: CurrencyId) -> Option<&Currency> {
        self.currencies.get(&id)
    }

    pub fn currency_by_symbol(&self, symbol: &str) -> Option<&Currency> {
        self.currency_symbols
            .get(symbol)
            .and_then(|id| self.currencies.get(id))
    }

    pub fn currencies(&self) -> impl Iterator<Item = &Currency> {
        self.currencies.values()
    }

    pub fn account(&self, id: AccountId) -> Option<&Account> {
        self.accounts.get(&id)
    }

    pub fn accounts(&self) -> impl Iterator<Item = &Account> {
        self.accounts.values()
    }

    pub fn category(&self, id: CategoryId) -> Option<&Category> {
        self.categories.get(&id)
    }

    pub fn category_by_symbol(&self, symbol: &str) -> Option<&Category> {
        self.category_symbols
            .get(symbol)
            .and_then(|id| self.categories.get(id))
    }

    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.categories.values()
    }

    /// Accounts currently tagged with a category (empty set if none).
    pub fn accounts_for_category(
        &self,
        category_id: CategoryId,
    ) -> LedgerResult<BTreeSet<AccountId>> {
        if !self.categories.contains_key(&category_id) {
            return Err(LedgerError::unknown_category(category_id));
        }
        Ok(self.tags.get(&category_id).cloned().unwrap_or_default())
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn transaction(&self, id: TransactionId) -> Option<&Transaction> {
        let index = usize::try_from(id.get()).ok()?.checked_sub(1)?;
        self.transactions.get(index)
    }

    pub fn transaction_by_key(&self, key: &str) -> Option<&Transaction> {
        self.idempotency_keys
            .get(key)
            .and_then(|id| self.transaction(*id))
    }

    /// Net balance of one account (sum of every distribution ever posted to it).
    pub fn account_balance(&self, account_id: AccountId) -> LedgerResult<Decimal> {
        if !self.accounts.contains_key(&account_id) {
            return Err(LedgerError::UnknownAccount(account_id));
        }
        Ok(self.balance_or_zero(account_id))
    }

    fn balance_or_zero(&self, account_id: AccountId) -> Decimal {
        self.balances.get(&account_id).copied().unwrap_or(Decimal::ZERO)
    }
}

impl AggregateRoot for LedgerState {
    type Id = LedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl Aggregate for LedgerState {
    type Command = LedgerCommand;
    type Event = LedgerEvent;
    type Error = LedgerError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            LedgerEvent::CurrencyCreated(c) => {
                self.currency_symbols.insert(c.symbol.clone(), c.id);
                self.currencies.insert(c.id, c.clone());
            }
            LedgerEvent::AccountCreated(a) => {
                self.accounts.insert(a.id, a.clone());
            }
            LedgerEvent::CategoryCreated(c) => {
                self.category_symbols.insert(c.symbol.clone(), c.id);
                self.categories.insert(c.id, c.clone());
            }
            LedgerEvent::AccountTagged {
                account_id,
                category_id,
            } => {
                self.tags.entry(*category_id).or_default().insert(*account_id);
            }
            LedgerEvent::TransactionPosted(t) => {
                // Amounts were range-checked by `handle`.
                for d in &t.distributions {
                    let delta = d.amount.to_decimal().unwrap_or(Decimal::ZERO);
                    *self.balances.entry(d.account_id).or_insert(Decimal::ZERO) += delta;
                }
                if let Some(key) = &t.idempotency_key {
                    self.idempotency_keys.insert(key.clone(), t.id);
                }
                self.transactions.push(t.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            LedgerCommand::CreateCurrency { symbol, title } => {
                self.handle_create_currency(symbol, title)
            }
            LedgerCommand::CreateAccount { currency_id, title } => {
                self.handle_create_account(*currency_id, title)
            }
            LedgerCommand::CreateCategory { symbol, title } => {
                self.handle_create_category(symbol, title)
            }
            LedgerCommand::TagAccount {
                account_id,
                category_id,
            } => self.handle_tag(*account_id, *category_id),
            LedgerCommand::PostTransaction(cmd) => self.handle_post(cmd),
        }
    }
}

fn ensure_symbol(symbol: &str) -> LedgerResult<()> {
    if symbol.trim().is_empty() {
        return Err(LedgerError::validation("symbol must not be blank"));
    }
    Ok(())
}

/// Same accounts in the same order with equal values; `15e-1` matches `150e-2`.
fn same_postings(recorded: &[Distribution], requested: &[Distribution]) -> bool {
    recorded.len() == requested.len()
        && recorded.iter().zip(requested).all(|(a, b)| {
            a.account_id == b.account_id
                && matches!(
                    (a.amount.to_decimal(), b.amount.to_decimal()),
                    (Ok(x), Ok(y)) if x == y
                )
        })
}

fn next_id(len: usize) -> u32 {
    u32::try_from(len).map_or(u32::MAX, |n| n.saturating_add(1))
}

impl LedgerState {
    fn handle_create_currency(&self, symbol: &str, title: &str) -> LedgerResult<Vec<LedgerEvent>> {
        ensure_symbol(symbol)?;
        if self.currency_symbols.contains_key(symbol) {
            return Err(LedgerError::duplicate(SymbolKind::Currency, symbol));
        }

        Ok(vec![LedgerEvent::CurrencyCreated(Currency {
            id: CurrencyId::new(next_id(self.currencies.len())),
            symbol: symbol.to_string(),
            title: title.to_string(),
        })])
    }

    fn handle_create_account(
        &self,
        currency_id: CurrencyId,
        title: &str,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        if !self.currencies.contains_key(&currency_id) {
            return Err(LedgerError::unknown_currency(currency_id));
        }

        Ok(vec![LedgerEvent::AccountCreated(Account {
            id: AccountId::new(next_id(self.accounts.len())),
            currency_id,
            title: title.to_string(),
        })])
    }

    fn handle_create_category(&self, symbol: &str, title: &str) -> LedgerResult<Vec<LedgerEvent>> {
        ensure_symbol(symbol)?;
        if self.category_symbols.contains_key(symbol) {
            return Err(LedgerError::duplicate(SymbolKind::Category, symbol));
        }

        Ok(vec![LedgerEvent::CategoryCreated(Category {
            id: CategoryId::new(next_id(self.categories.len())),
            symbol: symbol.to_string(),
            title: title.to_string(),
        })])
    }

    fn handle_tag(
        &self,
        account_id: AccountId,
        category_id: CategoryId,
    ) -> LedgerResult<Vec<LedgerEvent>> {
        if !self.accounts.contains_key(&account_id) {
            return Err(LedgerError::UnknownAccount(account_id));
        }
        if !self.categories.contains_key(&category_id) {
            return Err(LedgerError::unknown_category(category_id));
        }

        let already = self
            .tags
            .get(&category_id)
            .is_some_and(|set| set.contains(&account_id));
        if already {
            return Ok(vec![]);
        }

        Ok(vec![LedgerEvent::AccountTagged {
            account_id,
            category_id,
        }])
    }

    fn handle_post(&self, cmd: &PostTransaction) -> LedgerResult<Vec<LedgerEvent>> {
        if let Some(key) = cmd.idempotency_key.as_deref() {
            if let Some(existing) = self.transaction_by_key(key) {
                if !same_postings(&existing.distributions, &cmd.distributions) {
                    return Err(LedgerError::validation(format!(
                        "idempotency key {key} reused with different postings"
                    )));
                }
                return Ok(vec![]);
            }
        }

        if cmd.distributions.is_empty() {
            return Err(LedgerError::validation("transaction must have distributions"));
        }

        let mut total = Decimal::ZERO;
        let mut projected: HashMap<AccountId, Decimal> = HashMap::new();

        for d in &cmd.distributions {
            if !self.accounts.contains_key(&d.account_id) {
                return Err(LedgerError::UnknownAccount(d.account_id));
            }

            let value = d.amount.to_decimal()?;
            total = add_exact(total, value)?;

            let balance = projected
                .entry(d.account_id)
                .or_insert_with(|| self.balance_or_zero(d.account_id));
            *balance = add_exact(*balance, value)?;
        }

        if !total.is_zero() {
            return Err(LedgerError::UnbalancedTransaction { imbalance: total });
        }

        Ok(vec![LedgerEvent::TransactionPosted(Transaction {
            id: TransactionId::new(next_id(self.transactions.len())),
            notes: cmd.notes.clone(),
            time: cmd.time,
            distributions: cmd.distributions.clone(),
            idempotency_key: cmd.idempotency_key.clone(),
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualbook_core::{Amount, sum_exact};
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn run(state: &mut LedgerState, cmd: LedgerCommand) -> LedgerResult<Vec<LedgerEvent>> {
        let events = state.handle(&cmd)?;
        for e in &events {
            state.apply(e);
        }
        Ok(events)
    }

    /// BTC currency plus two accounts (ids 1 and 2).
    fn books() -> LedgerState {
        let mut state = LedgerState::empty(LedgerId::new());
        run(
            &mut state,
            LedgerCommand::CreateCurrency {
                symbol: "BTC".to_string(),
                title: "Bitcoin".to_string(),
            },
        )
        .unwrap();
        for title in ["Local wallet", "Owner's equity"] {
            run(
                &mut state,
                LedgerCommand::CreateAccount {
                    currency_id: CurrencyId::FIRST,
                    title: title.to_string(),
                },
            )
            .unwrap();
        }
        state
    }

    fn post(distributions: Vec<Distribution>) -> LedgerCommand {
        LedgerCommand::PostTransaction(PostTransaction {
            notes: "test".to_string(),
            time: Utc::now(),
            distributions,
            idempotency_key: None,
        })
    }

    #[test]
    fn balanced_transaction_is_posted_and_moves_balances() {
        let mut state = books();
        let x = AccountId::new(1);
        let y = AccountId::new(2);

        let events = run(
            &mut state,
            post(vec![Distribution::new(x, 2, 0), Distribution::new(y, -2, 0)]),
        )
        .unwrap();

        assert_eq!(events.len(), 1);
        assert_eq!(state.account_balance(x).unwrap(), dec!(2));
        assert_eq!(state.account_balance(y).unwrap(), dec!(-2));
        assert_eq!(state.transactions().len(), 1);
    }

    #[test]
    fn mixed_exponents_balance_exactly() {
        let mut state = books();
        let events = run(
            &mut state,
            post(vec![
                Distribution::new(AccountId::new(1), 15, -1),
                Distribution::new(AccountId::new(2), -1500, -3),
            ]),
        )
        .unwrap();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn unbalanced_transaction_is_rejected_without_effect() {
        let mut state = books();
        let before = state.clone();

        let err = run(
            &mut state,
            post(vec![
                Distribution::new(AccountId::new(1), 2, 0),
                Distribution::new(AccountId::new(2), -1, 0),
            ]),
        )
        .unwrap_err();

        assert_eq!(err, LedgerError::UnbalancedTransaction { imbalance: dec!(1) });
        assert_eq!(state, before);
    }

    #[test]
    fn total_that_would_round_to_zero_is_rejected_without_effect() {
        let mut state = books();
        run(
            &mut state,
            LedgerCommand::CreateAccount {
                currency_id: CurrencyId::FIRST,
                title: "Dust".to_string(),
            },
        )
        .unwrap();
        let before = state.clone();

        // The true total is 1e-28.
        let err = run(
            &mut state,
            post(vec![
                Distribution::new(AccountId::new(1), 1, 20),
                Distribution::new(AccountId::new(3), 1, -28),
                Distribution::new(AccountId::new(2), -1, 20),
            ]),
        )
        .unwrap_err();

        assert!(matches!(err, LedgerError::InvalidAmount(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn unknown_account_is_rejected() {
        let state = books();
        let err = state
            .handle(&post(vec![
                Distribution::new(AccountId::new(1), 1, 0),
                Distribution::new(AccountId::new(99), -1, 0),
            ]))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownAccount(AccountId::new(99)));
    }

    #[test]
    fn empty_transaction_is_rejected() {
        let state = books();
        assert!(matches!(
            state.handle(&post(vec![])),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let mut state = books();
        let err = run(
            &mut state,
            LedgerCommand::CreateCurrency {
                symbol: "BTC".to_string(),
                title: "again".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::duplicate(SymbolKind::Currency, "BTC"));

        run(
            &mut state,
            LedgerCommand::CreateCategory {
                symbol: "F".to_string(),
                title: "Funding".to_string(),
            },
        )
        .unwrap();
        let err = run(
            &mut state,
            LedgerCommand::CreateCategory {
                symbol: "F".to_string(),
                title: "Funding".to_string(),
            },
        )
        .unwrap_err();
        assert_eq!(err, LedgerError::duplicate(SymbolKind::Category, "F"));
    }

    #[test]
    fn retagging_emits_nothing() {
        let mut state = books();
        run(
            &mut state,
            LedgerCommand::CreateCategory {
                symbol: "F".to_string(),
                title: "Funding".to_string(),
            },
        )
        .unwrap();
        let tag = LedgerCommand::TagAccount {
            account_id: AccountId::new(1),
            category_id: CategoryId::FIRST,
        };

        assert_eq!(run(&mut state, tag.clone()).unwrap().len(), 1);
        assert!(run(&mut state, tag).unwrap().is_empty());
        assert_eq!(
            state.accounts_for_category(CategoryId::FIRST).unwrap(),
            BTreeSet::from([AccountId::new(1)])
        );
    }

    #[test]
    fn idempotency_key_prevents_second_post() {
        let mut state = books();
        let cmd = LedgerCommand::PostTransaction(PostTransaction {
            notes: "once".to_string(),
            time: Utc::now(),
            distributions: vec![
                Distribution::new(AccountId::new(1), 1, 0),
                Distribution::new(AccountId::new(2), -1, 0),
            ],
            idempotency_key: Some("tok:exchange".to_string()),
        });

        assert_eq!(run(&mut state, cmd.clone()).unwrap().len(), 1);
        assert!(run(&mut state, cmd).unwrap().is_empty());
        assert_eq!(state.account_balance(AccountId::new(1)).unwrap(), dec!(1));
        assert_eq!(
            state.transaction_by_key("tok:exchange").map(|t| t.id),
            Some(TransactionId::FIRST)
        );
    }

    #[test]
    fn idempotency_key_with_different_postings_is_rejected() {
        let mut state = books();
        let keyed = |mantissa: i64, exponent: i32| {
            LedgerCommand::PostTransaction(PostTransaction {
                notes: "keyed".to_string(),
                time: Utc::now(),
                distributions: vec![
                    Distribution::new(AccountId::new(1), mantissa, exponent),
                    Distribution::new(AccountId::new(2), -mantissa, exponent),
                ],
                idempotency_key: Some("tok:first".to_string()),
            })
        };

        run(&mut state, keyed(15, -1)).unwrap();
        assert!(run(&mut state, keyed(150, -2)).unwrap().is_empty());
        assert!(matches!(
            run(&mut state, keyed(5, 0)),
            Err(LedgerError::Validation(_))
        ));
        assert_eq!(state.account_balance(AccountId::new(1)).unwrap(), dec!(1.5));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Every posted transaction sums to exactly zero, and the account
        /// balances of the whole ledger therefore net to zero.
        #[test]
        fn posted_transactions_always_sum_to_zero(
            postings in prop::collection::vec((1i64..1_000_000i64, -8i32..2i32, -3i64..3i64), 1..20)
        ) {
            let mut state = books();
            let x = AccountId::new(1);
            let y = AccountId::new(2);

            for (mantissa, exponent, skew) in postings {
                let result = run(&mut state, post(vec![
                    Distribution::new(x, mantissa, exponent),
                    Distribution::new(y, -mantissa + skew, exponent),
                ]));
                prop_assert_eq!(result.is_ok(), skew == 0);
            }

            for t in state.transactions() {
                let total = sum_exact(t.distributions.iter().map(|d| d.amount)).unwrap();
                prop_assert!(total.is_zero());
            }

            let net = state.account_balance(x).unwrap() + state.account_balance(y).unwrap();
            prop_assert!(net.is_zero());
            prop_assert_eq!(Amount::from_decimal(net).unwrap(), Amount::ZERO);
        }
    }
}
