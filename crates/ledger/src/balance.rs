//! Category balance aggregation.
//!
//! `None` means "no account carries this tag" and is never the same thing as
//! a zero balance.

use rust_decimal::Decimal;

use dualbook_core::{AccountId, CategoryId, CurrencyId, LedgerError, LedgerResult, add_exact};

use crate::ledger::LedgerState;
use crate::store::LedgerStore;

impl LedgerState {
    /// Sum of net balances of every account tagged with `category_id`.
    pub fn category_balance(&self, category_id: CategoryId) -> LedgerResult<Option<Decimal>> {
        let accounts = self.accounts_for_category(category_id)?;
        self.sum_balances(accounts.into_iter())
    }

    /// Like [`category_balance`](Self::category_balance), restricted to tagged
    /// accounts denominated in `currency_id`.
    pub fn category_balance_in_currency(
        &self,
        category_id: CategoryId,
        currency_id: CurrencyId,
    ) -> LedgerResult<Option<Decimal>> {
        let accounts = self.accounts_for_category(category_id)?;
        let in_currency = accounts.into_iter().filter(|id| {
            self.account(*id)
                .is_some_and(|account| account.currency_id == currency_id)
        });
        self.sum_balances(in_currency)
    }

    fn sum_balances(
        &self,
        accounts: impl Iterator<Item = AccountId>,
    ) -> LedgerResult<Option<Decimal>> {
        let mut total: Option<Decimal> = None;
        for account_id in accounts {
            let balance = self.account_balance(account_id)?;
            total = Some(add_exact(total.unwrap_or(Decimal::ZERO), balance)?);
        }
        Ok(total)
    }
}

/// Aggregate a category by symbol.
///
/// Fails with `UnknownCategory` if the ledger has no such symbol. Returns
/// `None` when the category exists but no account is tagged with it.
pub fn aggregate<L>(ledger: &L, category_symbol: &str) -> LedgerResult<Option<Decimal>>
where
    L: LedgerStore + ?Sized,
{
    let snapshot = ledger.snapshot()?;
    let category = snapshot
        .category_by_symbol(category_symbol)
        .ok_or_else(|| LedgerError::unknown_category(category_symbol))?;
    snapshot.category_balance(category.id)
}

/// Aggregate a category by its ledger-local id.
pub fn aggregate_category<L>(ledger: &L, category_id: CategoryId) -> LedgerResult<Option<Decimal>>
where
    L: LedgerStore + ?Sized,
{
    ledger.snapshot()?.category_balance(category_id)
}

/// Aggregate a category over the tagged accounts of one currency only.
pub fn aggregate_in_currency<L>(
    ledger: &L,
    category_symbol: &str,
    currency_symbol: &str,
) -> LedgerResult<Option<Decimal>>
where
    L: LedgerStore + ?Sized,
{
    let snapshot = ledger.snapshot()?;
    let category = snapshot
        .category_by_symbol(category_symbol)
        .ok_or_else(|| LedgerError::unknown_category(category_symbol))?;
    let currency = snapshot
        .currency_by_symbol(currency_symbol)
        .ok_or_else(|| LedgerError::unknown_currency(currency_symbol))?;
    snapshot.category_balance_in_currency(category.id, currency.id)
}
