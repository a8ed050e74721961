use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use dualbook_core::{AccountId, Amount, LedgerError, LedgerResult, TransactionId};
use dualbook_ledger::{Distribution, LedgerState, LedgerStore};

use crate::error::{Leg, PartialTransfer, TransferError};
use crate::request::{TransferRequest, TransferToken};

/// Move value between two categories of one ledger as a single balanced
/// transaction: the source account is credited, the destination debited.
///
/// Each category must have exactly one tagged account in the request's
/// currency.
pub fn transfer<L>(ledger: &L, request: &TransferRequest) -> LedgerResult<TransactionId>
where
    L: LedgerStore + ?Sized,
{
    let snapshot = ledger.snapshot()?;
    let distributions = plan(&snapshot, request)?;
    let id = ledger.post_transaction(&request.notes_or_default(), request.time, distributions)?;

    tracing::info!(
        ledger_id = %ledger.ledger_id(),
        transaction_id = %id,
        currency = %request.currency,
        quantity = %request.quantity,
        from = %request.from_category,
        to = %request.to_category,
        "transfer posted"
    );
    Ok(id)
}

/// Transaction ids of both legs of a completed dual transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub token: TransferToken,
    pub first: TransactionId,
    pub second: TransactionId,
}

/// Posts mirrored transfers on two independent ledgers.
///
/// Each leg is posted under the key `"<token>:<leg>"`, so re-running a
/// transfer with the same token completes whatever is missing and never
/// posts a leg twice.
#[derive(Debug)]
pub struct TransferCoordinator<A, B> {
    first: A,
    second: B,
}

impl<A, B> TransferCoordinator<A, B>
where
    A: LedgerStore,
    B: LedgerStore,
{
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }

    pub fn transfer_dual(
        &self,
        token: &TransferToken,
        first: &TransferRequest,
        second: &TransferRequest,
    ) -> Result<TransferReceipt, TransferError> {
        let first_id = post_leg(&self.first, token, Leg::First, first)?;

        let second_id = match post_leg(&self.second, token, Leg::Second, second) {
            Ok(id) => id,
            Err(source) => {
                tracing::warn!(
                    token = %token,
                    first_ledger = %self.first.ledger_id(),
                    second_ledger = %self.second.ledger_id(),
                    first_transaction = %first_id,
                    error = %source,
                    "second leg failed; transfer is partial"
                );
                return Err(TransferError::Partial(PartialTransfer {
                    token: token.clone(),
                    completed: Leg::First,
                    completed_transaction: first_id,
                    failed: Leg::Second,
                    source,
                }));
            }
        };

        tracing::info!(
            token = %token,
            first_transaction = %first_id,
            second_transaction = %second_id,
            "dual transfer complete"
        );

        Ok(TransferReceipt {
            token: token.clone(),
            first: first_id,
            second: second_id,
        })
    }
}

/// Plan and post one leg under its key. A leg committed by an earlier attempt
/// returns its original id as long as the postings match; a token reused for a
/// different transfer is rejected by the ledger.
fn post_leg<L>(
    ledger: &L,
    token: &TransferToken,
    leg: Leg,
    request: &TransferRequest,
) -> LedgerResult<TransactionId>
where
    L: LedgerStore + ?Sized,
{
    let key = leg.key(token);
    let snapshot = ledger.snapshot()?;
    let distributions = plan(&snapshot, request)?;

    if let Some(existing) = snapshot.transaction_by_key(&key) {
        tracing::debug!(key = %key, transaction_id = %existing.id, "leg already posted");
    }
    ledger.post_transaction_idempotent(
        &key,
        &request.notes_or_default(),
        request.time,
        distributions,
    )
}

fn plan(snapshot: &LedgerState, request: &TransferRequest) -> LedgerResult<Vec<Distribution>> {
    if request.quantity <= Decimal::ZERO {
        return Err(LedgerError::invalid_amount(format!(
            "transfer quantity must be positive, got {}",
            request.quantity
        )));
    }

    let credit = Amount::from_decimal(request.quantity)?;
    let mut distributions = Vec::new();

    for (from_category, to_category) in request.moves() {
        if from_category == to_category {
            return Err(LedgerError::validation(format!(
                "transfer source and destination are both {from_category}"
            )));
        }

        let from = resolve_account(snapshot, from_category, &request.currency)?;
        let to = resolve_account(snapshot, to_category, &request.currency)?;
        if from == to {
            return Err(LedgerError::validation(format!(
                "{from_category} and {to_category} resolve to the same account {from}"
            )));
        }

        distributions.push(Distribution {
            account_id: from,
            amount: credit.checked_neg()?,
        });
        distributions.push(Distribution {
            account_id: to,
            amount: credit,
        });
    }

    Ok(distributions)
}

/// The one account tagged `category` that is denominated in `currency`.
fn resolve_account(
    snapshot: &LedgerState,
    category: &str,
    currency: &str,
) -> LedgerResult<AccountId> {
    let currency_id = snapshot
        .currency_by_symbol(currency)
        .map(|c| c.id)
        .ok_or_else(|| LedgerError::unknown_currency(currency))?;
    let category_id = snapshot
        .category_by_symbol(category)
        .map(|c| c.id)
        .ok_or_else(|| LedgerError::unknown_category(category))?;

    let candidates: Vec<AccountId> = snapshot
        .accounts_for_category(category_id)?
        .into_iter()
        .filter(|id| {
            snapshot
                .account(*id)
                .is_some_and(|a| a.currency_id == currency_id)
        })
        .collect();

    match candidates.as_slice() {
        [one] => Ok(*one),
        [] => Err(LedgerError::unknown_category(format!(
            "{category} (no {currency} account)"
        ))),
        _ => Err(LedgerError::AmbiguousCategory {
            symbol: category.to_string(),
            candidates,
        }),
    }
}
