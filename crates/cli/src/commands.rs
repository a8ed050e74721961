//! CLI commands.

use std::sync::Arc;

use anyhow::{Context, bail};
use rust_decimal::Decimal;
use serde::Serialize;

use dualbook_core::{AggregateRoot, TransactionId};
use dualbook_ledger::{InMemoryLedger, LedgerStore};
use dualbook_reconcile::{
    Comparison, DiscrepancyPolicy, LedgerConfig, ReconcileConfig, Role, compare as compare_symbols,
    compare_in_currency, compare_with_table,
};
use dualbook_transfer::{
    TransferCoordinator, TransferReceipt, TransferRequest, TransferToken, transfer,
};

use crate::context::BookContext;
use crate::layout;

/// BTC the customer's local wallet starts with.
const INITIAL_EQUITY: i64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareOutcome {
    pub report: Vec<Comparison>,
    pub policy: DiscrepancyPolicy,
}

impl CompareOutcome {
    pub fn is_reconciled(&self) -> bool {
        self.report.is_empty()
    }

    /// Whether the run should exit non-zero under the configured policy.
    pub fn should_fail(&self) -> bool {
        !self.is_reconciled() && self.policy == DiscrepancyPolicy::Fail
    }
}

/// Create both ledgers with the standard layout and write their journals.
pub fn init(ctx: &BookContext) -> anyhow::Result<()> {
    if ctx.has_journals() {
        bail!(
            "journals already exist ({} / {}); refusing to overwrite",
            ctx.journal_path(&ctx.config.ledger_a).display(),
            ctx.journal_path(&ctx.config.ledger_b).display()
        );
    }

    layout::seed_exchange(ctx.exchange.as_ref()).context("creating exchange books")?;
    layout::seed_customer(ctx.customer.as_ref(), INITIAL_EQUITY)
        .context("creating customer books")?;
    ctx.save()
}

/// Compare the configured categories across both ledgers.
///
/// An explicit correspondence table takes precedence over symbol lookup; a
/// configured currency restricts the symbol lookup to that currency.
pub fn compare(ctx: &BookContext) -> anyhow::Result<CompareOutcome> {
    let config = &ctx.config;
    let exchange = ctx.exchange.as_ref();
    let customer = ctx.customer.as_ref();

    let categories = config.categories.as_slice();

    let report = match (config.correspondence_table()?, config.currency.as_deref()) {
        (Some(table), _) => compare_with_table(exchange, customer, &table)?,
        (None, Some(currency)) => compare_in_currency(exchange, customer, categories, currency)?,
        (None, None) => compare_symbols(exchange, customer, categories)?,
    };

    if !report.is_empty() && config.on_discrepancy == DiscrepancyPolicy::Warn {
        tracing::warn!(
            discrepancies = report.len(),
            ledger_a = %config.ledger_a.name,
            ledger_b = %config.ledger_b.name,
            "ledgers out of sync; continuing under warn policy"
        );
    }

    Ok(CompareOutcome {
        report,
        policy: config.on_discrepancy,
    })
}

/// Transaction ids of a deposit; `customer` is set when it was mirrored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositOutcome {
    pub exchange: TransactionId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer: Option<TransactionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TransferToken>,
}

/// The exchange side of a customer deposit: the hot wallet rises against the
/// liability to the customer, and the customer's funding account rises against
/// deposit clearing.
fn exchange_deposit(currency: &str, quantity: Decimal) -> TransferRequest {
    TransferRequest::new(
        currency,
        quantity,
        Role::CustomerLiability.symbol(),
        Role::HotWallet.symbol(),
    )
    .with_move(Role::Clearing.symbol(), Role::Funding.symbol())
    .with_notes(format!("Deposit {quantity} {currency}"))
}

/// The customer's matching move from the local wallet to exchange funding.
fn customer_deposit(currency: &str, quantity: Decimal) -> TransferRequest {
    TransferRequest::new(
        currency,
        quantity,
        Role::Deposit.symbol(),
        Role::Funding.symbol(),
    )
    .with_notes(format!("Xfer {currency} to OKEx"))
}

/// Book a deposit on the exchange and, with `mirror`, the customer's matching
/// transaction.
pub fn deposit(
    ctx: &BookContext,
    currency: &str,
    quantity: Decimal,
    mirror: bool,
    token: Option<TransferToken>,
) -> anyhow::Result<DepositOutcome> {
    let exchange_leg = exchange_deposit(currency, quantity);

    if !mirror {
        let id = transfer(ctx.exchange.as_ref(), &exchange_leg)?;
        ctx.save()?;
        return Ok(DepositOutcome {
            exchange: id,
            customer: None,
            token: None,
        });
    }

    let customer_leg = customer_deposit(currency, quantity);
    let token = token.unwrap_or_else(TransferToken::generate);
    let receipt = dual(ctx, &token, &exchange_leg, &customer_leg)?;

    Ok(DepositOutcome {
        exchange: receipt.first,
        customer: Some(receipt.second),
        token: Some(receipt.token),
    })
}

/// Move `quantity` between two exchange account types ("6" funding, "1" spot)
/// on both ledgers.
pub fn transfer_between(
    ctx: &BookContext,
    currency: &str,
    quantity: Decimal,
    from: &str,
    to: &str,
    token: Option<TransferToken>,
) -> anyhow::Result<TransferReceipt> {
    let source = &ctx.config.endpoint(from)?.available;
    let destination = &ctx.config.endpoint(to)?.available;
    let request = TransferRequest::new(currency, quantity, source.as_str(), destination.as_str());

    let token = token.unwrap_or_else(TransferToken::generate);
    dual(ctx, &token, &request, &request)
}

/// Run a dual transfer and persist whatever committed, including a partial
/// result, before reporting the outcome.
fn dual(
    ctx: &BookContext,
    token: &TransferToken,
    exchange_leg: &TransferRequest,
    customer_leg: &TransferRequest,
) -> anyhow::Result<TransferReceipt> {
    let coordinator =
        TransferCoordinator::new(Arc::clone(&ctx.exchange), Arc::clone(&ctx.customer));
    let result = coordinator.transfer_dual(token, exchange_leg, customer_leg);
    ctx.save()?;
    result.with_context(|| format!("transfer {token} incomplete; rerun with --token {token}"))
}

/// One step of the walkthrough and the comparison taken after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScenarioStep {
    pub step: String,
    pub exchange_version: u64,
    pub customer_version: u64,
    pub report: Vec<Comparison>,
}

/// End-to-end walkthrough on in-memory books: the exchange takes a 1.5 BTC
/// deposit, the customer mirrors it, then 1.25 BTC moves from funding to spot
/// on both sides.
pub fn scenario() -> anyhow::Result<Vec<ScenarioStep>> {
    let config = ReconcileConfig::new(
        LedgerConfig {
            name: "okcatbox".to_string(),
            journal: "okcatbox.journal.json".into(),
        },
        LedgerConfig {
            name: "customer".to_string(),
            journal: "customer.journal.json".into(),
        },
    );
    let ctx = InMemoryBooks::new(config)?;

    let mut steps = vec![ctx.step("books opened")?];

    let quantity = Decimal::new(15, 1);
    transfer(ctx.exchange.as_ref(), &exchange_deposit("BTC", quantity))?;
    steps.push(ctx.step("exchange booked 1.5 BTC deposit")?);

    transfer(ctx.customer.as_ref(), &customer_deposit("BTC", quantity))?;
    steps.push(ctx.step("customer booked the matching transfer")?);

    let from = &ctx.config.endpoint("6")?.available;
    let to = &ctx.config.endpoint("1")?.available;
    let request = TransferRequest::new("BTC", Decimal::new(125, 2), from.as_str(), to.as_str());
    TransferCoordinator::new(Arc::clone(&ctx.exchange), Arc::clone(&ctx.customer)).transfer_dual(
        &TransferToken::generate(),
        &request,
        &request,
    )?;
    steps.push(ctx.step("1.25 BTC moved from funding (6) to spot (1)")?);

    Ok(steps)
}

/// Books that live only for the duration of `scenario`.
struct InMemoryBooks {
    config: ReconcileConfig,
    exchange: Arc<InMemoryLedger>,
    customer: Arc<InMemoryLedger>,
}

impl InMemoryBooks {
    fn new(config: ReconcileConfig) -> anyhow::Result<Self> {
        let exchange = Arc::new(InMemoryLedger::new(dualbook_core::LedgerId::new()));
        let customer = Arc::new(InMemoryLedger::new(dualbook_core::LedgerId::new()));
        layout::seed_exchange(exchange.as_ref())?;
        layout::seed_customer(customer.as_ref(), INITIAL_EQUITY)?;
        Ok(Self {
            config,
            exchange,
            customer,
        })
    }

    fn step(&self, step: &str) -> anyhow::Result<ScenarioStep> {
        let report = compare_symbols(
            self.exchange.as_ref(),
            self.customer.as_ref(),
            self.config.categories.as_slice(),
        )?;
        Ok(ScenarioStep {
            step: step.to_string(),
            exchange_version: self.exchange.snapshot()?.version(),
            customer_version: self.customer.snapshot()?.version(),
            report,
        })
    }
}
