//! Standard books for an exchange and one of its customers.

use chrono::{DateTime, TimeZone, Utc};

use dualbook_core::{CategoryId, LedgerResult};
use dualbook_ledger::{Distribution, LedgerStore};
use dualbook_reconcile::Role;

pub const CURRENCIES: [(&str, &str); 2] = [("BTC", "Bitcoin"), ("LTC", "Litecoin")];

/// Id of the customer whose accounts the exchange keeps.
pub const CUSTOMER: &str = "moe";

fn category<L>(ledger: &L, role: Role) -> LedgerResult<CategoryId>
where
    L: LedgerStore + ?Sized,
{
    ledger.create_category(role.symbol(), role.title())
}

/// Exchange books: per currency, a hot wallet and deposit clearing account,
/// plus the customer's liability, funding, spot-available and spot-hold
/// accounts.
///
/// The customer's funding and spot accounts carry the customer's sign so they
/// compare directly against the customer's own books; the clearing account
/// offsets them.
pub fn seed_exchange<L>(ledger: &L) -> LedgerResult<()>
where
    L: LedgerStore + ?Sized,
{
    let f = category(ledger, Role::Funding)?;
    let sa = category(ledger, Role::SpotAvailable)?;
    let sh = category(ledger, Role::SpotHold)?;
    let h = category(ledger, Role::HotWallet)?;
    let l = category(ledger, Role::CustomerLiability)?;
    let c = category(ledger, Role::Clearing)?;

    for (symbol, title) in CURRENCIES {
        let id = ledger.create_currency(symbol, title)?;
        for (tag, title) in [(h, "Hot wallet"), (c, "Deposit clearing")] {
            let account = ledger.create_account(id, title)?;
            ledger.tag_account(account, tag)?;
        }

        for (tag, title) in [
            (l, "deposits"),
            (f, "funding"),
            (sa, "spot available"),
            (sh, "spot hold"),
        ] {
            let account = ledger.create_account(id, &format!("{CUSTOMER} {title}"))?;
            ledger.tag_account(account, tag)?;
        }
    }

    tracing::info!(ledger_id = %ledger.ledger_id(), "exchange books created");
    Ok(())
}

/// Customer books: owner's equity, a local wallet (the deposit source) and
/// mirrors of the exchange-side accounts, seeded with `initial_equity` BTC.
pub fn seed_customer<L>(ledger: &L, initial_equity: i64) -> LedgerResult<()>
where
    L: LedgerStore + ?Sized,
{
    let f = category(ledger, Role::Funding)?;
    let sa = category(ledger, Role::SpotAvailable)?;
    let sh = category(ledger, Role::SpotHold)?;
    let d = category(ledger, Role::Deposit)?;

    let mut btc_wallet = None;
    let mut btc_equity = None;
    for (symbol, title) in CURRENCIES {
        let id = ledger.create_currency(symbol, title)?;
        let equity = ledger.create_account(id, "Owner's equity")?;
        let wallet = ledger.create_account(id, "Local wallet")?;
        ledger.tag_account(wallet, d)?;

        for (tag, title) in [
            (f, "OKEx Funding"),
            (sa, "OKEx Spot-Available"),
            (sh, "OKEx Spot-Hold"),
        ] {
            let account = ledger.create_account(id, title)?;
            ledger.tag_account(account, tag)?;
        }

        if symbol == "BTC" {
            btc_wallet = Some(wallet);
            btc_equity = Some(equity);
        }
    }

    if let (Some(wallet), Some(equity)) = (btc_wallet, btc_equity) {
        ledger.post_transaction(
            "Initial Equity",
            opening_time(),
            vec![
                Distribution::new(wallet, initial_equity, 0),
                Distribution::new(equity, -initial_equity, 0),
            ],
        )?;
    }

    tracing::info!(ledger_id = %ledger.ledger_id(), "customer books created");
    Ok(())
}

fn opening_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 5, 1, 12, 34, 55)
        .single()
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualbook_core::{LedgerError, LedgerId};
    use dualbook_ledger::{InMemoryLedger, aggregate, aggregate_in_currency};
    use rust_decimal_macros::dec;

    #[test]
    fn fresh_books_reconcile() {
        let exchange = InMemoryLedger::new(LedgerId::new());
        let customer = InMemoryLedger::new(LedgerId::new());
        seed_exchange(&exchange).unwrap();
        seed_customer(&customer, 2).unwrap();

        let report = dualbook_reconcile::compare(&exchange, &customer, &["F", "SA", "SH"]).unwrap();
        assert!(report.is_empty());
    }

    #[test]
    fn exchange_has_one_account_per_role_and_currency() {
        let exchange = InMemoryLedger::new(LedgerId::new());
        seed_exchange(&exchange).unwrap();

        for role in [
            Role::Funding,
            Role::SpotAvailable,
            Role::SpotHold,
            Role::HotWallet,
            Role::CustomerLiability,
            Role::Clearing,
        ] {
            for (currency, _) in CURRENCIES {
                assert_eq!(
                    aggregate_in_currency(&exchange, role.symbol(), currency).unwrap(),
                    Some(dec!(0)),
                    "{} {currency}",
                    role.symbol()
                );
            }
        }
    }

    #[test]
    fn customer_starts_with_equity_in_the_local_wallet() {
        let customer = InMemoryLedger::new(LedgerId::new());
        seed_customer(&customer, 2).unwrap();

        assert_eq!(aggregate_in_currency(&customer, "D", "BTC").unwrap(), Some(dec!(2)));
        assert_eq!(aggregate_in_currency(&customer, "D", "LTC").unwrap(), Some(dec!(0)));
        assert_eq!(aggregate(&customer, "F").unwrap(), Some(dec!(0)));
    }

    #[test]
    fn seeding_twice_fails_on_duplicate_symbols() {
        let exchange = InMemoryLedger::new(LedgerId::new());
        seed_exchange(&exchange).unwrap();
        assert!(matches!(
            seed_exchange(&exchange),
            Err(LedgerError::DuplicateSymbol { .. })
        ));
    }
}
