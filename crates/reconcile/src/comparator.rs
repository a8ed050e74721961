//! Cross-ledger comparator.
//!
//! Each pass takes one snapshot per ledger and recomputes every aggregate from
//! it; nothing is cached between passes.

use rust_decimal::Decimal;

use dualbook_core::{AggregateRoot, LedgerError, LedgerResult};
use dualbook_ledger::{LedgerState, LedgerStore};

use crate::comparison::Comparison;
use crate::correspondence::CorrespondenceTable;

/// Compare the given category symbols across two ledgers.
///
/// Returns one entry per symbol whose aggregates differ, in input order. A
/// symbol unknown to a ledger counts as absent there; absent never equals a
/// number, including zero.
pub fn compare<A, B, S>(a: &A, b: &B, symbols: &[S]) -> LedgerResult<Vec<Comparison>>
where
    A: LedgerStore + ?Sized,
    B: LedgerStore + ?Sized,
    S: AsRef<str>,
{
    let (snap_a, snap_b) = (a.snapshot()?, b.snapshot()?);

    let mut report = Vec::new();
    for symbol in symbols {
        let symbol = symbol.as_ref();
        let side_a = side(&snap_a, symbol, None)?;
        let side_b = side(&snap_b, symbol, None)?;
        if side_a != side_b {
            report.push(Comparison::new(symbol, side_a, side_b));
        }
    }

    log_pass(&snap_a, &snap_b, symbols.len(), &report);
    Ok(report)
}

/// Like [`compare`], but only over accounts denominated in `currency`.
///
/// A currency unknown to a ledger makes that side absent.
pub fn compare_in_currency<A, B, S>(
    a: &A,
    b: &B,
    symbols: &[S],
    currency: &str,
) -> LedgerResult<Vec<Comparison>>
where
    A: LedgerStore + ?Sized,
    B: LedgerStore + ?Sized,
    S: AsRef<str>,
{
    let (snap_a, snap_b) = (a.snapshot()?, b.snapshot()?);

    let mut report = Vec::new();
    for symbol in symbols {
        let symbol = symbol.as_ref();
        let side_a = side(&snap_a, symbol, Some(currency))?;
        let side_b = side(&snap_b, symbol, Some(currency))?;
        if side_a != side_b {
            report.push(Comparison::new(symbol, side_a, side_b).with_currency(currency));
        }
    }

    log_pass(&snap_a, &snap_b, symbols.len(), &report);
    Ok(report)
}

/// Compare using configured category ids instead of symbol lookup.
///
/// A row without an id on one side is absent there. A configured id that the
/// ledger does not have is a configuration error (`UnknownCategory`).
pub fn compare_with_table<A, B>(
    a: &A,
    b: &B,
    table: &CorrespondenceTable,
) -> LedgerResult<Vec<Comparison>>
where
    A: LedgerStore + ?Sized,
    B: LedgerStore + ?Sized,
{
    let (snap_a, snap_b) = (a.snapshot()?, b.snapshot()?);

    let mut report = Vec::new();
    for row in table.entries() {
        let side_a = match row.ledger_a {
            Some(id) => normalized(snap_a.category_balance(id)?),
            None => None,
        };
        let side_b = match row.ledger_b {
            Some(id) => normalized(snap_b.category_balance(id)?),
            None => None,
        };
        if side_a != side_b {
            report.push(Comparison::new(row.symbol.clone(), side_a, side_b));
        }
    }

    log_pass(&snap_a, &snap_b, table.entries().len(), &report);
    Ok(report)
}

fn side(
    snapshot: &LedgerState,
    symbol: &str,
    currency: Option<&str>,
) -> LedgerResult<Option<Decimal>> {
    let Some(category) = snapshot.category_by_symbol(symbol) else {
        return Ok(None);
    };

    let balance = match currency {
        None => snapshot.category_balance(category.id),
        Some(currency) => match snapshot.currency_by_symbol(currency) {
            Some(c) => snapshot.category_balance_in_currency(category.id, c.id),
            None => Ok(None),
        },
    };

    match balance {
        Ok(value) => Ok(normalized(value)),
        Err(LedgerError::UnknownCategory(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn normalized(value: Option<Decimal>) -> Option<Decimal> {
    value.map(|d| d.normalize())
}

fn log_pass(a: &LedgerState, b: &LedgerState, requested: usize, report: &[Comparison]) {
    if report.is_empty() {
        tracing::info!(
            ledger_a = %a.ledger_id(),
            ledger_a_version = a.version(),
            ledger_b = %b.ledger_id(),
            ledger_b_version = b.version(),
            categories = requested,
            "ledgers reconciled"
        );
    } else {
        let categories: Vec<&str> = report.iter().map(|c| c.category.as_str()).collect();
        tracing::info!(
            ledger_a = %a.ledger_id(),
            ledger_a_version = a.version(),
            ledger_b = %b.ledger_id(),
            ledger_b_version = b.version(),
            discrepancies = report.len(),
            categories = ?categories,
            "ledgers disagree"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dualbook_core::{AccountId, LedgerId};
    use dualbook_ledger::{Distribution, InMemoryLedger};
    use rust_decimal_macros::dec;

    use crate::correspondence::Correspondence;

    /// BTC, a funding account tagged "F" and an equity account.
    fn books() -> (InMemoryLedger, AccountId, AccountId) {
        let ledger = InMemoryLedger::new(LedgerId::new());
        let btc = ledger.create_currency("BTC", "Bitcoin").unwrap();
        let funding = ledger.create_account(btc, "Funding").unwrap();
        let equity = ledger.create_account(btc, "Equity").unwrap();
        let f = ledger.create_category("F", "Funding").unwrap();
        ledger.tag_account(funding, f).unwrap();
        (ledger, funding, equity)
    }

    fn fund(ledger: &InMemoryLedger, to: AccountId, from: AccountId, mantissa: i64, exponent: i32) {
        ledger
            .post_transaction(
                "fund",
                Utc::now(),
                vec![
                    Distribution::new(to, mantissa, exponent),
                    Distribution::new(from, -mantissa, exponent),
                ],
            )
            .unwrap();
    }

    #[test]
    fn equal_books_produce_empty_report() {
        let (a, fa, ea) = books();
        let (b, fb, eb) = books();
        fund(&a, fa, ea, 15, -1);
        fund(&b, fb, eb, 150, -2);

        assert!(compare(&a, &b, &["F"]).unwrap().is_empty());
    }

    #[test]
    fn absent_versus_zero_is_a_discrepancy() {
        let (a, _, _) = books();
        let b = InMemoryLedger::new(LedgerId::new());
        b.create_category("F", "Funding").unwrap();

        let report = compare(&a, &b, &["F"]).unwrap();
        assert_eq!(report, vec![Comparison::new("F", Some(dec!(0)), None)]);
    }

    #[test]
    fn unknown_on_both_sides_agrees() {
        let (a, _, _) = books();
        let (b, _, _) = books();
        assert!(compare(&a, &b, &["ZZ"]).unwrap().is_empty());
    }

    #[test]
    fn report_follows_input_order() {
        let (a, fa, ea) = books();
        let b = InMemoryLedger::new(LedgerId::new());
        fund(&a, fa, ea, 1, 0);
        let h = a.create_category("H", "Hot wallet").unwrap();
        a.tag_account(ea, h).unwrap();

        let report = compare(&a, &b, &["H", "SA", "F"]).unwrap();
        let order: Vec<&str> = report.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["H", "F"]);
    }

    #[test]
    fn repeated_passes_agree() {
        let (a, fa, ea) = books();
        let (b, _, _) = books();
        fund(&a, fa, ea, 7, -3);

        let first = compare(&a, &b, &["F", "SA"]).unwrap();
        let second = compare(&a, &b, &["F", "SA"]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn currency_scoped_comparison_carries_currency() {
        let (a, fa, ea) = books();
        let (b, _, _) = books();
        fund(&a, fa, ea, 2, 0);

        let report = compare_in_currency(&a, &b, &["F"], "BTC").unwrap();
        assert_eq!(
            report,
            vec![Comparison::new("F", Some(dec!(2)), Some(dec!(0))).with_currency("BTC")]
        );

        // Neither side holds LTC: both absent, so they agree.
        assert!(compare_in_currency(&a, &b, &["F"], "LTC").unwrap().is_empty());
    }

    #[test]
    fn table_driven_comparison_uses_configured_ids() {
        let (a, fa, ea) = books();
        let (b, fb, eb) = books();
        fund(&a, fa, ea, 3, 0);
        fund(&b, fb, eb, 3, 0);

        let table = CorrespondenceTable::new(vec![Correspondence {
            symbol: "F".to_string(),
            ledger_a: Some(dualbook_core::CategoryId::new(1)),
            ledger_b: None,
        }])
        .unwrap();

        let report = compare_with_table(&a, &b, &table).unwrap();
        assert_eq!(report, vec![Comparison::new("F", Some(dec!(3)), None)]);

        let bad = CorrespondenceTable::new(vec![Correspondence {
            symbol: "F".to_string(),
            ledger_a: Some(dualbook_core::CategoryId::new(42)),
            ledger_b: None,
        }])
        .unwrap();
        assert!(matches!(
            compare_with_table(&a, &b, &bad),
            Err(LedgerError::UnknownCategory(_))
        ));
    }
}
