//! Who owes whom across a set of shared expenses.

use crate::core::importer::to_row;
use crate::domain::model::{Bill, Event, Id, PersonRef, SharingEntry, Table, Transfer};
use crate::domain::ports::{Condition, Store};
use crate::utils::error::{NoteError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::OnceLock;

const RATE_PATTERN: &str = r"^\s*([A-Za-z][A-Za-z0-9_]*)\s*[=:]\s*(\d+(?:\.\d*)?|\.\d+)\s*$";

/// Per-person paid, received and owed amounts in `target` currency.
///
/// A sharing in another currency is multiplied by `rates[currency]`; without a
/// rate it is skipped when `ignore_unknown`, otherwise the whole analysis
/// fails. Shares missing for trailing people weigh 1. Each person's weight is
/// their share over the sum of every share, extra trailing ones included, and
/// a group whose shares sum to zero splits equally.
pub fn analyze_sharing(
    sharings: &[SharingEntry],
    target: &str,
    rates: &HashMap<String, f64>,
    ignore_unknown: bool,
) -> Result<Event> {
    let mut ledger = Ledger::default();
    let mut included = Vec::new();

    for sharing in sharings {
        let amount = if sharing.currency == target {
            sharing.amount
        } else {
            match rates.get(&sharing.currency) {
                Some(rate) => sharing.amount * rate,
                None if ignore_unknown => continue,
                None => {
                    return Err(NoteError::MissingRateError {
                        currency: sharing.currency.clone(),
                        target: target.to_string(),
                        tx: sharing.tx,
                    })
                }
            }
        };

        ledger.bill(sharing.payer).paid += amount;
        ledger.bill(sharing.receiver).received += amount;

        let mut shares = sharing.shares.clone();
        if shares.len() < sharing.people.len() {
            shares.resize(sharing.people.len(), 1.0);
        }
        let total: f64 = shares.iter().sum();
        for (person, share) in sharing.people.iter().zip(&shares) {
            let needs = if total == 0.0 {
                amount / sharing.people.len() as f64
            } else {
                amount * share / total
            };
            ledger.bill(Some(*person)).needs += needs;
        }

        included.push(sharing.id);
    }

    Ok(Event {
        currency: target.to_string(),
        rates: (!rates.is_empty()).then(|| rates.clone()),
        tag: sharings.first().and_then(|sharing| sharing.tag),
        bills: ledger.bills,
        sharings: included,
    })
}

/// Bills in first-seen order.
#[derive(Default)]
struct Ledger {
    bills: Vec<Bill>,
    positions: HashMap<PersonRef, usize>,
}

impl Ledger {
    fn bill(&mut self, person: PersonRef) -> &mut Bill {
        let index = match self.positions.get(&person) {
            Some(&index) => index,
            None => {
                self.bills.push(Bill::new(person));
                self.positions.insert(person, self.bills.len() - 1);
                self.bills.len() - 1
            }
        };
        &mut self.bills[index]
    }
}

/// Greedy matching of the largest debts against the largest credits.
///
/// Both sides are taken largest first (ties keep input order) and a single
/// cursor walks the debtors; each creditor is served until their credit is
/// used up. Leftover debt once creditors run out is not transferred.
pub fn least_transfers(
    creditors: &[(PersonRef, f64)],
    debtors: &[(PersonRef, f64)],
) -> Vec<Transfer> {
    let mut creditors: Vec<(PersonRef, f64)> = creditors.to_vec();
    creditors.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut debtors: Vec<(PersonRef, f64)> = debtors.to_vec();
    debtors.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut transfers = Vec::new();
    let mut cursor = 0;

    for (creditor, credit) in creditors {
        let mut remaining = credit;
        while remaining > 0.0 && cursor < debtors.len() {
            let (debtor, debt) = &mut debtors[cursor];
            if *debt > remaining {
                transfers.push(Transfer {
                    from: *debtor,
                    to: creditor,
                    amount: remaining,
                });
                *debt -= remaining;
                remaining = 0.0;
            } else {
                transfers.push(Transfer {
                    from: *debtor,
                    to: creditor,
                    amount: *debt,
                });
                remaining -= *debt;
                cursor += 1;
            }
        }
    }

    transfers
}

/// Transfers that clear every bill: non-negative refunds are credits.
pub fn settle(bills: &[Bill]) -> Vec<Transfer> {
    let creditors: Vec<(PersonRef, f64)> = bills
        .iter()
        .filter(|bill| bill.refund() >= 0.0)
        .map(|bill| (bill.person, bill.refund()))
        .collect();
    let debtors: Vec<(PersonRef, f64)> = bills
        .iter()
        .filter(|bill| bill.refund() < 0.0)
        .map(|bill| (bill.person, -bill.refund()))
        .collect();

    least_transfers(&creditors, &debtors)
}

fn rate_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(RATE_PATTERN).expect("rate pattern is valid"))
}

/// `CUR=rate` entries such as `usd=24500` into a currency → rate map.
pub fn parse_conversion_rates<T: AsRef<str>>(entries: &[T]) -> Result<HashMap<String, f64>> {
    let pattern = rate_pattern();
    let mut rates = HashMap::new();
    for entry in entries {
        let entry = entry.as_ref();
        let invalid = || NoteError::InvalidRateError {
            input: entry.to_string(),
        };
        let captures = pattern.captures(entry).ok_or_else(invalid)?;
        let rate: f64 = captures[2].parse().map_err(|_| invalid())?;
        rates.insert(captures[1].to_string(), rate);
    }
    Ok(rates)
}

/// Sharings tagged `tag` (a tag name or id), joined with their transaction.
/// Payer and receiver are the accounts owning the transaction's wallets.
pub fn load_sharings<S: Store>(store: &S, tag: &str) -> Result<Vec<SharingEntry>> {
    let tag_id = find_id(store, Table::Tag, tag).ok_or_else(|| NoteError::NotFoundError {
        what: "tag".to_string(),
        key: tag.to_string(),
    })?;

    let mut entries = Vec::new();
    for sharing in store.query(Table::Sharing, &Condition::eq("tag", tag_id)) {
        let Some(tx_id) = sharing.get("tx").and_then(Value::as_i64) else {
            continue;
        };
        let Some(tx) = store
            .query(Table::Transaction, &Condition::Id(tx_id))
            .into_iter()
            .next()
        else {
            continue;
        };

        let mut joined = sharing;
        for field in ["amount", "currency"] {
            joined.insert(field.to_string(), tx.get(field).cloned().unwrap_or(Value::Null));
        }
        for field in ["payer", "receiver"] {
            let owner = tx
                .get(field)
                .and_then(Value::as_i64)
                .and_then(|wallet| wallet_owner(store, wallet));
            joined.insert(field.to_string(), owner.map(Value::from).unwrap_or(Value::Null));
        }

        entries.push(serde_json::from_value(Value::Object(joined))?);
    }
    Ok(entries)
}

/// Stores `event` under `name` and returns its id.
pub fn save_event<S: Store>(store: &S, name: &str, event: &Event) -> Result<Id> {
    let save_error = |reason: String| NoteError::SaveError {
        what: format!("event '{}'", name),
        reason,
    };

    let mut row = to_row(event).map_err(save_error)?;
    row.insert("name".to_string(), Value::from(name));
    store
        .insert(Table::Event, row)
        .ok_or_else(|| save_error(store.last_error().unwrap_or_default()))
}

fn find_id<S: Store>(store: &S, table: Table, key: &str) -> Option<Id> {
    let by_name = store.query(table, &Condition::eq("name", key.trim()));
    let row = match by_name.into_iter().next() {
        Some(row) => row,
        None => {
            let id = key.trim().parse::<Id>().ok()?;
            store.query(table, &Condition::Id(id)).into_iter().next()?
        }
    };
    row.get("id").and_then(Value::as_i64)
}

fn wallet_owner<S: Store>(store: &S, wallet: Id) -> Option<Id> {
    store
        .query(Table::Wallet, &Condition::Id(wallet))
        .first()?
        .get("account")
        .and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: Id, amount: f64, currency: &str, payer: Id, people: Vec<Id>, shares: Vec<f64>) -> SharingEntry {
        SharingEntry {
            id,
            tx: id * 10,
            amount,
            currency: currency.to_string(),
            payer: Some(payer),
            receiver: None,
            people,
            shares,
            tag: Some(7),
        }
    }

    fn bill(event: &Event, person: PersonRef) -> &Bill {
        event
            .bills
            .iter()
            .find(|bill| bill.person == person)
            .unwrap()
    }

    #[test]
    fn test_least_transfers_example() {
        let transfers = least_transfers(&[(Some(1), 30.0)], &[(Some(2), 10.0), (Some(3), 20.0)]);

        assert_eq!(
            transfers,
            vec![
                Transfer { from: Some(3), to: Some(1), amount: 20.0 },
                Transfer { from: Some(2), to: Some(1), amount: 10.0 },
            ]
        );
    }

    #[test]
    fn test_least_transfers_splits_large_debt() {
        let transfers = least_transfers(
            &[(Some(1), 10.0), (Some(2), 15.0)],
            &[(Some(3), 25.0)],
        );

        assert_eq!(
            transfers,
            vec![
                Transfer { from: Some(3), to: Some(2), amount: 15.0 },
                Transfer { from: Some(3), to: Some(1), amount: 10.0 },
            ]
        );
    }

    #[test]
    fn test_least_transfers_serves_largest_creditor_first() {
        let transfers = least_transfers(&[(Some(1), 10.0), (Some(2), 20.0)], &[(Some(3), 30.0)]);

        assert_eq!(
            transfers,
            vec![
                Transfer { from: Some(3), to: Some(2), amount: 20.0 },
                Transfer { from: Some(3), to: Some(1), amount: 10.0 },
            ]
        );
    }

    #[test]
    fn test_settle_pairs_largest_balances() {
        let mut bills: Vec<Bill> = (1..=4).map(|person| Bill::new(Some(person))).collect();
        bills[0].paid = 5.0;
        bills[1].paid = 25.0;
        bills[2].needs = 20.0;
        bills[3].needs = 10.0;

        assert_eq!(
            settle(&bills),
            vec![
                Transfer { from: Some(3), to: Some(2), amount: 20.0 },
                Transfer { from: Some(4), to: Some(2), amount: 5.0 },
                Transfer { from: Some(4), to: Some(1), amount: 5.0 },
            ]
        );
    }

    #[test]
    fn test_least_transfers_ties_keep_input_order() {
        let transfers = least_transfers(&[(Some(1), 20.0)], &[(Some(2), 10.0), (Some(3), 10.0)]);

        assert_eq!(transfers[0].from, Some(2));
        assert_eq!(transfers[1].from, Some(3));
    }

    #[test]
    fn test_analyze_even_split() {
        let sharings = vec![entry(1, 30.0, "usd", 1, vec![1, 2, 3], vec![])];

        let event = analyze_sharing(&sharings, "usd", &HashMap::new(), false).unwrap();

        assert_eq!(event.rates, None);
        assert_eq!(event.tag, Some(7));
        assert_eq!(event.sharings, vec![1]);
        assert_eq!(bill(&event, Some(1)).paid, 30.0);
        assert_eq!(bill(&event, Some(1)).needs, 10.0);
        assert_eq!(bill(&event, Some(2)).needs, 10.0);
        assert_eq!(bill(&event, None).received, 30.0);

        let transfers = settle(&event.bills);
        let total: f64 = transfers.iter().map(|t| t.amount).sum();
        assert_eq!(total, 20.0);
        assert!(transfers.iter().all(|t| t.to == Some(1)));
    }

    #[test]
    fn test_analyze_weighted_and_converted() {
        let sharings = vec![
            entry(1, 60.0, "usd", 1, vec![1, 2], vec![1.0, 2.0]),
            entry(2, 100.0, "eur", 2, vec![1, 2], vec![1.0, 1.0]),
        ];
        let rates = HashMap::from([("eur".to_string(), 0.5)]);

        let event = analyze_sharing(&sharings, "usd", &rates, false).unwrap();

        assert_eq!(event.rates, Some(rates));
        assert_eq!(bill(&event, Some(1)).needs, 20.0 + 25.0);
        assert_eq!(bill(&event, Some(2)).needs, 40.0 + 25.0);
        assert_eq!(bill(&event, Some(2)).paid, 50.0);
    }

    #[test]
    fn test_missing_rate() {
        let sharings = vec![
            entry(1, 60.0, "usd", 1, vec![1, 2], vec![]),
            entry(2, 10.0, "jpy", 2, vec![1], vec![]),
        ];

        let err = analyze_sharing(&sharings, "usd", &HashMap::new(), false).unwrap_err();
        assert!(matches!(err, NoteError::MissingRateError { tx: 20, .. }));

        let event = analyze_sharing(&sharings, "usd", &HashMap::new(), true).unwrap();
        assert_eq!(event.sharings, vec![1]);
    }

    #[test]
    fn test_zero_shares_split_equally() {
        let sharings = vec![entry(1, 10.0, "usd", 1, vec![1, 2], vec![0.0, 0.0])];

        let event = analyze_sharing(&sharings, "usd", &HashMap::new(), false).unwrap();

        assert_eq!(bill(&event, Some(2)).needs, 5.0);
    }

    #[test]
    fn test_extra_shares_count_towards_total() {
        let sharings = vec![entry(1, 90.0, "usd", 2, vec![1], vec![1.0, 2.0])];

        let event = analyze_sharing(&sharings, "usd", &HashMap::new(), false).unwrap();

        assert_eq!(bill(&event, Some(1)).needs, 30.0);
    }

    #[test]
    fn test_no_sharings() {
        let event = analyze_sharing(&[], "usd", &HashMap::new(), false).unwrap();

        assert!(event.bills.is_empty());
        assert!(settle(&event.bills).is_empty());
    }

    #[test]
    fn test_parse_conversion_rates() {
        let rates = parse_conversion_rates(&["usd=24500", " eur : 0.9 "]).unwrap();
        assert_eq!(rates["usd"], 24500.0);
        assert_eq!(rates["eur"], 0.9);

        for bad in ["usd", "usd=abc", "=1", "usd=-1"] {
            assert!(
                matches!(parse_conversion_rates(&[bad]), Err(NoteError::InvalidRateError { .. })),
                "{bad:?} should be rejected"
            );
        }
    }
}
