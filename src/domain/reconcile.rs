use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

use super::{Bill, Cents, Direction, Settlement, pair_key};

/// Which of the two parties in a pairwise computation paid a settlement.
enum PaidBy {
    First,
    Second,
}

/// Net balance between the account owner and one friend, positive when the
/// friend owes the owner.
///
/// Pure and stateless: the balance is recomputed in full from the bill and
/// settlement snapshots on every call, inputs are never mutated, and no
/// error is ever surfaced. Malformed records contribute zero. Internally the
/// balance is a single signed cent amount; the two-sided "you owe / owes
/// you" view shown to users is derived at the presentation boundary.
///
/// Bills qualify when one of the two parties is the payer and the other is
/// a split participant. With no qualifying bill the result is forced to
/// exactly zero: settlement history from a prior, now-irrelevant
/// relationship must not leak in. Settlements dated before the earliest
/// qualifying bill are excluded for the same reason, and the rest replay in
/// chronological order.
pub fn net_balance(
    bills: &[Bill],
    settlements: &[Settlement],
    user: &str,
    friend: &str,
) -> Cents {
    let (net, first_bill_date) = bill_net(bills, user, friend);
    let Some(cutoff) = first_bill_date else {
        return 0;
    };
    apply_settlements(net, settlements, user, friend, true, cutoff)
}

/// Balances between one friend and every third party (everyone except the
/// account owner and the friend), keyed by person, positive when that
/// person owes the friend.
///
/// Each pair gets the same treatment as the pairwise computation: a
/// qualifying-bill guard, a first-bill-date cutoff, and chronological
/// settlement replay. Settlement direction is resolved by payer name only;
/// the `direction` tag describes the account owner's own settlements and
/// says nothing about a third-party pair.
pub fn others_balances(
    bills: &[Bill],
    settlements_by_pair: &HashMap<String, Vec<Settlement>>,
    user: &str,
    friend: &str,
) -> BTreeMap<String, Cents> {
    let mut balances: BTreeMap<String, Cents> = BTreeMap::new();
    let mut first_dates: HashMap<String, DateTime<Utc>> = HashMap::new();

    for bill in bills {
        if !bill.contributes() {
            continue;
        }
        let amounts = bill.individual_amounts();
        let participants = bill.participants();
        let friend_participates = participants.contains(&friend);

        for person in &participants {
            let person = *person;
            if person == user || person == friend {
                continue;
            }
            if bill.payer == friend {
                // Friend paid for this person: they owe the friend their share
                let share = amounts.get(person).copied().unwrap_or(0);
                *balances.entry(person.to_string()).or_insert(0) += share;
                track_first_date(&mut first_dates, person, bill.date);
            } else if bill.payer == person && friend_participates {
                // This person paid and the friend owes their own share
                let friend_share = amounts.get(friend).copied().unwrap_or(0);
                *balances.entry(person.to_string()).or_insert(0) -= friend_share;
                track_first_date(&mut first_dates, person, bill.date);
            }
        }
    }

    for (person, balance) in balances.iter_mut() {
        let cutoff = first_dates[person.as_str()];
        if let Some(history) = settlements_by_pair.get(&pair_key(friend, person)) {
            *balance = apply_settlements(*balance, history, friend, person, false, cutoff);
        }
    }

    balances
}

/// Net the bill history between two parties: positive when `second` owes
/// `first`. Also reports the earliest qualifying bill date, or `None` when
/// no bill involves both parties.
fn bill_net(bills: &[Bill], first: &str, second: &str) -> (Cents, Option<DateTime<Utc>>) {
    let mut net: Cents = 0;
    let mut first_date: Option<DateTime<Utc>> = None;

    for bill in bills {
        if !bill.contributes() {
            continue;
        }
        let participants = bill.participants();
        let qualifies = (bill.payer == first && participants.contains(&second))
            || (bill.payer == second && participants.contains(&first));
        if !qualifies {
            continue;
        }

        let amounts = bill.individual_amounts();
        if bill.payer == first {
            net += amounts.get(second).copied().unwrap_or(0);
        } else {
            net -= amounts.get(first).copied().unwrap_or(0);
        }
        if first_date.is_none_or(|d| bill.date < d) {
            first_date = Some(bill.date);
        }
    }

    (net, first_date)
}

/// Replay a settlement history against a running balance.
///
/// Settlements dated before `cutoff` are excluded; the rest apply in
/// ascending date order, same-timestamp records tie-broken by id. Paying
/// more than is owed flips the sign of the remainder: the counterparty now
/// owes the excess back. A settlement whose payer cannot be resolved to
/// either party is a no-op.
fn apply_settlements(
    mut net: Cents,
    settlements: &[Settlement],
    first: &str,
    second: &str,
    trust_direction: bool,
    cutoff: DateTime<Utc>,
) -> Cents {
    let mut applicable: Vec<&Settlement> = settlements
        .iter()
        .filter(|s| s.amount_cents > 0 && s.date >= cutoff)
        .collect();
    applicable.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));

    for settlement in applicable {
        match resolve_payer(settlement, first, second, trust_direction) {
            Some(PaidBy::First) => net += settlement.amount_cents,
            Some(PaidBy::Second) => net -= settlement.amount_cents,
            None => {}
        }
    }

    net
}

/// Resolve which party paid a settlement. The explicit direction tag wins
/// when the pair is the one the tag was recorded against (`first` is the
/// account owner); otherwise the payer name decides.
fn resolve_payer(
    settlement: &Settlement,
    first: &str,
    second: &str,
    trust_direction: bool,
) -> Option<PaidBy> {
    if trust_direction {
        match settlement.direction {
            Some(Direction::UserToFriend) => return Some(PaidBy::First),
            Some(Direction::FriendToUser) => return Some(PaidBy::Second),
            None => {}
        }
    }
    if settlement.payer == first {
        Some(PaidBy::First)
    } else if settlement.payer == second {
        Some(PaidBy::Second)
    } else {
        None
    }
}

fn track_first_date(
    first_dates: &mut HashMap<String, DateTime<Utc>>,
    person: &str,
    date: DateTime<Utc>,
) {
    first_dates
        .entry(person.to_string())
        .and_modify(|d| {
            if date < *d {
                *d = date;
            }
        })
        .or_insert(date);
}
