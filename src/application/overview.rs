use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::Cents;

/// Two-sided balance view between the account owner and one friend.
///
/// The engine works on a single signed net balance; this view is a pure
/// derivation kept for display, so at most one side is ever nonzero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceOverview {
    /// What the account owner owes the friend
    pub you_owe: Cents,
    /// What the friend owes the account owner
    pub owes_you: Cents,
}

impl BalanceOverview {
    /// Derive the two-sided view from a signed net balance
    /// (positive = the friend owes the owner).
    pub fn from_net(net: Cents) -> Self {
        Self {
            you_owe: (-net).max(0),
            owes_you: net.max(0),
        }
    }

    pub fn net(&self) -> Cents {
        self.owes_you - self.you_owe
    }

    pub fn is_settled(&self) -> bool {
        self.you_owe == 0 && self.owes_you == 0
    }
}

/// A friend's aggregated balances with everyone except the account owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OthersSummary {
    pub friend_owes_others: Cents,
    pub others_owe_friend: Cents,
    /// Per-person signed balance, positive when that person owes the friend
    pub breakdown: BTreeMap<String, Cents>,
}

impl OthersSummary {
    pub fn from_breakdown(breakdown: BTreeMap<String, Cents>) -> Self {
        let friend_owes_others = breakdown.values().filter(|b| **b < 0).map(|b| -b).sum();
        let others_owe_friend = breakdown.values().filter(|b| **b > 0).sum();
        Self {
            friend_owes_others,
            others_owe_friend,
            breakdown,
        }
    }
}

/// The complete reconciled view for one friend: the pairwise balance with
/// the account owner plus the friend's third-party aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FriendOverview {
    pub friend: String,
    pub balance: BalanceOverview,
    pub others: OthersSummary,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_net_positive() {
        let view = BalanceOverview::from_net(1500);
        assert_eq!(view.owes_you, 1500);
        assert_eq!(view.you_owe, 0);
        assert_eq!(view.net(), 1500);
    }

    #[test]
    fn test_from_net_negative() {
        let view = BalanceOverview::from_net(-2000);
        assert_eq!(view.owes_you, 0);
        assert_eq!(view.you_owe, 2000);
        assert_eq!(view.net(), -2000);
    }

    #[test]
    fn test_from_net_zero_is_settled() {
        let view = BalanceOverview::from_net(0);
        assert!(view.is_settled());
    }

    #[test]
    fn test_others_summary_totals() {
        let breakdown = BTreeMap::from([
            ("bob".to_string(), 3000),
            ("carol".to_string(), -2000),
            ("dave".to_string(), 500),
        ]);
        let summary = OthersSummary::from_breakdown(breakdown);

        assert_eq!(summary.others_owe_friend, 3500);
        assert_eq!(summary.friend_owes_others, 2000);
    }
}
