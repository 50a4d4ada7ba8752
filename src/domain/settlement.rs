use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Cents;

pub type SettlementId = Uuid;

/// Who paid in a settlement, relative to the account owner the record was
/// written against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The account owner paid the friend
    UserToFriend,
    /// The friend paid the account owner
    FriendToUser,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::UserToFriend => "user_to_friend",
            Direction::FriendToUser => "friend_to_user",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A settlement is a direct payment between two people, recorded to reduce an
/// outstanding balance. Settlements are append-only: a correction is a new
/// settlement in the opposite direction, never an edit.
///
/// Histories are kept per unordered participant pair (see [`pair_key`]).
/// Legacy records carry no `direction` tag; [`Settlement::normalized`]
/// backfills it from the payer name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub id: SettlementId,
    /// Amount in cents (always positive). A record missing its amount loads
    /// as zero and is a no-op during replay.
    #[serde(default)]
    pub amount_cents: Cents,
    /// When the payment was made; settlements replay in this order
    pub date: DateTime<Utc>,
    pub payer: String,
    pub receiver: String,
    #[serde(default)]
    pub direction: Option<Direction>,
    /// Free text, typically the payment method
    #[serde(default)]
    pub note: Option<String>,
}

impl Settlement {
    pub fn new(
        payer: impl Into<String>,
        receiver: impl Into<String>,
        amount_cents: Cents,
        date: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Settlement amount must be positive");
        Self {
            id: Uuid::new_v4(),
            amount_cents,
            date,
            payer: payer.into(),
            receiver: receiver.into(),
            direction: None,
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Backfill the direction tag from the payer name, relative to the given
    /// account owner. Records whose payer matches neither role keep `None`
    /// and are skipped by the reconciliation engine.
    pub fn normalized(mut self, owner: &str) -> Self {
        if self.direction.is_none() {
            if self.payer == owner {
                self.direction = Some(Direction::UserToFriend);
            } else if self.receiver == owner {
                self.direction = Some(Direction::FriendToUser);
            }
        }
        self
    }
}

/// Canonical key for the unordered pair of participants: the two names
/// sorted, joined with an underscore. One settlement history exists per
/// unordered pair, not per directed relationship.
pub fn pair_key(a: &str, b: &str) -> String {
    let mut names = [a, b];
    names.sort_unstable();
    names.join("_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("bob", "alice"), "alice_bob");
        assert_eq!(pair_key("alice", "bob"), "alice_bob");
        assert_eq!(pair_key("alice", "alice"), "alice_alice");
    }

    #[test]
    fn test_normalized_backfills_from_payer() {
        let s = Settlement::new("me", "alice", 1000, Utc::now()).normalized("me");
        assert_eq!(s.direction, Some(Direction::UserToFriend));

        let s = Settlement::new("alice", "me", 1000, Utc::now()).normalized("me");
        assert_eq!(s.direction, Some(Direction::FriendToUser));
    }

    #[test]
    fn test_normalized_keeps_existing_direction() {
        let s = Settlement::new("me", "alice", 1000, Utc::now())
            .with_direction(Direction::FriendToUser)
            .normalized("me");
        assert_eq!(s.direction, Some(Direction::FriendToUser));
    }

    #[test]
    fn test_normalized_leaves_unrelated_payer_untagged() {
        let s = Settlement::new("dave", "alice", 1000, Utc::now()).normalized("me");
        assert_eq!(s.direction, None);
    }

    #[test]
    fn test_legacy_record_deserializes_without_direction() {
        let json = r#"{
            "id": "2f0b58a7-08a7-4a0e-b0bd-3f2b6a9c1d20",
            "amount_cents": 2500,
            "date": "2024-02-10T12:00:00Z",
            "payer": "alice",
            "receiver": "me"
        }"#;
        let s: Settlement = serde_json::from_str(json).unwrap();
        assert_eq!(s.direction, None);
        assert_eq!(s.note, None);
    }

    #[test]
    #[should_panic(expected = "Settlement amount must be positive")]
    fn test_settlement_requires_positive_amount() {
        Settlement::new("me", "alice", 0, Utc::now());
    }
}
