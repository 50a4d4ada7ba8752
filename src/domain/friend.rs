use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FriendId = Uuid;

/// A person on the roster. Friend names are the participant identifiers used
/// throughout bills and settlements, so they must be unique per account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Friend {
    pub id: FriendId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl Friend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_friend_has_distinct_id() {
        let a = Friend::new("alice");
        let b = Friend::new("alice");
        assert_ne!(a.id, b.id);
        assert_eq!(a.name, b.name);
    }
}
