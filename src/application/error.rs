use thiserror::Error;

use crate::domain::Cents;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Friend not found: {0}")]
    FriendNotFound(String),

    #[error("Friend already exists: {0}")]
    FriendAlreadyExists(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("A bill needs at least one participant")]
    EmptySplit,

    #[error("Share recorded for '{0}', who is not among the participants")]
    UnknownShareParticipant(String),

    #[error("Exact split amounts sum to {actual} cents, bill total is {expected} cents")]
    ExactSplitMismatch { expected: Cents, actual: Cents },

    #[error("Percentage split values sum to {actual}, expected 100")]
    PercentageSplitMismatch { actual: f64 },

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}
