use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, percent_of, split_even, to_cents};

pub type BillId = Uuid;

/// How a bill's amount is divided among its participants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitType {
    #[default]
    Equal,
    Exact,
    Percentage,
}

impl SplitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SplitType::Equal => "equal",
            SplitType::Exact => "exact",
            SplitType::Percentage => "percentage",
        }
    }

    /// Records written by older versions may carry split types this version
    /// does not know; those fall back to an equal split.
    pub fn from_str_lossy(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "exact" => SplitType::Exact,
            "percentage" => SplitType::Percentage,
            _ => SplitType::Equal,
        }
    }
}

impl Serialize for SplitType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SplitType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(SplitType::from_str_lossy(&s))
    }
}

impl std::fmt::Display for SplitType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A bill is a shared expense: one person paid, a set of participants each owe
/// a portion. Bills are immutable once recorded; balances are always derived
/// from the full bill history, never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bill {
    pub id: BillId,
    /// Who paid the bill up front
    pub payer: String,
    /// Total amount in cents (always positive). A record missing its amount
    /// loads as zero and is skipped by the engine rather than rejected.
    #[serde(default)]
    pub amount_cents: Cents,
    /// Participants who owe a portion. Treated as a set: duplicates are ignored.
    #[serde(default)]
    pub split_with: Vec<String>,
    #[serde(default)]
    pub split_type: SplitType,
    /// Per-participant share: decimal currency units for `exact`,
    /// percent values for `percentage`. Empty for `equal`.
    #[serde(default)]
    pub split_amounts: HashMap<String, f64>,
    /// When the expense occurred; bounds which settlements apply to it
    pub date: DateTime<Utc>,
    /// When we recorded this bill in the system
    pub recorded_at: DateTime<Utc>,
    /// Currency code, expected uniform per friend pair
    pub currency: String,
    pub description: Option<String>,
}

impl Bill {
    /// Create a new equal-split bill.
    pub fn new(
        payer: impl Into<String>,
        amount_cents: Cents,
        split_with: Vec<String>,
        date: DateTime<Utc>,
    ) -> Self {
        assert!(amount_cents > 0, "Bill amount must be positive");
        Self {
            id: Uuid::new_v4(),
            payer: payer.into(),
            amount_cents,
            split_with,
            split_type: SplitType::Equal,
            split_amounts: HashMap::new(),
            date,
            recorded_at: Utc::now(),
            currency: "EUR".to_string(),
            description: None,
        }
    }

    /// Switch to an exact split with per-participant decimal amounts.
    pub fn with_exact_split(mut self, amounts: HashMap<String, f64>) -> Self {
        self.split_type = SplitType::Exact;
        self.split_amounts = amounts;
        self
    }

    /// Switch to a percentage split with per-participant percent values.
    pub fn with_percentage_split(mut self, percentages: HashMap<String, f64>) -> Self {
        self.split_type = SplitType::Percentage;
        self.split_amounts = percentages;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Participants in insertion order with duplicates removed.
    pub fn participants(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.split_with
            .iter()
            .map(String::as_str)
            .filter(|p| seen.insert(*p))
            .collect()
    }

    /// Whether this bill can affect any balance. Bills with a non-positive
    /// amount or no participants are skipped by the reconciliation engine.
    pub fn contributes(&self) -> bool {
        self.amount_cents > 0 && !self.split_with.is_empty()
    }

    /// The split calculator: per-participant owed amounts in cents.
    ///
    /// Equal splits divide the total by the participant count; exact splits
    /// return the explicit amounts verbatim; percentage splits apply each
    /// percent to the total. Every result is rounded to a whole cent. An
    /// empty participant set yields an empty map, never a division error.
    pub fn individual_amounts(&self) -> HashMap<String, Cents> {
        let participants = self.participants();
        match self.split_type {
            SplitType::Equal => {
                let share = split_even(self.amount_cents, participants.len());
                participants
                    .into_iter()
                    .map(|p| (p.to_string(), share))
                    .collect()
            }
            SplitType::Exact => participants
                .into_iter()
                .filter_map(|p| {
                    self.split_amounts
                        .get(p)
                        .map(|units| (p.to_string(), to_cents(*units)))
                })
                .collect(),
            SplitType::Percentage => participants
                .into_iter()
                .filter_map(|p| {
                    self.split_amounts
                        .get(p)
                        .map(|pct| (p.to_string(), percent_of(self.amount_cents, *pct)))
                })
                .collect(),
        }
    }
}
