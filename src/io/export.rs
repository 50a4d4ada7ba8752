use std::collections::BTreeMap;
use std::io::Write;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::SplitService;
use crate::domain::{Bill, Friend, Settlement, format_cents};

/// Database snapshot for full export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub owner: String,
    pub friends: Vec<Friend>,
    pub bills: Vec<Bill>,
    /// Settlement histories keyed by canonical pair key
    pub settlements: BTreeMap<String, Vec<Settlement>>,
}

/// Exporter for converting ledger data to various formats
pub struct Exporter<'a> {
    service: &'a SplitService,
}

impl<'a> Exporter<'a> {
    pub fn new(service: &'a SplitService) -> Self {
        Self { service }
    }

    /// Export bills to CSV format
    pub async fn export_bills_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let bills = self.service.bills().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "date",
            "payer",
            "amount",
            "currency",
            "split_type",
            "split_with",
            "description",
        ])?;

        let mut count = 0;
        for bill in &bills {
            csv_writer.write_record([
                bill.id.to_string(),
                bill.date.to_rfc3339(),
                bill.payer.clone(),
                format_cents(bill.amount_cents),
                bill.currency.clone(),
                bill.split_type.as_str().to_string(),
                bill.split_with.join(";"),
                bill.description.clone().unwrap_or_default(),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export reconciled per-friend balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let overviews = self.service.all_overviews().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["friend", "you_owe", "owes_you", "net"])?;

        let mut count = 0;
        for overview in &overviews {
            csv_writer.write_record([
                overview.friend.clone(),
                format_cents(overview.balance.you_owe),
                format_cents(overview.balance.owes_you),
                format_cents(overview.balance.net()),
            ])?;
            count += 1;
        }

        csv_writer.flush()?;
        Ok(count)
    }

    /// Export the full database as a JSON snapshot
    pub async fn export_full_json<W: Write>(&self, mut writer: W) -> Result<DatabaseSnapshot> {
        let snapshot = DatabaseSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            owner: self.service.owner().to_string(),
            friends: self.service.list_friends().await?,
            bills: self.service.bills().await?,
            settlements: self.service.all_settlement_histories().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
