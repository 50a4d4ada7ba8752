// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use splitbook::application::{SplitService, SplitSpec};
use splitbook::domain::Cents;
use tempfile::TempDir;

/// The account owner used by all integration tests
pub const OWNER: &str = "me";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(SplitService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let service = SplitService::init(db_path.to_str().unwrap(), OWNER).await?;
    Ok((service, temp_dir))
}

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Test fixture: standard friend roster
pub struct StandardRoster;

impl StandardRoster {
    /// Create the basic roster: alice, bob, carol
    pub async fn create_basic(service: &SplitService) -> Result<()> {
        service.add_friend("alice").await?;
        service.add_friend("bob").await?;
        service.add_friend("carol").await?;
        Ok(())
    }
}

/// Record an equal-split bill on a given date
pub async fn record_equal_bill(
    service: &SplitService,
    payer: &str,
    amount_cents: Cents,
    split_with: &[&str],
    date_str: &str,
) -> Result<()> {
    service
        .record_bill(
            Some(payer),
            amount_cents,
            names(split_with),
            SplitSpec::Equal,
            parse_date(date_str),
            None,
            None,
        )
        .await?;
    Ok(())
}

/// Record a settlement on a given date
pub async fn record_settlement(
    service: &SplitService,
    payer: &str,
    receiver: &str,
    amount_cents: Cents,
    date_str: &str,
) -> Result<()> {
    service
        .record_settlement(payer, receiver, amount_cents, parse_date(date_str), None)
        .await?;
    Ok(())
}
