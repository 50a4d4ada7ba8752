use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use sqlx::{Row, SqlitePool};

use crate::domain::{Bill, Friend, Settlement, pair_key};

use super::MIGRATION_001_KV;

/// Key namespace for friend rosters, per account owner
const FRIENDS_NS: &str = "friends_";
/// Key namespace for bill lists, per account owner
const BILLS_NS: &str = "bills_";
/// Key namespace for settlement histories, per unordered participant pair
const SETTLEMENTS_NS: &str = "settlements_";

/// Repository for persisting friends, bills, and settlement histories.
///
/// Everything is stored through a namespaced key-value string contract
/// (`get(key) -> string | null`, `set(key, string)`) backed by a single
/// SQLite table, with record lists serialized as JSON. Settlement keys use
/// the canonical pair key, so one history exists per unordered pair.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database at the given path.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = SqlitePool::connect(database_url)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_KV)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    // ========================
    // Key-value contract
    // ========================

    /// Fetch the raw string stored under a key, if any.
    pub async fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM kv WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read key")?;
        Ok(row.map(|r| r.get("value")))
    }

    /// Store a raw string under a key, replacing any previous value.
    pub async fn kv_put(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO kv (key, value, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to write key")?;
        Ok(())
    }

    /// List all keys under a namespace prefix.
    pub async fn kv_keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{}%", prefix.replace('%', "\\%").replace('_', "\\_"));
        let rows = sqlx::query("SELECT key FROM kv WHERE key LIKE ? ESCAPE '\\' ORDER BY key")
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list keys")?;
        Ok(rows.iter().map(|r| r.get("key")).collect())
    }

    async fn load_list<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>> {
        match self.kv_get(key).await? {
            Some(json) => serde_json::from_str(&json)
                .with_context(|| format!("Corrupt record list under key '{}'", key)),
            None => Ok(Vec::new()),
        }
    }

    async fn save_list<T: Serialize>(&self, key: &str, items: &[T]) -> Result<()> {
        let json = serde_json::to_string(items)?;
        self.kv_put(key, &json).await
    }

    // ========================
    // Friend operations
    // ========================

    pub async fn load_friends(&self, owner: &str) -> Result<Vec<Friend>> {
        self.load_list(&format!("{}{}", FRIENDS_NS, owner)).await
    }

    pub async fn save_friends(&self, owner: &str, friends: &[Friend]) -> Result<()> {
        self.save_list(&format!("{}{}", FRIENDS_NS, owner), friends)
            .await
    }

    /// Append one friend to the roster (read, push, write back).
    pub async fn append_friend(&self, owner: &str, friend: &Friend) -> Result<()> {
        let mut friends = self.load_friends(owner).await?;
        friends.push(friend.clone());
        self.save_friends(owner, &friends).await
    }

    // ========================
    // Bill operations
    // ========================

    pub async fn load_bills(&self, owner: &str) -> Result<Vec<Bill>> {
        self.load_list(&format!("{}{}", BILLS_NS, owner)).await
    }

    pub async fn save_bills(&self, owner: &str, bills: &[Bill]) -> Result<()> {
        self.save_list(&format!("{}{}", BILLS_NS, owner), bills)
            .await
    }

    /// Append one bill to the ledger (read, push, write back). Bills are
    /// immutable once recorded; this is the only write path.
    pub async fn append_bill(&self, owner: &str, bill: &Bill) -> Result<()> {
        let mut bills = self.load_bills(owner).await?;
        bills.push(bill.clone());
        self.save_bills(owner, &bills).await
    }

    // ========================
    // Settlement operations
    // ========================

    /// Load the settlement history between two people, in stored order.
    pub async fn load_settlements(&self, a: &str, b: &str) -> Result<Vec<Settlement>> {
        self.load_list(&settlements_key(a, b)).await
    }

    pub async fn save_settlements(
        &self,
        a: &str,
        b: &str,
        settlements: &[Settlement],
    ) -> Result<()> {
        self.save_list(&settlements_key(a, b), settlements).await
    }

    /// Append one settlement to its pair history (read, push, write back).
    /// Settlements are append-only; corrections are new records.
    pub async fn append_settlement(&self, settlement: &Settlement) -> Result<()> {
        let mut history = self
            .load_settlements(&settlement.payer, &settlement.receiver)
            .await?;
        history.push(settlement.clone());
        self.save_settlements(&settlement.payer, &settlement.receiver, &history)
            .await
    }

    /// Load a settlement history by its bare pair key (as returned by
    /// [`Repository::list_settlement_pairs`]).
    pub async fn load_settlements_by_pair(&self, pair: &str) -> Result<Vec<Settlement>> {
        self.load_list(&format!("{}{}", SETTLEMENTS_NS, pair)).await
    }

    /// All pair keys that have a settlement history, without the namespace
    /// prefix. Used for full exports.
    pub async fn list_settlement_pairs(&self) -> Result<Vec<String>> {
        let keys = self.kv_keys_with_prefix(SETTLEMENTS_NS).await?;
        Ok(keys
            .into_iter()
            .filter_map(|k| k.strip_prefix(SETTLEMENTS_NS).map(str::to_string))
            .collect())
    }
}

fn settlements_key(a: &str, b: &str) -> String {
    format!("{}{}", SETTLEMENTS_NS, pair_key(a, b))
}
