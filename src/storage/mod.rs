mod repository;

pub use repository::*;

/// SQL migration for the key-value store backing all records
pub const MIGRATION_001_KV: &str = r#"
CREATE TABLE IF NOT EXISTS kv (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;
