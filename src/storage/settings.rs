use anyhow::Result;
use chrono::Utc;

use super::schema::Database;

/// Setting holding the poll interval in seconds, stored as the raw string
/// the operator gave.
pub const INTERVAL_KEY: &str = "interval";

impl Database {
    // ========================================================================
    // Settings Operations
    // ========================================================================

    /// Get a single setting by key, or `None` if it was never set.
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a setting value (UPSERT).
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Store `default` under `key` unless something is already there, and
    /// return whichever value is now in effect.
    pub async fn init_setting(&self, key: &str, default: &str) -> Result<String> {
        sqlx::query(
            "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, ?) ON CONFLICT(key) DO NOTHING",
        )
        .bind(key)
        .bind(default)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(self
            .get_setting(key)
            .await?
            .unwrap_or_else(|| default.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::INTERVAL_KEY;
    use crate::storage::Database;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_get_setting_missing() {
        let db = test_db().await;
        assert_eq!(db.get_setting("nonexistent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_setting_upsert() {
        let db = test_db().await;
        db.set_setting(INTERVAL_KEY, "300").await.unwrap();
        db.set_setting(INTERVAL_KEY, "60").await.unwrap();
        assert_eq!(db.get_setting(INTERVAL_KEY).await.unwrap().as_deref(), Some("60"));
    }

    #[tokio::test]
    async fn test_init_setting_only_fills_missing() {
        let db = test_db().await;
        assert_eq!(db.init_setting(INTERVAL_KEY, "300").await.unwrap(), "300");

        db.set_setting(INTERVAL_KEY, "45").await.unwrap();
        assert_eq!(db.init_setting(INTERVAL_KEY, "300").await.unwrap(), "45");
    }

    #[tokio::test]
    async fn test_settings_keep_raw_strings() {
        let db = test_db().await;
        db.set_setting(INTERVAL_KEY, "not a number").await.unwrap();
        assert_eq!(
            db.get_setting(INTERVAL_KEY).await.unwrap().as_deref(),
            Some("not a number")
        );
    }
}
