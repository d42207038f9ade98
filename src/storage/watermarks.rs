use anyhow::Result;
use chrono::Utc;

use super::schema::Database;

impl Database {
    // ========================================================================
    // Watermark Operations
    // ========================================================================

    /// Id of the newest entry already emitted for `feed`, or `None` if the
    /// feed has never emitted anything. Feed names are matched ignoring case.
    pub async fn get_watermark(&self, feed: &str) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT last_id FROM watermarks WHERE feed_key = ?")
                .bind(feed.to_lowercase())
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Record `last_id` as the newest emitted entry for `feed` (UPSERT).
    ///
    /// A single statement, so concurrent writers for the same feed replace
    /// each other whole rather than interleaving.
    pub async fn set_watermark(&self, feed: &str, last_id: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO watermarks (feed_key, last_id, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(feed_key) DO UPDATE SET last_id = excluded.last_id, updated_at = excluded.updated_at
        "#,
        )
        .bind(feed.to_lowercase())
        .bind(last_id)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
