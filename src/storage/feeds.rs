use anyhow::Result;
use chrono::Utc;

use super::schema::Database;
use super::types::{Feed, RegistryError};
use crate::util::validate_feed_name;

impl Database {
    // ========================================================================
    // Feed Registry Operations
    // ========================================================================

    /// Register a feed. `url` may be left unset and supplied later with
    /// [`update_feed_url`](Self::update_feed_url).
    ///
    /// # Errors
    ///
    /// - [`NameError`](crate::util::NameError) for names that are not
    ///   plain ASCII alphanumerics
    /// - [`RegistryError::Duplicate`] if the name exists in any letter case
    pub async fn add_feed(&self, name: &str, url: Option<&str>) -> Result<()> {
        validate_feed_name(name)?;

        let result = sqlx::query(
            "INSERT INTO feeds (name, url, added_at) VALUES (?, ?, ?) ON CONFLICT(name) DO NOTHING",
        )
        .bind(name)
        .bind(url)
        .bind(Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::Duplicate.into());
        }
        Ok(())
    }

    /// Point an existing feed at a new URL. The watermark is kept.
    pub async fn update_feed_url(&self, name: &str, url: &str) -> Result<()> {
        let result = sqlx::query("UPDATE feeds SET url = ? WHERE name = ?")
            .bind(url)
            .bind(name)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound.into());
        }
        Ok(())
    }

    /// Remove a feed together with its watermark, in one transaction.
    ///
    /// This is the only operation that clears a watermark.
    pub async fn delete_feed(&self, name: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("DELETE FROM feeds WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RegistryError::NotFound.into());
        }

        sqlx::query("DELETE FROM watermarks WHERE feed_key = ?")
            .bind(name.to_lowercase())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    /// All configured feeds in the order they were added.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let feeds: Vec<Feed> =
            sqlx::query_as("SELECT name, url FROM feeds ORDER BY added_at, rowid")
                .fetch_all(&self.pool)
                .await?;
        Ok(feeds)
    }

    /// Look a feed up by name, ignoring case.
    pub async fn get_feed(&self, name: &str) -> Result<Option<Feed>> {
        let feed: Option<Feed> = sqlx::query_as("SELECT name, url FROM feeds WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }
}

#[cfg(test)]
mod tests {
    use crate::storage::{Database, Feed, RegistryError};
    use crate::util::NameError;

    async fn test_db() -> Database {
        Database::open(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_add_and_list_in_insertion_order() {
        let db = test_db().await;
        db.add_feed("Zeta", Some("https://z.example/feed")).await.unwrap();
        db.add_feed("Alpha", Some("https://a.example/feed")).await.unwrap();

        let feeds = db.list_feeds().await.unwrap();
        assert_eq!(
            feeds,
            vec![
                Feed::new("Zeta", "https://z.example/feed"),
                Feed::new("Alpha", "https://a.example/feed"),
            ]
        );
    }

    #[tokio::test]
    async fn test_add_without_url() {
        let db = test_db().await;
        db.add_feed("Pending", None).await.unwrap();

        let feed = db.get_feed("pending").await.unwrap().unwrap();
        assert_eq!(feed.name, "Pending");
        assert_eq!(feed.url, None);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_case_insensitive() {
        let db = test_db().await;
        db.add_feed("Foo", Some("https://a.example")).await.unwrap();

        let err = db.add_feed("FOO", Some("https://b.example")).await.unwrap_err();
        assert_eq!(err.downcast_ref::<RegistryError>(), Some(&RegistryError::Duplicate));
        assert_eq!(db.list_feeds().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_name_rejected() {
        let db = test_db().await;
        let err = db.add_feed("bad-name", Some("https://a.example")).await.unwrap_err();
        assert!(err.downcast_ref::<NameError>().is_some());
        assert!(db.list_feeds().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_url() {
        let db = test_db().await;
        db.add_feed("Foo", None).await.unwrap();
        db.update_feed_url("foo", "https://new.example/rss").await.unwrap();

        let feed = db.get_feed("Foo").await.unwrap().unwrap();
        assert_eq!(feed.url.as_deref(), Some("https://new.example/rss"));
    }

    #[tokio::test]
    async fn test_update_unknown_feed() {
        let db = test_db().await;
        let err = db.update_feed_url("Ghost", "https://x").await.unwrap_err();
        assert_eq!(err.downcast_ref::<RegistryError>(), Some(&RegistryError::NotFound));
    }

    #[tokio::test]
    async fn test_delete_removes_feed_and_watermark() {
        let db = test_db().await;
        db.add_feed("Foo", Some("https://a.example")).await.unwrap();
        db.set_watermark("Foo", "42").await.unwrap();

        db.delete_feed("FOO").await.unwrap();

        assert!(db.get_feed("Foo").await.unwrap().is_none());
        assert_eq!(db.get_watermark("Foo").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_unknown_feed() {
        let db = test_db().await;
        let err = db.delete_feed("Ghost").await.unwrap_err();
        assert_eq!(err.downcast_ref::<RegistryError>(), Some(&RegistryError::NotFound));
    }

    #[tokio::test]
    async fn test_readd_after_delete_starts_fresh() {
        let db = test_db().await;
        db.add_feed("Foo", Some("https://a.example")).await.unwrap();
        db.set_watermark("Foo", "old").await.unwrap();
        db.delete_feed("Foo").await.unwrap();

        db.add_feed("Foo", Some("https://a.example")).await.unwrap();
        assert_eq!(db.get_watermark("Foo").await.unwrap(), None);
    }
}
