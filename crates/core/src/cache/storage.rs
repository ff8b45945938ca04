//! Generation-level operations: open, enumerate, delete, and cross-generation lookup.
//!
//! A generation is one named cache (e.g. `lmg-vocab-v1`). Deleting a
//! generation removes all of its entries through the foreign-key cascade.

use super::connection::CacheDb;
use super::entries::{CacheHandle, read_entry};
use crate::Error;
use crate::http::{RequestIdentity, ResponseSnapshot};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::OptionalExtension;

impl CacheDb {
    /// Open the generation called `name`, creating it if it does not exist.
    pub async fn open_cache(&self, name: &str) -> Result<CacheHandle, Error> {
        let owned = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![owned, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        Ok(CacheHandle::new(self.clone(), name))
    }

    /// Whether a generation called `name` exists.
    pub async fn has_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM generations WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every existing generation, oldest first.
    pub async fn cache_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the generation called `name` and all of its entries.
    ///
    /// Returns false if no such generation existed.
    pub async fn delete_cache(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Look up `identity` across every generation.
    ///
    /// Generations listed in `precedence` are searched first, in that order;
    /// any remaining generation is searched newest first.
    pub async fn match_request(
        &self, identity: &RequestIdentity, precedence: &[&str],
    ) -> Result<Option<ResponseSnapshot>, Error> {
        let key_hash = identity.cache_key();
        let mut candidates = self
            .reader
            .call(move |conn| -> Result<Vec<(String, String, ResponseSnapshot)>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT e.generation, g.created_at,
                        e.status, e.status_text, e.headers_json, e.body
                    FROM entries e JOIN generations g ON g.name = e.generation
                    WHERE e.key_hash = ?1",
                )?;
                let rows = stmt
                    .query_map(params![key_hash], |row| {
                        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, read_entry(row, 2)?))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(|(generation, created_at, raw)| Ok::<_, Error>((generation, created_at, raw.into_snapshot()?)))
                    .collect()
            })
            .await
            .map_err(Error::from)?;

        candidates.sort_by(|(a_name, a_created, _), (b_name, b_created, _)| {
            let rank = |name: &str| precedence.iter().position(|p| *p == name).unwrap_or(precedence.len());
            rank(a_name.as_str())
                .cmp(&rank(b_name.as_str()))
                .then_with(|| b_created.cmp(a_created))
                .then_with(|| a_name.cmp(b_name))
        });

        Ok(candidates.into_iter().next().map(|(_, _, snapshot)| snapshot))
    }

    /// Created-at timestamp of a generation, if it exists.
    pub async fn cache_created_at(&self, name: &str) -> Result<Option<String>, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<Option<String>, Error> {
                let created = conn
                    .query_row("SELECT created_at FROM generations WHERE name = ?1", params![name], |row| {
                        row.get(0)
                    })
                    .optional()?;
                Ok(created)
            })
            .await
            .map_err(Error::from)
    }

    /// Number of entries stored in a generation. Never creates the generation.
    pub async fn count_entries(&self, name: &str) -> Result<usize, Error> {
        let name = name.to_string();
        self.reader
            .call(move |conn| -> Result<usize, Error> {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM entries WHERE generation = ?1",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(usize::try_from(count).unwrap_or_default())
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use url::Url;

    fn vocab_request() -> Request {
        Request::get(Url::parse("https://example.com/vocab/english/voc3_4.json").unwrap())
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_cache("lmg-vocab-v1").await.unwrap();
        db.open_cache("lmg-vocab-v1").await.unwrap();
        assert_eq!(db.cache_names().await.unwrap(), vec!["lmg-vocab-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_count_entries_does_not_create_generation() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_cache("lmg-vocab-runtime").await.unwrap();
        cache.put(&vocab_request(), &ResponseSnapshot::new(200, "[]")).await.unwrap();
        assert_eq!(db.count_entries("lmg-vocab-runtime").await.unwrap(), 1);

        db.delete_cache("lmg-vocab-runtime").await.unwrap();
        assert_eq!(db.count_entries("lmg-vocab-runtime").await.unwrap(), 0);
        assert!(!db.has_cache("lmg-vocab-runtime").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let cache = db.open_cache("lmg-vocab-runtime").await.unwrap();
        cache
            .put(&vocab_request(), &ResponseSnapshot::new(200, "[]"))
            .await
            .unwrap();

        assert!(db.delete_cache("lmg-vocab-runtime").await.unwrap());
        assert!(!db.delete_cache("lmg-vocab-runtime").await.unwrap());
        assert!(!db.has_cache("lmg-vocab-runtime").await.unwrap());

        let found = db.match_request(&vocab_request().identity(), &[]).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_match_prefers_precedence_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let shell = db.open_cache("shell").await.unwrap();
        let runtime = db.open_cache("runtime").await.unwrap();
        let request = vocab_request();

        shell.put(&request, &ResponseSnapshot::new(200, "shell")).await.unwrap();
        runtime.put(&request, &ResponseSnapshot::new(200, "runtime")).await.unwrap();

        let hit = db
            .match_request(&request.identity(), &["runtime", "shell"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&hit.body[..], b"runtime");

        let hit = db
            .match_request(&request.identity(), &["shell", "runtime"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&hit.body[..], b"shell");
    }

    #[tokio::test]
    async fn test_match_searches_prior_generations() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open_cache("lmg-vocab-v0").await.unwrap();
        let request = vocab_request();
        old.put(&request, &ResponseSnapshot::new(200, "old")).await.unwrap();

        let hit = db
            .match_request(&request.identity(), &["lmg-vocab-runtime", "lmg-vocab-v1"])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&hit.body[..], b"old");
    }

    #[tokio::test]
    async fn test_created_at() {
        let db = CacheDb::open_in_memory().await.unwrap();
        assert!(db.cache_created_at("missing").await.unwrap().is_none());
        db.open_cache("present").await.unwrap();
        assert!(db.cache_created_at("present").await.unwrap().is_some());
    }
}
