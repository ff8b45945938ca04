//! Entry operations on a single generation.

use super::connection::CacheDb;
use crate::Error;
use crate::http::{Request, RequestIdentity, ResponseSnapshot};
use crate::network::Fetch;
use bytes::Bytes;
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension, Row};
use url::Url;

/// Handle to one opened generation.
#[derive(Clone, Debug)]
pub struct CacheHandle {
    db: CacheDb,
    name: String,
}

/// Row columns as stored, before header decoding.
pub(crate) struct RawEntry {
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl RawEntry {
    pub(crate) fn into_snapshot(self) -> Result<ResponseSnapshot, Error> {
        let headers: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        Ok(ResponseSnapshot { status: self.status, status_text: self.status_text, headers, body: Bytes::from(self.body) })
    }
}

/// Read `status, status_text, headers_json, body` starting at column `offset`.
pub(crate) fn read_entry(row: &Row<'_>, offset: usize) -> rusqlite::Result<RawEntry> {
    Ok(RawEntry {
        status: row.get(offset)?,
        status_text: row.get(offset + 1)?,
        headers_json: row.get(offset + 2)?,
        body: row.get(offset + 3)?,
    })
}

/// A fully-prepared row, ready to insert.
struct NewEntry {
    key_hash: String,
    identity: RequestIdentity,
    status: u16,
    status_text: String,
    headers_json: String,
    body: Vec<u8>,
}

impl NewEntry {
    fn build(request: &Request, response: &ResponseSnapshot) -> Result<Self, Error> {
        let identity = request.identity();
        if !request.is_get() {
            return Err(Error::NotCacheable(format!("{identity}: only GET requests are stored")));
        }
        if !response.is_success() {
            return Err(Error::NotCacheable(format!("{identity}: status {}", response.status)));
        }

        Ok(Self {
            key_hash: identity.cache_key(),
            status: response.status,
            status_text: response.status_text.clone(),
            headers_json: serde_json::to_string(&response.headers)?,
            body: response.body.to_vec(),
            identity,
        })
    }
}

fn insert_entry(conn: &rusqlite::Connection, generation: &str, entry: &NewEntry, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
        params![generation, now],
    )?;
    conn.execute(
        "INSERT INTO entries (
            generation, key_hash, method, url, status, status_text, headers_json, body, stored_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(generation, key_hash) DO UPDATE SET
            status = excluded.status,
            status_text = excluded.status_text,
            headers_json = excluded.headers_json,
            body = excluded.body,
            stored_at = excluded.stored_at",
        params![
            generation,
            &entry.key_hash,
            &entry.identity.method,
            &entry.identity.url,
            entry.status,
            &entry.status_text,
            &entry.headers_json,
            &entry.body,
            now,
        ],
    )?;
    Ok(())
}

impl CacheHandle {
    pub(crate) fn new(db: CacheDb, name: &str) -> Self {
        Self { db, name: name.to_string() }
    }

    /// Name of the generation this handle points at.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a stored response in this generation only.
    pub async fn get(&self, identity: &RequestIdentity) -> Result<Option<ResponseSnapshot>, Error> {
        let generation = self.name.clone();
        let key_hash = identity.cache_key();
        self.db
            .reader
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let raw = conn
                    .query_row(
                        "SELECT status, status_text, headers_json, body
                        FROM entries WHERE generation = ?1 AND key_hash = ?2",
                        params![generation, key_hash],
                        |row| read_entry(row, 0),
                    )
                    .optional()?;
                raw.map(RawEntry::into_snapshot).transpose()
            })
            .await
            .map_err(Error::from)
    }

    /// Store `response` under the identity of `request`.
    ///
    /// Upserts (last write wins). The generation is recreated if it was
    /// deleted after this handle was opened.
    ///
    /// # Errors
    ///
    /// `Error::NotCacheable` for non-GET requests and non-2xx responses.
    pub async fn put(&self, request: &Request, response: &ResponseSnapshot) -> Result<(), Error> {
        let entry = NewEntry::build(request, response)?;
        let generation = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                insert_entry(conn, &generation, &entry, &now)?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Fetch every URL and store all responses, or store nothing.
    ///
    /// All fetches complete before anything is written; the writes then
    /// commit in one transaction.
    ///
    /// # Errors
    ///
    /// `Error::PrecacheFailed` naming the first URL that failed to fetch or
    /// answered with a non-2xx status.
    pub async fn add_all(&self, urls: &[Url], network: &dyn Fetch) -> Result<(), Error> {
        let mut entries = Vec::with_capacity(urls.len());
        for url in urls {
            let request = Request::get(url.clone());
            let response = network
                .fetch(&request)
                .await
                .map_err(|e| Error::PrecacheFailed { url: url.to_string(), reason: e.to_string() })?;
            if !response.is_success() {
                return Err(Error::PrecacheFailed { url: url.to_string(), reason: format!("status {}", response.status) });
            }
            entries.push(NewEntry::build(&request, &response)?);
        }

        let generation = self.name.clone();
        let now = chrono::Utc::now().to_rfc3339();
        let count = entries.len();
        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &entries {
                    insert_entry(&tx, &generation, entry, &now)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)?;

        tracing::debug!(generation = %self.name, count, "stored precache entries");
        Ok(())
    }

    /// Identities stored in this generation, in insertion order.
    pub async fn keys(&self) -> Result<Vec<RequestIdentity>, Error> {
        let generation = self.name.clone();
        self.db
            .reader
            .call(move |conn| -> Result<Vec<RequestIdentity>, Error> {
                let mut stmt = conn.prepare("SELECT method, url FROM entries WHERE generation = ?1 ORDER BY rowid")?;
                let keys = stmt
                    .query_map(params![generation], |row| Ok(RequestIdentity { method: row.get(0)?, url: row.get(1)? }))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    /// Remove one entry. Returns false if it was not stored.
    pub async fn delete(&self, identity: &RequestIdentity) -> Result<bool, Error> {
        let generation = self.name.clone();
        let key_hash = identity.cache_key();
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE generation = ?1 AND key_hash = ?2",
                    params![generation, key_hash],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}
