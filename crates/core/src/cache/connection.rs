//! Database connection management.
//!
//! Opens the SQLite database backing every cache generation, applies pragmas
//! and runs migrations. Writes and lookups go through separate connections,
//! each with its own background thread, so a slow write-through never queues
//! in front of a cache hit. `foreign_keys` must be on for generation deletes to
//! cascade to their entries.

use super::migrations;
use crate::Error;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_rusqlite::Connection;
use tokio_rusqlite::rusqlite::OpenFlags;

const PRAGMAS: &str = "PRAGMA journal_mode=WAL;
     PRAGMA synchronous=NORMAL;
     PRAGMA temp_store=MEMORY;
     PRAGMA foreign_keys=ON;";

/// The lookup connection never writes. `read_uncommitted` only matters for
/// shared-cache in-memory databases, where it stops table locks held by the
/// writer from blocking reads.
const READER_PRAGMAS: &str = "PRAGMA query_only=ON;
     PRAGMA read_uncommitted=ON;";

/// Handle to the cache storage database.
///
/// Cheap to clone; all clones share the same writer and reader connections.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
    pub(crate) reader: Connection,
}

impl CacheDb {
    /// Open (or create) the database at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn.clone()).await?;

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let reader = Connection::open_with_flags(path, flags)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::finish(conn, reader).await
    }

    /// Open a private in-memory database, mainly for tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        static NEXT: AtomicU64 = AtomicU64::new(0);
        let uri = format!("file:vokabel-cache-{}?mode=memory&cache=shared", NEXT.fetch_add(1, Ordering::Relaxed));
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&uri, flags | OpenFlags::SQLITE_OPEN_CREATE)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::init(conn.clone()).await?;

        let reader = Connection::open_with_flags(&uri, flags)
            .await
            .map_err(|e| Error::Database(e.into()))?;
        Self::finish(conn, reader).await
    }

    /// Close both connections. Every clone of this handle fails afterwards.
    pub async fn close(self) -> Result<(), Error> {
        let writer = self.conn.close().await.map_err(Error::from);
        let reader = self.reader.close().await.map_err(Error::from);
        writer.and(reader)
    }

    async fn init(conn: Connection) -> Result<(), Error> {
        conn.call(|conn| {
            conn.execute_batch(PRAGMAS)?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await
    }

    async fn finish(conn: Connection, reader: Connection) -> Result<Self, Error> {
        reader
            .call(|conn| {
                conn.execute_batch(READER_PRAGMAS)?;
                Ok(())
            })
            .await
            .map_err(Error::Database)?;

        Ok(Self { conn, reader })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Request;
    use std::sync::mpsc;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn test_open_in_memory() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let fk: i64 = db
            .conn
            .call(|conn| conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn test_in_memory_databases_are_private() {
        let a = CacheDb::open_in_memory().await.unwrap();
        let b = CacheDb::open_in_memory().await.unwrap();
        a.open_cache("lmg-vocab-v1").await.unwrap();
        assert!(b.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reader_sees_committed_writes() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get("https://vokabeln.example.org/index.html".parse().unwrap());
        let cache = db.open_cache("lmg-vocab-v1").await.unwrap();
        cache.put(&request, &crate::ResponseSnapshot::new(200, "shell")).await.unwrap();

        let found = db.match_request(&request.identity(), &[]).await.unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_slow_write_does_not_delay_lookup() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let request = Request::get("https://vokabeln.example.org/index.html".parse().unwrap());
        db.open_cache("lmg-vocab-v1")
            .await
            .unwrap()
            .put(&request, &crate::ResponseSnapshot::new(200, "shell"))
            .await
            .unwrap();

        let (started_tx, started_rx) = mpsc::channel();
        let writer = db.clone();
        let slow = tokio::spawn(async move {
            writer
                .conn
                .call(move |_conn| -> Result<(), Error> {
                    let _ = started_tx.send(());
                    std::thread::sleep(Duration::from_millis(800));
                    Ok(())
                })
                .await
        });
        while started_rx.try_recv().is_err() {
            tokio::task::yield_now().await;
        }

        let begin = Instant::now();
        let found = db.match_request(&request.identity(), &[]).await.unwrap();
        assert!(found.is_some());
        assert!(begin.elapsed() < Duration::from_millis(400), "lookup waited on the writer");

        slow.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_closed_handle_errors() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let other = db.clone();
        db.close().await.unwrap();
        assert!(other.cache_names().await.is_err());
        assert!(other.match_request(&Request::get("https://a.example/".parse().unwrap()).identity(), &[]).await.is_err());
    }
}
