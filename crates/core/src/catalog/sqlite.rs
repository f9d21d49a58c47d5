//! SQLite-backed listing catalog implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{CatalogEntry, CatalogError, ListingCatalog};
use crate::listing::ListingRow;

/// SQLite-backed listing catalog.
pub struct SqliteCatalog {
    conn: Mutex<Connection>,
}

impl SqliteCatalog {
    /// Create a new SQLite catalog, creating the database file and table if needed.
    pub fn new(path: &Path) -> Result<Self, CatalogError> {
        let conn = Connection::open(path).map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite catalog (useful for testing).
    pub fn in_memory() -> Result<Self, CatalogError> {
        let conn =
            Connection::open_in_memory().map_err(|e| CatalogError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), CatalogError> {
        conn.execute_batch(
            r#"
            -- One row per content hash, refreshed on every sighting
            CREATE TABLE IF NOT EXISTS listing_catalog (
                content_hash TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                date TEXT NOT NULL,
                page_url TEXT NOT NULL,
                download_url TEXT,
                content_pointer TEXT,
                size TEXT NOT NULL,
                seeders INTEGER NOT NULL DEFAULT 0,
                leechers INTEGER NOT NULL DEFAULT 0,
                first_seen_at TEXT NOT NULL,
                last_seen_at TEXT NOT NULL,
                seen_count INTEGER NOT NULL DEFAULT 1
            );

            CREATE INDEX IF NOT EXISTS idx_listing_catalog_last_seen ON listing_catalog(last_seen_at);
            "#,
        )
        .map_err(|e| CatalogError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, CatalogError> {
        self.conn
            .lock()
            .map_err(|_| CatalogError::Database("catalog connection poisoned".to_string()))
    }

    fn parse_timestamp(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now())
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogEntry> {
        let first_seen: String = row.get(8)?;
        let last_seen: String = row.get(9)?;

        let listing = ListingRow::new(row.get::<_, String>(0)?, row.get::<_, String>(2)?)
            .with_date(row.get::<_, String>(1)?)
            .with_download_url(row.get(3)?)
            .with_pointer(row.get(4)?)
            .with_size(row.get::<_, String>(5)?)
            .with_peers(row.get(6)?, row.get(7)?);

        Ok(CatalogEntry {
            row: listing,
            first_seen_at: Self::parse_timestamp(&first_seen),
            last_seen_at: Self::parse_timestamp(&last_seen),
            seen_count: row.get(10)?,
        })
    }
}

impl ListingCatalog for SqliteCatalog {
    fn store(&self, rows: &[ListingRow]) -> Result<u32, CatalogError> {
        let conn = self.conn()?;
        let now_str = Utc::now().to_rfc3339();
        let mut new_count = 0;

        for row in rows {
            if row.content_hash().is_empty() {
                continue;
            }

            let exists: bool = conn
                .query_row(
                    "SELECT 1 FROM listing_catalog WHERE content_hash = ?",
                    params![row.content_hash()],
                    |_| Ok(true),
                )
                .unwrap_or(false);

            conn.execute(
                "INSERT INTO listing_catalog (content_hash, title, date, page_url, download_url,
                        content_pointer, size, seeders, leechers, first_seen_at, last_seen_at, seen_count)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10, 1)
                 ON CONFLICT(content_hash) DO UPDATE SET
                    title = excluded.title,
                    date = excluded.date,
                    page_url = excluded.page_url,
                    download_url = COALESCE(excluded.download_url, download_url),
                    content_pointer = excluded.content_pointer,
                    size = excluded.size,
                    seeders = excluded.seeders,
                    leechers = excluded.leechers,
                    last_seen_at = excluded.last_seen_at,
                    seen_count = seen_count + 1",
                params![
                    row.content_hash(),
                    row.title(),
                    row.date(),
                    row.page_url(),
                    row.download_url(),
                    row.content_pointer(),
                    row.size(),
                    row.seeders(),
                    row.leechers(),
                    &now_str,
                ],
            )
            .map_err(|e| CatalogError::Database(e.to_string()))?;

            if !exists {
                new_count += 1;
            }
        }

        Ok(new_count)
    }

    fn get(&self, content_hash: &str) -> Result<CatalogEntry, CatalogError> {
        let conn = self.conn()?;
        let content_hash = content_hash.to_lowercase();

        conn.query_row(
            "SELECT title, date, page_url, download_url, content_pointer, size, seeders, leechers,
                    first_seen_at, last_seen_at, seen_count
             FROM listing_catalog WHERE content_hash = ?",
            params![&content_hash],
            Self::row_to_entry,
        )
        .map_err(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => CatalogError::NotFound(content_hash.clone()),
            _ => CatalogError::Database(e.to_string()),
        })
    }

    fn count(&self) -> Result<u64, CatalogError> {
        let conn = self.conn()?;
        conn.query_row("SELECT COUNT(*) FROM listing_catalog", [], |row| row.get(0))
            .map_err(|e| CatalogError::Database(e.to_string()))
    }

    fn clear(&self) -> Result<(), CatalogError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM listing_catalog", [])
            .map_err(|e| CatalogError::Database(e.to_string()))?;
        Ok(())
    }
}
