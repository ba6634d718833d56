use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::model::{ListFilter, Listing, StoreStats, StoredListing};
use crate::store::ListingStore;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS listings (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    company TEXT NOT NULL,
    location TEXT,
    url TEXT NOT NULL,
    description TEXT,
    posted_at TEXT,
    salary_min REAL,
    salary_max REAL,
    first_seen TEXT NOT NULL,
    notified INTEGER NOT NULL DEFAULT 0 CHECK (notified IN (0, 1))
);

CREATE INDEX IF NOT EXISTS idx_listings_notified ON listings(notified);
CREATE INDEX IF NOT EXISTS idx_listings_first_seen ON listings(first_seen);
"#;

const SELECT_COLUMNS: &str = "SELECT id, title, company, location, url, description, posted_at,
        salary_min, salary_max, first_seen, notified FROM listings";

/// Single-file SQLite backend. One writer per run; the connection is not `Sync`,
/// so it lives behind a mutex.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening sqlite db at {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().context("opening in-memory sqlite")?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA).context("creating listings schema")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection mutex poisoned"))
    }

    fn query_listings(&self, sql: &str) -> Result<Vec<StoredListing>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map([], row_to_stored)?;
        rows.collect::<Result<Vec<_>, _>>().context("reading listings")
    }
}

fn ts_to_text(ts: &DateTime<Utc>) -> String {
    // fixed width, so lexical order == time order
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn text_to_ts(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_stored(row: &rusqlite::Row) -> rusqlite::Result<StoredListing> {
    let posted_at: Option<String> = row.get(6)?;
    let first_seen: String = row.get(9)?;
    let notified: i64 = row.get(10)?;
    Ok(StoredListing {
        listing: Listing {
            id: row.get(0)?,
            title: row.get(1)?,
            company: row.get(2)?,
            location: row.get(3)?,
            url: row.get(4)?,
            description: row.get(5)?,
            posted_at: posted_at.as_deref().map(|s| text_to_ts(6, s)).transpose()?,
            salary_min: row.get(7)?,
            salary_max: row.get(8)?,
        },
        first_seen: text_to_ts(9, &first_seen)?,
        notified: notified != 0,
    })
}

#[async_trait::async_trait]
impl ListingStore for SqliteStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let hit: Option<i64> = conn
            .query_row("SELECT 1 FROM listings WHERE id = ?1", [id], |row| row.get(0))
            .optional()
            .with_context(|| format!("exists({id})"))?;
        Ok(hit.is_some())
    }

    async fn insert_new(&self, listing: &Listing) -> Result<bool> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "INSERT OR IGNORE INTO listings
                 (id, title, company, location, url, description, posted_at,
                  salary_min, salary_max, first_seen, notified)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0)",
                params![
                    listing.id,
                    listing.title,
                    listing.company,
                    listing.location,
                    listing.url,
                    listing.description,
                    listing.posted_at.as_ref().map(ts_to_text),
                    listing.salary_min,
                    listing.salary_max,
                    ts_to_text(&Utc::now()),
                ],
            )
            .with_context(|| format!("insert_new({})", listing.id))?;
        Ok(changed == 1)
    }

    async fn mark_notified(&self, id: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute("UPDATE listings SET notified = 1 WHERE id = ?1", [id])
            .with_context(|| format!("mark_notified({id})"))?;
        Ok(())
    }

    async fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn()?;
        let (total, notified): (i64, i64) = conn
            .query_row(
                "SELECT COUNT(*), COALESCE(SUM(notified), 0) FROM listings",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .context("stats")?;
        Ok(StoreStats::from_counts(total.max(0) as u64, notified.max(0) as u64))
    }

    async fn all_unnotified(&self) -> Result<Vec<StoredListing>> {
        self.query_listings(&format!(
            "{SELECT_COLUMNS} WHERE notified = 0 ORDER BY first_seen ASC, rowid ASC"
        ))
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<StoredListing>> {
        let clause = match filter {
            ListFilter::All => "",
            ListFilter::Notified => " WHERE notified = 1",
            ListFilter::Unnotified => " WHERE notified = 0",
        };
        self.query_listings(&format!(
            "{SELECT_COLUMNS}{clause} ORDER BY first_seen DESC, rowid DESC"
        ))
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(id: &str) -> Listing {
        Listing {
            id: id.to_string(),
            title: format!("Engineer {id}"),
            company: "Acme".into(),
            location: Some("Remote".into()),
            url: format!("https://example.test/{id}"),
            description: None,
            posted_at: Some(Utc::now()),
            salary_min: Some(90_000.0),
            salary_max: Some(50_000.0),
        }
    }

    #[tokio::test]
    async fn row_round_trips_all_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let l = listing("R1");
        assert!(store.insert_new(&l).await.unwrap());

        let rows = store.list(ListFilter::All).await.unwrap();
        assert_eq!(rows.len(), 1);
        let got = &rows[0].listing;
        assert_eq!(got.id, l.id);
        assert_eq!(got.location, l.location);
        // inverted bounds stay inverted
        assert_eq!(got.salary_min, Some(90_000.0));
        assert_eq!(got.salary_max, Some(50_000.0));
        assert_eq!(
            got.posted_at.map(|t| t.timestamp_micros()),
            l.posted_at.map(|t| t.timestamp_micros())
        );
        assert!(!rows[0].notified);
    }

    #[tokio::test]
    async fn open_creates_parent_dirs_and_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert_new(&listing("P1")).await.unwrap();
            store.mark_notified("P1").await.unwrap();
        }
        let reopened = SqliteStore::open(&path).unwrap();
        assert!(reopened.exists("P1").await.unwrap());
        let stats = reopened.stats().await.unwrap();
        assert_eq!(stats, StoreStats::from_counts(1, 1));
    }

    #[test]
    fn timestamps_are_fixed_width() {
        let parse = |s: &str| DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc);
        let a = ts_to_text(&parse("2025-01-01T00:00:00Z"));
        let b = ts_to_text(&parse("2025-01-01T00:00:00.5Z"));
        assert_eq!(a.len(), b.len());
        assert!(a < b);
    }
}
