//! `SQLite` photo store: photo blobs and the contacts that reference them

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params, params_from_iter};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::paths;

/// Largest number of ids bound into a single `IN (...)` query
const MAX_IDS_PER_QUERY: usize = 500;

/// Database connection wrapper, shareable with blocking tasks
#[derive(Clone)]
pub struct PhotoStore {
    conn: Arc<Mutex<Connection>>,
}

impl PhotoStore {
    /// Open or create the store at the default location
    pub fn open() -> Result<Self> {
        let path = Self::default_path()?;
        Self::open_path(&path)
    }

    /// Open or create the store at a specific path
    pub fn open_path(path: &PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create data directory")?;
        }

        let conn = Connection::open(path).context("Failed to open photo database")?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory store
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Get the default database path
    pub fn default_path() -> Result<PathBuf> {
        paths::database_path()
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize the database schema
    fn init(&self) -> Result<()> {
        self.lock().execute_batch(
            r"
            -- Photo blobs
            CREATE TABLE IF NOT EXISTS photos (
                id INTEGER PRIMARY KEY,
                data BLOB
            );

            -- Contacts naming a photo id; the photo row may be missing
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                photo_id INTEGER,
                starred INTEGER NOT NULL DEFAULT 0,
                last_time_contacted INTEGER
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_contacts_ranking ON contacts(starred, last_time_contacted);
            ",
        )?;

        Ok(())
    }

    // ==================== Photos ====================

    /// Insert or replace a photo blob
    pub fn insert_photo(&self, id: i64, data: &[u8]) -> Result<()> {
        self.lock().execute(
            "INSERT OR REPLACE INTO photos (id, data) VALUES (?1, ?2)",
            params![id, data],
        )?;
        Ok(())
    }

    /// Delete a photo blob
    pub fn delete_photo(&self, id: i64) -> Result<()> {
        self.lock()
            .execute("DELETE FROM photos WHERE id = ?1", params![id])?;
        Ok(())
    }

    /// Fetch the blobs for a set of photo ids in bulk.
    ///
    /// Ids with no row (or a NULL blob) are simply missing from the result.
    pub fn load_photos(&self, ids: &[i64]) -> rusqlite::Result<Vec<(i64, Vec<u8>)>> {
        let conn = self.lock();
        let mut photos = Vec::with_capacity(ids.len());

        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let placeholders = vec!["?"; chunk.len()].join(",");
            let sql = format!(
                "SELECT id, data FROM photos WHERE id IN ({placeholders}) AND data IS NOT NULL"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, Vec<u8>>(1)?))
            })?;
            for row in rows {
                photos.push(row?);
            }
        }

        Ok(photos)
    }

    // ==================== Contacts ====================

    /// Insert a contact and return its id
    pub fn insert_contact(&self, display_name: &str, photo_id: Option<i64>, starred: bool) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO contacts (display_name, photo_id, starred) VALUES (?1, ?2, ?3)",
            params![display_name, photo_id, i32::from(starred)],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Record that a contact was just contacted
    pub fn mark_contacted(&self, contact_id: i64) -> Result<()> {
        self.lock().execute(
            "UPDATE contacts SET last_time_contacted = ?2 WHERE id = ?1",
            params![contact_id, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    /// Photo ids worth preloading: starred contacts first, then most recently
    /// contacted.
    pub fn preload_candidates(&self, limit: usize) -> rusqlite::Result<Vec<i64>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT photo_id FROM contacts
             WHERE photo_id IS NOT NULL AND photo_id != 0
             ORDER BY starred DESC, last_time_contacted DESC
             LIMIT ?1",
        )?;

        let ids = stmt.query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            row.get::<_, i64>(0)
        })?;
        ids.collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_store_init() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.sqlite");
        let _store = PhotoStore::open_path(&path).unwrap();
        // Reopening keeps the schema
        let _store = PhotoStore::open_path(&path).unwrap();
    }

    #[test]
    fn test_bulk_load_skips_missing() {
        let store = PhotoStore::open_in_memory().unwrap();
        store.insert_photo(1, b"one").unwrap();
        store.insert_photo(3, b"three").unwrap();

        let mut photos = store.load_photos(&[1, 2, 3]).unwrap();
        photos.sort();
        assert_eq!(photos, vec![(1, b"one".to_vec()), (3, b"three".to_vec())]);

        store.delete_photo(3).unwrap();
        assert_eq!(store.load_photos(&[3]).unwrap(), vec![]);
    }

    #[test]
    fn test_bulk_load_many_ids() {
        let store = PhotoStore::open_in_memory().unwrap();
        for id in 1..=1200 {
            store.insert_photo(id, &[1]).unwrap();
        }
        let ids: Vec<i64> = (1..=1300).collect();
        assert_eq!(store.load_photos(&ids).unwrap().len(), 1200);
    }

    #[test]
    fn test_preload_ranking() {
        let store = PhotoStore::open_in_memory().unwrap();
        let plain = store.insert_contact("Plain", Some(10), false).unwrap();
        store.insert_contact("Star", Some(20), true).unwrap();
        let recent = store.insert_contact("Recent", Some(30), false).unwrap();
        store.insert_contact("No photo", None, true).unwrap();
        store.insert_contact("Zero photo", Some(0), true).unwrap();

        store.mark_contacted(plain).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.mark_contacted(recent).unwrap();

        assert_eq!(store.preload_candidates(10).unwrap(), vec![20, 30, 10]);
        assert_eq!(store.preload_candidates(2).unwrap(), vec![20, 30]);
    }

    #[test]
    fn test_contacts_may_name_missing_photos() {
        let store = PhotoStore::open_in_memory().unwrap();
        store.insert_photo(1, b"one").unwrap();
        store.insert_contact("Kept", Some(1), false).unwrap();
        store.insert_contact("Unsynced", Some(2), true).unwrap();

        // Deleting a photo a contact still names is allowed.
        store.delete_photo(1).unwrap();

        assert_eq!(store.preload_candidates(10).unwrap(), vec![2, 1]);
        assert!(store.load_photos(&[1, 2]).unwrap().is_empty());
    }
}
