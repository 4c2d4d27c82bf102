//! `SQLite` storage for captured locations.
//!
//! Two tables share one database:
//!
//! - `location_store`: every accepted fix, retained for the configured
//!   number of days and paged through with anchors
//! - `upload_queue`: fixes waiting to be uploaded to a remote server
//!
//! Anchors are the decimal record id of the last location a caller has
//! seen. Retrieval walks the store in ascending id order, so a page always
//! starts strictly after its anchor.

// SQLite operations need to hold the lock for the duration of the operation.
// Dropping the guard earlier would require restructuring all methods.
#![allow(clippy::significant_drop_tightening)]

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, Row};

use crate::capture::{CaptureError, Result};
use crate::location::{Anchor, CapturedLocation, RetrieveResult};

/// Schema version stored in `PRAGMA user_version`.
///
/// A database carrying any other version has its tables dropped and
/// recreated.
const SCHEMA_VERSION: i32 = 1;

/// Anchor for "before the first record".
const ORIGIN_ANCHOR: i64 = 0;

/// `SQLite`-based storage for the location store and upload queue.
///
/// Thread-safe wrapper around a `SQLite` connection.
pub struct CaptureStorage {
    conn: Mutex<Connection>,
}

impl CaptureStorage {
    /// Opens (or creates) the database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be created or initialized.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    /// Creates an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.initialize_schema()?;
        Ok(storage)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CaptureError::Storage(format!("Failed to acquire database lock: {e}")))
    }

    /// Creates the tables, rebuilding them if the stored schema version differs.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if version != SCHEMA_VERSION {
            if version != 0 {
                log::info!(
                    "Location database schema {version} differs from {SCHEMA_VERSION}, rebuilding"
                );
            }
            conn.execute_batch(
                r"
                DROP TABLE IF EXISTS location_store;
                DROP TABLE IF EXISTS upload_queue;
                ",
            )?;
        }

        conn.execute_batch(
            r"
            -- Every accepted fix, paged by id
            CREATE TABLE IF NOT EXISTS location_store (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                accuracy REAL NOT NULL,
                heading REAL NOT NULL DEFAULT -1,
                speed REAL NOT NULL DEFAULT -1
            );

            CREATE INDEX IF NOT EXISTS location_store_index
                ON location_store(timestamp);

            -- Fixes waiting for upload
            CREATE TABLE IF NOT EXISTS upload_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp INTEGER NOT NULL,
                latitude REAL NOT NULL,
                longitude REAL NOT NULL,
                accuracy REAL NOT NULL,
                heading REAL NOT NULL DEFAULT -1,
                speed REAL NOT NULL DEFAULT -1
            );

            CREATE INDEX IF NOT EXISTS upload_queue_index
                ON upload_queue(timestamp);
            ",
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(())
    }

    // ==================== Location Store ====================

    /// Appends a location to the store and returns its record id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn add_location(&self, location: &CapturedLocation) -> Result<i64> {
        let conn = self.lock()?;
        insert_into(&conn, "location_store", location)
    }

    /// Appends several locations in one transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is stored in
    /// that case.
    pub fn add_locations(&self, locations: &[CapturedLocation]) -> Result<Vec<i64>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let ids = locations
            .iter()
            .map(|location| insert_into(&tx, "location_store", location))
            .collect::<Result<Vec<_>>>()?;
        tx.commit()?;
        Ok(ids)
    }

    /// Deletes stored locations with a timestamp older than `cutoff`.
    ///
    /// Returns the number of locations removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_locations_before(&self, cutoff: i64) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM location_store WHERE timestamp < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }

    /// Retrieves up to `limit` locations recorded after `anchor`.
    ///
    /// A `None` anchor starts from the oldest retained location; a `None`
    /// limit returns everything remaining. When nothing is returned the next
    /// anchor is the starting point of this call (the origin when no anchor
    /// was given), so the following page begins where this one would have.
    ///
    /// # Errors
    ///
    /// Returns [`CaptureError::InvalidAnchor`] if the anchor was not produced
    /// by this store, or an error if the database operation fails.
    pub fn retrieve(&self, anchor: Option<&Anchor>, limit: Option<u32>) -> Result<RetrieveResult> {
        let after = anchor.map_or(Ok(ORIGIN_ANCHOR), parse_anchor)?;
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, i64::from);

        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, latitude, longitude, accuracy, heading, speed
            FROM location_store
            WHERE id > ?1
            ORDER BY id ASC
            LIMIT ?2
            ",
        )?;

        let locations = stmt
            .query_map(params![after, limit], location_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let next = locations.last().and_then(|l| l.id).unwrap_or(after);

        Ok(RetrieveResult {
            locations,
            next_anchor: Anchor::new(next.to_string()),
        })
    }

    /// Returns the anchor for the newest stored location.
    ///
    /// Retrieving from this anchor returns only locations added afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest_anchor(&self) -> Result<Anchor> {
        let conn = self.lock()?;
        let id = max_id(&conn, "location_store")?;
        Ok(Anchor::new(id.to_string()))
    }

    /// Returns the number of stored locations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn location_count(&self) -> Result<usize> {
        let conn = self.lock()?;
        count_rows(&conn, "location_store")
    }

    // ==================== Upload Queue ====================

    /// Adds a location to the upload queue.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn enqueue_upload(&self, location: &CapturedLocation) -> Result<()> {
        let conn = self.lock()?;
        insert_into(&conn, "upload_queue", location)?;
        Ok(())
    }

    /// Returns every queued location, oldest first, without removing it.
    ///
    /// Each location carries its queue id; pass those ids to
    /// [`remove_uploads`](Self::remove_uploads) once the upload succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn queued_uploads(&self) -> Result<Vec<CapturedLocation>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r"
            SELECT id, timestamp, latitude, longitude, accuracy, heading, speed
            FROM upload_queue
            ORDER BY timestamp ASC, id ASC
            ",
        )?;
        let locations = stmt
            .query_map([], location_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(locations)
    }

    /// Removes the queued locations with the given queue ids.
    ///
    /// Returns the number of locations removed. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails; nothing is removed
    /// in that case.
    pub fn remove_uploads(&self, ids: &[i64]) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM upload_queue WHERE id = ?1")?;
            for id in ids {
                removed += stmt.execute(params![id])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Returns the number of queued locations.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn upload_queue_len(&self) -> Result<usize> {
        let conn = self.lock()?;
        count_rows(&conn, "upload_queue")
    }
}

fn insert_into(conn: &Connection, table: &str, location: &CapturedLocation) -> Result<i64> {
    conn.execute(
        &format!(
            "INSERT INTO {table} (timestamp, latitude, longitude, accuracy, heading, speed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            location.timestamp,
            location.latitude,
            location.longitude,
            location.accuracy,
            location.heading,
            location.speed,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<CapturedLocation> {
    Ok(CapturedLocation {
        id: Some(row.get(0)?),
        timestamp: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        accuracy: row.get(4)?,
        heading: row.get(5)?,
        speed: row.get(6)?,
    })
}

fn max_id(conn: &Connection, table: &str) -> Result<i64> {
    let id: Option<i64> =
        conn.query_row(&format!("SELECT MAX(id) FROM {table}"), [], |row| row.get(0))?;
    Ok(id.unwrap_or(ORIGIN_ANCHOR))
}

fn count_rows(conn: &Connection, table: &str) -> Result<usize> {
    let count: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    usize::try_from(count).map_err(|_| CaptureError::Storage(format!("Invalid row count {count}")))
}

fn parse_anchor(anchor: &Anchor) -> Result<i64> {
    anchor
        .as_str()
        .parse::<i64>()
        .ok()
        .filter(|id| *id >= ORIGIN_ANCHOR)
        .ok_or_else(|| CaptureError::InvalidAnchor(anchor.to_string()))
}
