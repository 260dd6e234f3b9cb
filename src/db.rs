use rusqlite::{params, Connection};
use tracing::warn;

use crate::error::MarkpipeResult;

/// A persisted interval `[start, end]` tagged with an event category.
/// Positions are frame indices; `end` may point past the end of the stream,
/// playback clamps there on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Clip {
    pub event: i64,
    pub start: i64,
    pub end: i64,
}

// ClipStore struct to encapsulate clip persistence
pub struct ClipStore {
    conn: Connection,
}

impl ClipStore {
    // Open (or create) a store at the given path
    pub fn open(path: &str) -> MarkpipeResult<ClipStore> {
        let conn = Connection::open(path)?;
        let store = ClipStore { conn };
        store.create_tables()?;
        let existing = store.count()?;
        if existing > 0 {
            // the store is shared across videos, replay can't tell them apart
            warn!(
                "store at {} already holds {} clips from earlier sessions",
                path, existing
            );
        }
        Ok(store)
    }

    pub fn open_in_memory() -> MarkpipeResult<ClipStore> {
        let conn = Connection::open_in_memory()?;
        let store = ClipStore { conn };
        store.create_tables()?;
        Ok(store)
    }

    fn create_tables(&self) -> MarkpipeResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS clips (
                event INTEGER,
                start INTEGER,
                end INTEGER
            )",
            [],
        )?;
        Ok(())
    }

    // Method to drop and recreate the clips table. Destructive, opt-in only.
    pub fn clobber(&mut self) -> MarkpipeResult<()> {
        self.conn.execute("DROP TABLE IF EXISTS clips", [])?;
        self.create_tables()?;
        Ok(())
    }

    /// Append one clip. The row is committed before this returns.
    /// Callers clamp `start` to zero beforehand; the store does not interpret
    /// `event` beyond storing it.
    pub fn save(&self, event: i64, start: i64, end: i64) -> MarkpipeResult<()> {
        debug_assert!(start >= 0);
        debug_assert!(end >= start);
        self.conn.execute(
            "INSERT INTO clips (event, start, end) VALUES (?1, ?2, ?3)",
            params![event, start, end],
        )?;
        Ok(())
    }

    /// Every clip of one category, ordered by start position.
    pub fn load(&self, event: i64) -> MarkpipeResult<Vec<Clip>> {
        let mut stmt = self
            .conn
            .prepare("SELECT event, start, end FROM clips WHERE event = ?1 ORDER BY start")?;
        let rows = stmt.query_map(params![event], |row| {
            Ok(Clip {
                event: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Every clip in the store, for the diagnostics dump.
    pub fn load_all(&self) -> MarkpipeResult<Vec<Clip>> {
        let mut stmt = self
            .conn
            .prepare("SELECT event, start, end FROM clips ORDER BY event, start")?;
        let rows = stmt.query_map([], |row| {
            Ok(Clip {
                event: row.get(0)?,
                start: row.get(1)?,
                end: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn count(&self) -> MarkpipeResult<i64> {
        Ok(self
            .conn
            .query_row("SELECT COUNT(*) FROM clips", [], |row| row.get(0))?)
    }
}
