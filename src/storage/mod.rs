use crate::error::{SourceError, SourceResult};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

/// One row of the lyric store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredLyrics {
    pub track_key: String,
    pub location: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    pub lrc_content: String,
    pub synced: bool,
    pub saved_at: i64,
}

pub struct Storage {
    conn: Connection,
}

impl Storage {
    pub fn open(path: &Path) -> SourceResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SourceError::io(e, parent))?;
        }

        let conn = Connection::open(path)?;
        let s = Self { conn };
        s.init_schema()?;
        Ok(s)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> SourceResult<Self> {
        let s = Self {
            conn: Connection::open_in_memory()?,
        };
        s.init_schema()?;
        Ok(s)
    }

    fn init_schema(&self) -> SourceResult<()> {
        self.conn.execute_batch(
            r#"
CREATE TABLE IF NOT EXISTS lyrics (
  track_key TEXT PRIMARY KEY,
  location TEXT NOT NULL,
  artist TEXT NOT NULL,
  album TEXT NOT NULL,
  title TEXT NOT NULL,
  lrc_content TEXT NOT NULL,
  synced INTEGER DEFAULT 0,
  saved_at INTEGER NOT NULL
);
"#,
        )?;
        Ok(())
    }

    pub fn get_lyrics(&self, track_key: &str) -> SourceResult<Option<StoredLyrics>> {
        let mut stmt = self.conn.prepare(
            r#"
SELECT track_key, location, artist, album, title, lrc_content, synced, saved_at
FROM lyrics WHERE track_key=?1
"#,
        )?;
        let row = stmt
            .query_row(params![track_key], |row| {
                let synced: i32 = row.get(6)?;
                Ok(StoredLyrics {
                    track_key: row.get(0)?,
                    location: row.get(1)?,
                    artist: row.get(2)?,
                    album: row.get(3)?,
                    title: row.get(4)?,
                    lrc_content: row.get(5)?,
                    synced: synced != 0,
                    saved_at: row.get(7)?,
                })
            })
            .optional()?;
        Ok(row)
    }

    /// Store lyrics. Returns false without writing when a row exists and
    /// `allow_overwrite` is false.
    pub fn put_lyrics(&self, entry: &StoredLyrics, allow_overwrite: bool) -> SourceResult<bool> {
        let sql = if allow_overwrite {
            r#"
INSERT INTO lyrics(track_key, location, artist, album, title, lrc_content, synced, saved_at)
VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(track_key) DO UPDATE SET
  location=excluded.location,
  artist=excluded.artist,
  album=excluded.album,
  title=excluded.title,
  lrc_content=excluded.lrc_content,
  synced=excluded.synced,
  saved_at=excluded.saved_at
"#
        } else {
            r#"
INSERT INTO lyrics(track_key, location, artist, album, title, lrc_content, synced, saved_at)
VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
ON CONFLICT(track_key) DO NOTHING
"#
        };
        let changed = self.conn.execute(
            sql,
            params![
                entry.track_key,
                entry.location,
                entry.artist,
                entry.album,
                entry.title,
                entry.lrc_content,
                entry.synced as i32,
                entry.saved_at
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn delete_lyrics(&self, track_key: &str) -> SourceResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM lyrics WHERE track_key=?1", params![track_key])?;
        Ok(changed > 0)
    }
}
