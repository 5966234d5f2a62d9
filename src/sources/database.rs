//! Lyrics kept in a local SQLite database, keyed by track.

use super::{LocalSource, SourceId, SourceInfo};
use crate::error::{SourceError, SourceResult};
use crate::lyrics::{LyricData, LyricDataRaw};
use crate::storage::{Storage, StoredLyrics};
use crate::track::{Track, TrackInfo};
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

pub const ID: SourceId = SourceId::from_u128(0x9c1e2a44_60d3_4f8b_b7f2_5a0e8d91c3e7);

/// The connection is opened on first use so that merely registering the
/// source does not touch the disk.
#[derive(Clone)]
pub struct LyricDatabase {
    path: PathBuf,
    storage: Arc<OnceCell<Mutex<Storage>>>,
}

impl LyricDatabase {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            storage: Arc::new(OnceCell::new()),
        }
    }

    /// Run `f` against the database on the blocking pool.
    async fn with_storage<T, F>(&self, f: F) -> SourceResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> SourceResult<T> + Send + 'static,
    {
        let cell = Arc::clone(&self.storage);
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || {
            let storage = cell.get_or_try_init(|| Storage::open(&path).map(Mutex::new))?;
            let storage = storage.lock().unwrap_or_else(PoisonError::into_inner);
            f(&storage)
        })
        .await?
    }
}

impl SourceInfo for LyricDatabase {
    fn id(&self) -> SourceId {
        ID
    }

    fn friendly_name(&self) -> &'static str {
        "Lyric database"
    }
}

#[async_trait]
impl LocalSource for LyricDatabase {
    async fn load(
        &self,
        track: &Track,
        _info: &TrackInfo,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        if abort.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        let key = track.key();
        let stored = self.with_storage(move |s| s.get_lyrics(&key)).await?;
        Ok(stored
            .into_iter()
            .map(|row| LyricDataRaw {
                source_id: ID,
                persistent_storage_path: row.track_key,
                artist: row.artist,
                album: row.album,
                title: row.title,
                lookup_id: String::new(),
                text: row.lrc_content,
            })
            .collect())
    }

    async fn save(
        &self,
        track: &Track,
        info: &TrackInfo,
        is_timestamped: bool,
        text: &str,
        allow_overwrite: bool,
        abort: &CancellationToken,
    ) -> SourceResult<Option<String>> {
        if abort.is_cancelled() {
            return Err(SourceError::Cancelled);
        }
        let entry = StoredLyrics {
            track_key: track.key(),
            location: track.location.clone(),
            artist: info.artist().to_string(),
            album: info.album().to_string(),
            title: info.title().to_string(),
            lrc_content: text.to_string(),
            synced: is_timestamped,
            saved_at: time::OffsetDateTime::now_utc().unix_timestamp(),
        };
        let key = entry.track_key.clone();
        let written = self
            .with_storage(move |s| s.put_lyrics(&entry, allow_overwrite))
            .await?;
        if written {
            tracing::info!("Saved lyrics for {} to the lyric database", track.location);
            Ok(Some(key))
        } else {
            tracing::info!("Not overwriting stored lyrics for {}", track.location);
            Ok(None)
        }
    }

    async fn delete_persisted(&self, track: &Track, path: &str) -> SourceResult<bool> {
        let key = if path.is_empty() {
            track.key()
        } else {
            path.to_string()
        };
        self.with_storage(move |s| s.delete_lyrics(&key)).await
    }

    fn file_path(&self, _track: &Track, _lyrics: &LyricData) -> Option<PathBuf> {
        Some(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_delete() {
        let dir = tempfile::tempdir().unwrap();
        let source = LyricDatabase::new(dir.path().join("lyrics.sqlite3"));
        let track = Track::new("/music/a.flac", TrackInfo::from_basic("A", "B", "C"));
        let info = track.info();
        let abort = CancellationToken::new();

        assert!(source.load(&track, &info, &abort).await.unwrap().is_empty());

        let key = source
            .save(&track, &info, true, "[00:01.00]hi", false, &abort)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(key, track.key());

        let declined = source
            .save(&track, &info, true, "[00:02.00]again", false, &abort)
            .await
            .unwrap();
        assert!(declined.is_none());

        let loaded = source.load(&track, &info, &abort).await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].text, "[00:01.00]hi");
        assert_eq!(loaded[0].title, "C");

        assert!(source.delete_persisted(&track, &key).await.unwrap());
        assert!(source.load(&track, &info, &abort).await.unwrap().is_empty());
    }
}
