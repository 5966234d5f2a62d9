//! Lyrics stored as `.lrc` / `.txt` files in a directory.
//!
//! Files are named `<artist> - <title>`; timestamped lyrics get `.lrc`,
//! untimed ones `.txt`.

use super::{LocalSource, SourceId, SourceInfo, to_raw_bytes};
use crate::error::{SourceError, SourceResult};
use crate::lyrics::{LyricData, LyricDataRaw};
use crate::track::{Track, TrackInfo};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio_util::sync::CancellationToken;

pub const ID: SourceId = SourceId::from_u128(0x76d90970_1c98_4fe2_944e_ace493f38e85);

const TIMESTAMPED_EXT: &str = "lrc";
const UNTIMED_EXT: &str = "txt";

#[derive(Debug, Clone)]
pub struct LocalFiles {
    directory: PathBuf,
}

impl LocalFiles {
    pub fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    fn path_for(&self, track: &Track, info: &TrackInfo, ext: &str) -> PathBuf {
        self.directory.join(format!("{}.{ext}", file_stem(track, info)))
    }

    /// Whether `path` resolves to a file inside the lyrics directory.
    /// Symlinks and `..` are resolved first; missing paths are never inside.
    async fn contains(&self, path: &Path) -> SourceResult<bool> {
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Ok(false);
        }
        let Some(directory) = canonical(&self.directory).await? else {
            return Ok(false);
        };
        let Some(path) = canonical(path).await? else {
            return Ok(false);
        };
        Ok(path.starts_with(directory))
    }
}

async fn canonical(path: &Path) -> SourceResult<Option<PathBuf>> {
    match tokio::fs::canonicalize(path).await {
        Ok(resolved) => Ok(Some(resolved)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SourceError::io(e, path)),
    }
}

impl SourceInfo for LocalFiles {
    fn id(&self) -> SourceId {
        ID
    }

    fn friendly_name(&self) -> &'static str {
        "Local files"
    }
}

#[async_trait]
impl LocalSource for LocalFiles {
    async fn load(
        &self,
        track: &Track,
        info: &TrackInfo,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        let mut results = Vec::new();
        for ext in [TIMESTAMPED_EXT, UNTIMED_EXT] {
            if abort.is_cancelled() {
                return Err(SourceError::Cancelled);
            }
            let path = self.path_for(track, info, ext);
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(SourceError::io(e, path)),
            };
            tracing::debug!("Loaded lyrics from {}", path.display());
            results.push(LyricDataRaw {
                source_id: ID,
                persistent_storage_path: path.display().to_string(),
                artist: info.artist().to_string(),
                album: info.album().to_string(),
                title: info.title().to_string(),
                lookup_id: String::new(),
                text,
            });
        }
        Ok(results)
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

        let (ext, other_ext) = if is_timestamped {
            (TIMESTAMPED_EXT, UNTIMED_EXT)
        } else {
            (UNTIMED_EXT, TIMESTAMPED_EXT)
        };
        let path = self.path_for(track, info, ext);
        let other = self.path_for(track, info, other_ext);

        let exists = file_exists(&path).await? || file_exists(&other).await?;
        if exists && !allow_overwrite {
            tracing::info!("Not overwriting existing lyrics at {}", path.display());
            return Ok(None);
        }

        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| SourceError::io(e, &self.directory))?;
        tokio::fs::write(&path, to_raw_bytes(text))
            .await
            .map_err(|e| SourceError::io(e, &path))?;

        // Only one format per track, or the stale one could shadow this save.
        match tokio::fs::remove_file(&other).await {
            Ok(()) => tracing::debug!("Removed superseded {}", other.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(SourceError::io(e, other)),
        }

        tracing::info!("Saved lyrics to {}", path.display());
        Ok(Some(path.display().to_string()))
    }

    async fn delete_persisted(&self, _track: &Track, path: &str) -> SourceResult<bool> {
        let path = Path::new(path);
        if !self.contains(path).await? {
            tracing::warn!(
                "Refusing to delete {} outside of {}",
                path.display(),
                self.directory.display()
            );
            return Ok(false);
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SourceError::io(e, path)),
        }
    }

    fn file_path(&self, track: &Track, lyrics: &LyricData) -> Option<PathBuf> {
        if lyrics.source_id == ID && !lyrics.persistent_storage_path.is_empty() {
            return Some(PathBuf::from(&lyrics.persistent_storage_path));
        }
        let ext = if lyrics.is_timestamped() {
            TIMESTAMPED_EXT
        } else {
            UNTIMED_EXT
        };
        Some(self.path_for(track, &track.info(), ext))
    }
}

async fn file_exists(path: &Path) -> SourceResult<bool> {
    tokio::fs::try_exists(path)
        .await
        .map_err(|e| SourceError::io(e, path))
}

/// `<artist> - <title>`, falling back to the track's own file name.
fn file_stem(track: &Track, info: &TrackInfo) -> String {
    let stem = match (info.artist().trim(), info.title().trim()) {
        ("", "") => Path::new(&track.location)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| track.key()),
        ("", title) => title.to_string(),
        (artist, "") => artist.to_string(),
        (artist, title) => format!("{artist} - {title}"),
    };
    sanitize_file_name(&stem)
}

fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace()).to_string()
}
