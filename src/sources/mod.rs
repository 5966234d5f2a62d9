//! Lyric sources
//!
//! A source is either local (it owns persistent storage and can save/delete)
//! or remote (search-only, usually over HTTP). Both share [`SourceInfo`]; the
//! [`Source`] enum is what the registry hands out.

pub mod database;
pub mod localfiles;
pub mod lrclib;
pub mod lyricsovh;
pub mod musixmatch;
pub mod registry;
pub mod tags;
#[cfg(test)]
pub mod testing;

use crate::error::{LyricError, SourceError, SourceResult};
use crate::lyrics::{LyricData, LyricDataRaw};
use crate::track::{Track, TrackInfo};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub use registry::SourceRegistry;

/// Stable identifier of a source.
///
/// These end up in config files and saved lyric metadata, so an id must never
/// change once a source has shipped.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SourceId(Uuid);

impl SourceId {
    /// No source, e.g. lyrics typed in by hand that were never saved.
    pub const NONE: SourceId = SourceId(Uuid::nil());

    pub const fn from_u128(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SourceId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identity shared by every source.
pub trait SourceInfo: Send + Sync {
    fn id(&self) -> SourceId;
    fn friendly_name(&self) -> &'static str;
}

/// A search-only provider.
#[async_trait]
pub trait RemoteSource: SourceInfo {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>>;

    /// Fetch the full text for a result that only carries a `lookup_id`.
    async fn lookup(&self, _data: &mut LyricDataRaw, _abort: &CancellationToken) -> SourceResult<()> {
        Err(SourceError::NotImplemented)
    }

    /// Search using a track's metadata, normalised the way the user configured.
    async fn search_track(
        &self,
        info: &TrackInfo,
        exclude_trailing_brackets: bool,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        let [artist, album, title] = [info.artist(), info.album(), info.title()].map(|value| {
            if exclude_trailing_brackets {
                trim_trailing_text_in_brackets(value).trim().to_string()
            } else {
                value.trim().to_string()
            }
        });
        self.search(&artist, &album, &title, abort).await
    }
}

/// A provider backed by storage on this machine.
#[async_trait]
pub trait LocalSource: SourceInfo {
    /// Read whatever is stored for `track`.
    async fn load(
        &self,
        track: &Track,
        info: &TrackInfo,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>>;

    /// Persist `text` for `track` and return the path it was written to, or
    /// `None` when content exists and `allow_overwrite` is false.
    async fn save(
        &self,
        track: &Track,
        info: &TrackInfo,
        is_timestamped: bool,
        text: &str,
        allow_overwrite: bool,
        abort: &CancellationToken,
    ) -> SourceResult<Option<String>>;

    /// Remove what was saved at `path`. Returns whether anything was removed.
    async fn delete_persisted(&self, track: &Track, path: &str) -> SourceResult<bool>;

    /// Filesystem location of the lyrics, for sources that keep one.
    fn file_path(&self, track: &Track, lyrics: &LyricData) -> Option<PathBuf>;

    /// Sources that can only be read are never picked for saving.
    fn is_read_only(&self) -> bool {
        false
    }
}

#[derive(Clone)]
pub enum Source {
    Local(Arc<dyn LocalSource>),
    Remote(Arc<dyn RemoteSource>),
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Source")
            .field("id", &self.id())
            .field("name", &self.friendly_name())
            .field("local", &self.is_local())
            .finish()
    }
}

impl Source {
    pub fn id(&self) -> SourceId {
        match self {
            Source::Local(src) => src.id(),
            Source::Remote(src) => src.id(),
        }
    }

    pub fn friendly_name(&self) -> &'static str {
        match self {
            Source::Local(src) => src.friendly_name(),
            Source::Remote(src) => src.friendly_name(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Source::Local(_))
    }

    /// Local and able to store lyrics.
    pub fn is_writable(&self) -> bool {
        matches!(self, Source::Local(src) if !src.is_read_only())
    }

    /// Query this source for a track.
    pub async fn search_track(
        &self,
        track: &Track,
        info: &TrackInfo,
        exclude_trailing_brackets: bool,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        match self {
            Source::Local(src) => src.load(track, info, abort).await,
            Source::Remote(src) => src.search_track(info, exclude_trailing_brackets, abort).await,
        }
    }

    pub async fn lookup(&self, data: &mut LyricDataRaw, abort: &CancellationToken) -> SourceResult<()> {
        match self {
            Source::Local(_) => Err(SourceError::NotImplemented),
            Source::Remote(src) => src.lookup(data, abort).await,
        }
    }

    pub async fn save(
        &self,
        track: &Track,
        info: &TrackInfo,
        is_timestamped: bool,
        text: &str,
        allow_overwrite: bool,
        abort: &CancellationToken,
    ) -> Result<Option<String>, LyricError> {
        match self {
            Source::Local(src) => Ok(src
                .save(track, info, is_timestamped, text, allow_overwrite, abort)
                .await?),
            Source::Remote(src) => {
                tracing::warn!("Cannot save lyrics to remote source {}", src.friendly_name());
                Err(LyricError::contract(format!(
                    "save called on remote source {}",
                    src.friendly_name()
                )))
            }
        }
    }

    pub async fn delete_persisted(&self, track: &Track, path: &str) -> Result<bool, LyricError> {
        match self {
            Source::Local(src) => Ok(src.delete_persisted(track, path).await?),
            Source::Remote(src) => {
                tracing::warn!("Cannot delete lyrics from remote source {}", src.friendly_name());
                Err(LyricError::contract(format!(
                    "delete called on remote source {}",
                    src.friendly_name()
                )))
            }
        }
    }

    pub fn file_path(&self, track: &Track, lyrics: &LyricData) -> Result<Option<PathBuf>, LyricError> {
        match self {
            Source::Local(src) => Ok(src.file_path(track, lyrics)),
            Source::Remote(src) => {
                tracing::warn!(
                    "Cannot get file path for lyrics on remote source {}",
                    src.friendly_name()
                );
                Err(LyricError::contract(format!(
                    "file_path called on remote source {}",
                    src.friendly_name()
                )))
            }
        }
    }
}

/// Percent-encode a query parameter.
///
/// ASCII alphanumerics and `-_.~` pass through, everything else (including
/// space) becomes `%XX` with uppercase hex.
pub fn url_encode(input: &str) -> String {
    urlencoding::encode(input).into_owned()
}

/// UTF-8 bytes of `text`, for request and file bodies.
pub fn to_raw_bytes(text: &str) -> Vec<u8> {
    text.as_bytes().to_vec()
}

/// Drop a trailing bracketed suffix such as "(Live)" or "[Remastered 2011]".
///
/// Values that consist only of a bracketed group are returned unchanged.
pub fn trim_trailing_text_in_brackets(input: &str) -> &str {
    let trimmed = input.trim_end();
    let open = match trimmed.chars().last() {
        Some(')') => '(',
        Some(']') => '[',
        Some('}') => '{',
        _ => return input,
    };
    match trimmed.rfind(open) {
        Some(start) if !trimmed[..start].trim().is_empty() => &trimmed[..start],
        _ => input,
    }
}

/// Whether two metadata values name the same thing, ignoring case and spacing.
pub fn tag_values_match(a: &str, b: &str) -> bool {
    let normalise = |s: &str| {
        s.split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" ")
    };
    normalise(a) == normalise(b)
}
