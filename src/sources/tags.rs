//! Lyrics embedded in the track's own metadata tags.
//!
//! Read-only: writing tags belongs to the player's tag layer, not to us.

use super::{LocalSource, SourceId, SourceInfo};
use crate::error::{SourceError, SourceResult};
use crate::lyrics::{LyricData, LyricDataRaw};
use crate::track::{Track, TrackInfo};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub const ID: SourceId = SourceId::from_u128(0x3fb0f715_b9b4_4d5e_9a1c_2f0c53b8a6d1);

#[derive(Debug, Clone)]
pub struct EmbeddedTags {
    /// Tag names to scan, in priority order.
    tag_names: Vec<String>,
}

impl EmbeddedTags {
    pub fn new(tag_names: Vec<String>) -> Self {
        Self { tag_names }
    }
}

impl SourceInfo for EmbeddedTags {
    fn id(&self) -> SourceId {
        ID
    }

    fn friendly_name(&self) -> &'static str {
        "Metadata tags"
    }
}

#[async_trait]
impl LocalSource for EmbeddedTags {
    async fn load(
        &self,
        track: &Track,
        info: &TrackInfo,
        _abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        let results = self
            .tag_names
            .iter()
            .flat_map(|name| info.values(name).iter().map(move |value| (name, value)))
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(name, value)| LyricDataRaw {
                source_id: ID,
                persistent_storage_path: format!("{}#{name}", track.location),
                artist: info.artist().to_string(),
                album: info.album().to_string(),
                title: info.title().to_string(),
                lookup_id: String::new(),
                text: value.clone(),
            })
            .collect();
        Ok(results)
    }

    async fn save(
        &self,
        _track: &Track,
        _info: &TrackInfo,
        _is_timestamped: bool,
        _text: &str,
        _allow_overwrite: bool,
        _abort: &CancellationToken,
    ) -> SourceResult<Option<String>> {
        Err(SourceError::ReadOnly)
    }

    async fn delete_persisted(&self, _track: &Track, _path: &str) -> SourceResult<bool> {
        Err(SourceError::ReadOnly)
    }

    fn file_path(&self, _track: &Track, _lyrics: &LyricData) -> Option<PathBuf> {
        None
    }

    fn is_read_only(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scans_configured_tags_in_order() {
        let source = EmbeddedTags::new(vec!["SYNCEDLYRICS".into(), "LYRICS".into()]);
        let track = Track::new(
            "/music/a.flac",
            TrackInfo::from_basic("A", "B", "C")
                .with("lyrics", "plain")
                .with("syncedlyrics", "[00:01.00]synced")
                .with("comment", "ignored"),
        );
        let abort = CancellationToken::new();

        let found = source.load(&track, &track.info(), &abort).await.unwrap();
        let texts: Vec<_> = found.iter().map(|raw| raw.text.as_str()).collect();
        assert_eq!(texts, vec!["[00:01.00]synced", "plain"]);
        assert_eq!(found[1].persistent_storage_path, "/music/a.flac#LYRICS");
    }

    #[tokio::test]
    async fn test_is_read_only() {
        let source = EmbeddedTags::new(vec!["LYRICS".into()]);
        let track = Track::new("/music/a.flac", TrackInfo::new());
        let abort = CancellationToken::new();
        let result = source
            .save(&track, &track.info(), false, "x", true, &abort)
            .await;
        assert!(matches!(result, Err(SourceError::ReadOnly)));
        assert!(source.is_read_only());
    }
}
