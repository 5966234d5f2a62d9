//! Saving and deleting lyrics through the local sources.

use super::search::LyricIo;
use crate::error::LyricError;
use crate::lyrics::{LyricData, parser};
use crate::sources::Source;
use crate::track::Track;
use tokio_util::sync::CancellationToken;

impl LyricIo {
    /// The configured save source, or the first writable local source if
    /// that one is missing, remote or read-only.
    fn save_source(&self) -> Option<&Source> {
        let configured = self.config().saving.save_source;
        match self.registry().get(configured) {
            Some(source) if source.is_writable() => Some(source),
            other => {
                if let Some(source) = other {
                    tracing::warn!(
                        "Configured save source {} cannot store lyrics",
                        source.friendly_name()
                    );
                }
                self.registry().iter().find(|src| src.is_writable())
            }
        }
    }

    /// Write `lyrics` to local storage. On success `lyrics` is updated to
    /// point at the saved copy.
    ///
    /// Returns false when saving was declined because content already exists
    /// and `allow_overwrite` is false, or when the write failed.
    pub async fn save_lyrics(
        &self,
        track: &Track,
        lyrics: &mut LyricData,
        allow_overwrite: bool,
        abort: &CancellationToken,
    ) -> bool {
        let Some(source) = self.save_source() else {
            tracing::warn!("No local lyric source available for saving");
            return false;
        };

        let is_timestamped = lyrics.is_timestamped();
        let text = parser::shrink(lyrics);

        match source
            .save(track, &track.info(), is_timestamped, &text, allow_overwrite, abort)
            .await
        {
            Ok(Some(path)) => {
                lyrics.source_id = source.id();
                lyrics.persistent_storage_path = path;
                true
            }
            Ok(None) => {
                tracing::info!(
                    "Lyrics for {} already saved in {}, not overwriting",
                    track.location,
                    source.friendly_name()
                );
                false
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to save lyrics for {} to {}: {e}",
                    track.location,
                    source.friendly_name()
                );
                false
            }
        }
    }

    /// Remove the stored copy that `lyrics` was loaded from.
    ///
    /// Deleting a result that came from a remote source is a contract
    /// violation.
    pub async fn delete_saved_lyrics(
        &self,
        track: &Track,
        lyrics: &LyricData,
    ) -> Result<bool, LyricError> {
        let Some(source) = self.registry().get(lyrics.source_id) else {
            tracing::warn!(
                "Cannot delete lyrics for {}: unknown source {}",
                track.location,
                lyrics.source_id
            );
            return Ok(false);
        };
        if !source.is_local() {
            tracing::error!(
                "Attempt to delete lyrics for {} from remote source {}",
                track.location,
                source.friendly_name()
            );
            return Err(LyricError::contract(format!(
                "cannot delete lyrics from remote source {}",
                source.friendly_name()
            )));
        }

        let removed = source
            .delete_persisted(track, &lyrics.persistent_storage_path)
            .await?;
        if removed {
            tracing::info!(
                "Deleted saved lyrics for {} from {}",
                track.location,
                source.friendly_name()
            );
        }
        Ok(removed)
    }
}
