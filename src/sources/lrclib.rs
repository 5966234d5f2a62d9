//! LRCLIB source
//!
//! LRCLIB is a free lyrics API that provides synchronized (LRC format) lyrics.
//! API Documentation: https://lrclib.net/docs

use super::{RemoteSource, SourceId, SourceInfo, tag_values_match, url_encode};
use crate::error::SourceResult;
use crate::lyrics::LyricDataRaw;
use crate::net::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub const ID: SourceId = SourceId::from_u128(0x1f6e0b2d_8a47_4c39_9e15_d2b7c4a08f63);

/// LRCLIB API response
#[derive(Debug, Deserialize, Clone)]
pub struct LrclibResponse {
    id: i64,
    #[serde(rename = "trackName")]
    track_name: String,
    #[serde(rename = "artistName")]
    artist_name: String,
    #[serde(rename = "albumName")]
    album_name: Option<String>,
    #[serde(rename = "plainLyrics")]
    pub plain_lyrics: Option<String>,
    #[serde(rename = "syncedLyrics")]
    pub synced_lyrics: Option<String>,
}

impl LrclibResponse {
    /// Synced lyrics when present, plain otherwise.
    fn best_text(&self) -> Option<&str> {
        [self.synced_lyrics.as_deref(), self.plain_lyrics.as_deref()]
            .into_iter()
            .flatten()
            .find(|text| !text.trim().is_empty())
    }

    fn into_raw(self, base_url: &str) -> Option<LyricDataRaw> {
        let text = self.best_text()?.to_string();
        Some(LyricDataRaw {
            source_id: ID,
            persistent_storage_path: format!("{base_url}/get/{}", self.id),
            artist: self.artist_name,
            album: self.album_name.unwrap_or_default(),
            title: self.track_name,
            lookup_id: String::new(),
            text,
        })
    }
}

/// LRCLIB API client
#[derive(Debug, Clone)]
pub struct Lrclib {
    http: HttpClient,
    base_url: String,
}

impl Lrclib {
    const DEFAULT_BASE_URL: &'static str = "https://lrclib.net/api";

    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Get lyrics with exact match
    async fn get_exact(
        &self,
        artist: &str,
        album: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Option<LrclibResponse>> {
        let mut url = format!(
            "{}/get?track_name={}&artist_name={}",
            self.base_url,
            url_encode(title),
            url_encode(artist)
        );
        if !album.is_empty() {
            url.push_str(&format!("&album_name={}", url_encode(album)));
        }
        self.http.get_json(&url, abort).await
    }

    /// Free-text search
    async fn search_all(
        &self,
        artist: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LrclibResponse>> {
        let query = format!("{} {}", title, artist);
        let url = format!("{}/search?q={}", self.base_url, url_encode(query.trim()));
        Ok(self.http.get_json(&url, abort).await?.unwrap_or_default())
    }
}

impl SourceInfo for Lrclib {
    fn id(&self) -> SourceId {
        ID
    }

    fn friendly_name(&self) -> &'static str {
        "LRCLIB"
    }
}

#[async_trait]
impl RemoteSource for Lrclib {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        tracing::info!("Querying LRCLIB for {artist} - {title}...");

        // First try the "get" endpoint with exact match
        if let Some(exact) = self.get_exact(artist, album, title, abort).await?
            && let Some(raw) = exact.into_raw(&self.base_url)
        {
            return Ok(vec![raw]);
        }

        // Fall back to search
        let results = self.search_all(artist, title, abort).await?;
        Ok(rank_search_results(results, artist, title)
            .into_iter()
            .filter_map(|r| r.into_raw(&self.base_url))
            .collect())
    }
}

/// Matching titles first, then synced before plain. Stable otherwise.
fn rank_search_results(
    mut results: Vec<LrclibResponse>,
    artist: &str,
    title: &str,
) -> Vec<LrclibResponse> {
    results.sort_by_key(|r| {
        let title_match = tag_values_match(&r.track_name, title);
        let artist_match = artist.is_empty() || tag_values_match(&r.artist_name, artist);
        let synced = r.synced_lyrics.as_deref().is_some_and(|s| !s.trim().is_empty());
        (!(title_match && artist_match), !synced)
    });
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"[
        {"id": 1, "trackName": "Other", "artistName": "Band", "albumName": null,
         "duration": 100.0, "plainLyrics": "nope", "syncedLyrics": null},
        {"id": 2, "trackName": "Song", "artistName": "Band", "albumName": "LP",
         "duration": 200.0, "plainLyrics": "plain", "syncedLyrics": null},
        {"id": 3, "trackName": "song", "artistName": "band", "albumName": "LP",
         "duration": 200.0, "plainLyrics": "plain", "syncedLyrics": "[00:01.00]synced"},
        {"id": 4, "trackName": "Song", "artistName": "Band", "albumName": null,
         "duration": 200.0, "plainLyrics": "", "syncedLyrics": null}
    ]"#;

    #[test]
    fn test_rank_search_results() {
        let results: Vec<LrclibResponse> = serde_json::from_str(SEARCH_JSON).unwrap();
        let ranked = rank_search_results(results, "Band", "Song");
        let ids: Vec<_> = ranked.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 4, 1]);
    }

    #[test]
    fn test_into_raw_prefers_synced() {
        let results: Vec<LrclibResponse> = serde_json::from_str(SEARCH_JSON).unwrap();
        let raws: Vec<_> = results
            .into_iter()
            .filter_map(|r| r.into_raw("https://lrclib.net/api"))
            .collect();

        // Entry 4 has no usable text.
        assert_eq!(raws.len(), 3);
        assert_eq!(raws[2].text, "[00:01.00]synced");
        assert_eq!(raws[2].persistent_storage_path, "https://lrclib.net/api/get/3");
        assert_eq!(raws[1].album, "LP");
        assert_eq!(raws[0].album, "");
        assert!(raws.iter().all(|r| r.source_id == ID));
    }
}
