//! Musixmatch desktop API.
//!
//! Searching only returns track ids; the lyric text is fetched per candidate
//! through [`RemoteSource::lookup`]. Requires a user token, without one the
//! source quietly finds nothing.

use super::{RemoteSource, SourceId, SourceInfo, url_encode};
use crate::error::{SourceError, SourceResult};
use crate::lyrics::LyricDataRaw;
use crate::net::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

pub const ID: SourceId = SourceId::from_u128(0xd4a8e6f2_73b1_4c05_a9e3_18f0b65c2d7a);

const BASE_URL: &str = "https://apic-desktop.musixmatch.com/ws/1.1";
const APP_ID: &str = "web-desktop-app-v1.0";
const SEARCH_PAGE_SIZE: u32 = 5;

/// Every response is wrapped as `{"message": {"header": {...}, "body": ...}}`.
/// `body` is an empty list instead of an object when nothing matched.
#[derive(Debug, Deserialize)]
struct Envelope {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    header: Header,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct Header {
    status_code: u16,
}

#[derive(Debug, Deserialize)]
struct TrackEntry {
    track: TrackMeta,
}

#[derive(Debug, Deserialize)]
struct TrackMeta {
    track_id: u64,
    #[serde(default)]
    track_name: String,
    #[serde(default)]
    artist_name: String,
    #[serde(default)]
    album_name: String,
}

#[derive(Debug, Clone)]
pub struct Musixmatch {
    http: HttpClient,
    token: String,
}

impl Musixmatch {
    pub fn new(http: HttpClient, token: String) -> Self {
        Self { http, token }
    }

    fn url(&self, method: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{BASE_URL}/{method}?app_id={APP_ID}&usertoken={}",
            url_encode(&self.token)
        );
        for (key, value) in params {
            url.push_str(&format!("&{key}={}", url_encode(value)));
        }
        url
    }

    async fn call(&self, url: &str, abort: &CancellationToken) -> SourceResult<Option<Value>> {
        let envelope: Option<Envelope> = self.http.get_json(url, abort).await?;
        let Some(Envelope { message }) = envelope else {
            return Ok(None);
        };
        match message.header.status_code {
            200 => Ok(Some(message.body)),
            404 => Ok(None),
            code => Err(SourceError::Status(code)),
        }
    }

    async fn fetch_text(&self, track_id: &str, abort: &CancellationToken) -> SourceResult<Option<String>> {
        let url = self.url(
            "track.subtitle.get",
            &[("track_id", track_id), ("subtitle_format", "lrc")],
        );
        if let Some(text) = self.call(&url, abort).await?.as_ref().and_then(subtitle_body) {
            return Ok(Some(text));
        }

        let url = self.url("track.lyrics.get", &[("track_id", track_id)]);
        Ok(self.call(&url, abort).await?.as_ref().and_then(lyrics_body))
    }
}

impl SourceInfo for Musixmatch {
    fn id(&self) -> SourceId {
        ID
    }

    fn friendly_name(&self) -> &'static str {
        "Musixmatch"
    }
}

#[async_trait]
impl RemoteSource for Musixmatch {
    async fn search(
        &self,
        artist: &str,
        _album: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        if self.token.is_empty() {
            tracing::debug!("No Musixmatch token configured, skipping");
            return Ok(Vec::new());
        }

        tracing::info!("Querying Musixmatch for {artist} - {title}...");
        let page_size = SEARCH_PAGE_SIZE.to_string();
        let url = self.url(
            "track.search",
            &[
                ("q_artist", artist),
                ("q_track", title),
                ("page_size", &page_size),
                ("s_track_rating", "desc"),
            ],
        );
        Ok(self
            .call(&url, abort)
            .await?
            .map(|body| search_results(&body))
            .unwrap_or_default())
    }

    async fn lookup(&self, data: &mut LyricDataRaw, abort: &CancellationToken) -> SourceResult<()> {
        if data.lookup_id.is_empty() || self.token.is_empty() {
            return Ok(());
        }
        if let Some(text) = self.fetch_text(&data.lookup_id, abort).await? {
            data.text = text;
        }
        Ok(())
    }
}

fn search_results(body: &Value) -> Vec<LyricDataRaw> {
    let Some(list) = body.get("track_list").cloned() else {
        return Vec::new();
    };
    let entries: Vec<TrackEntry> = serde_json::from_value(list).unwrap_or_default();
    entries
        .into_iter()
        .map(|TrackEntry { track }| LyricDataRaw {
            source_id: ID,
            persistent_storage_path: format!("musixmatch:{}", track.track_id),
            artist: track.artist_name,
            album: track.album_name,
            title: track.track_name,
            lookup_id: track.track_id.to_string(),
            text: String::new(),
        })
        .collect()
}

fn subtitle_body(body: &Value) -> Option<String> {
    non_empty(body.pointer("/subtitle/subtitle_body"))
}

fn lyrics_body(body: &Value) -> Option<String> {
    non_empty(body.pointer("/lyrics/lyrics_body"))
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
        .map(str::to_string)
}
