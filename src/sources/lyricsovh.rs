//! lyrics.ovh, a small plain-text lyrics API.

use super::{RemoteSource, SourceId, SourceInfo, url_encode};
use crate::error::SourceResult;
use crate::lyrics::LyricDataRaw;
use crate::net::HttpClient;
use async_trait::async_trait;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

pub const ID: SourceId = SourceId::from_u128(0x5b3a91c8_2e64_47d0_8f1a_c69e07d4b215);

#[derive(Debug, Deserialize)]
struct OvhResponse {
    #[serde(default)]
    lyrics: String,
}

#[derive(Debug, Clone)]
pub struct LyricsOvh {
    http: HttpClient,
    base_url: String,
}

impl LyricsOvh {
    const DEFAULT_BASE_URL: &'static str = "https://api.lyrics.ovh/v1";

    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        }
    }

    fn url(&self, artist: &str, title: &str) -> String {
        format!("{}/{}/{}", self.base_url, url_encode(artist), url_encode(title))
    }
}

impl SourceInfo for LyricsOvh {
    fn id(&self) -> SourceId {
        ID
    }

    fn friendly_name(&self) -> &'static str {
        "lyrics.ovh"
    }
}

#[async_trait]
impl RemoteSource for LyricsOvh {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        if artist.is_empty() || title.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.url(artist, title);
        tracing::info!("Querying lyrics.ovh for {artist} - {title}...");
        let response: Option<OvhResponse> = self.http.get_json(&url, abort).await?;

        Ok(response
            .and_then(|r| extract_text(r.lyrics))
            .map(|text| LyricDataRaw {
                source_id: ID,
                persistent_storage_path: url,
                artist: artist.to_string(),
                album: album.to_string(),
                title: title.to_string(),
                lookup_id: String::new(),
                text,
            })
            .into_iter()
            .collect())
    }
}

/// The API pads with blank lines and sometimes prefixes a "Paroles de la
/// chanson ..." banner line ending in CRLF.
fn extract_text(lyrics: String) -> Option<String> {
    let body = match lyrics.split_once("\r\n") {
        Some((first, rest)) if first.starts_with("Paroles de la chanson") => rest,
        _ => lyrics.as_str(),
    };
    let body = body.trim();
    (!body.is_empty()).then(|| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text() {
        let r: OvhResponse =
            serde_json::from_str(r#"{"lyrics": "\n\nLine one\nLine two\n"}"#).unwrap();
        assert_eq!(extract_text(r.lyrics).as_deref(), Some("Line one\nLine two"));

        let banner = "Paroles de la chanson Song par Band\r\nLine one".to_string();
        assert_eq!(extract_text(banner).as_deref(), Some("Line one"));

        let r: OvhResponse = serde_json::from_str(r#"{"error": "No lyrics found"}"#).unwrap();
        assert_eq!(extract_text(r.lyrics), None);
    }

    #[test]
    fn test_url_is_encoded() {
        let http = HttpClient::new(&crate::config::defaults::network()).unwrap();
        let source = LyricsOvh::new(http);
        assert_eq!(
            source.url("AC/DC", "T.N.T"),
            "https://api.lyrics.ovh/v1/AC%2FDC/T.N.T"
        );
    }
}
