use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::collections::BTreeMap;

/// Immutable snapshot of a track's metadata.
///
/// Field names are case-insensitive and every field can hold several values,
/// the way tag formats store them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    fields: BTreeMap<String, Vec<String>>,
}

impl TrackInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_basic(artist: &str, album: &str, title: &str) -> Self {
        let mut info = Self::new();
        for (name, value) in [("artist", artist), ("album", album), ("title", title)] {
            if !value.is_empty() {
                info.add(name, value);
            }
        }
        info
    }

    /// Builder-style append of a field value.
    #[cfg(test)]
    pub fn with(mut self, name: &str, value: &str) -> Self {
        self.add(name, value);
        self
    }

    pub fn add(&mut self, name: &str, value: &str) {
        self.fields
            .entry(name.to_ascii_lowercase())
            .or_default()
            .push(value.to_string());
    }

    /// All values stored under `name`.
    pub fn values(&self, name: &str) -> &[String] {
        self.fields
            .get(&name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// First value stored under `name`, or an empty string.
    pub fn get(&self, name: &str) -> &str {
        self.values(name).first().map(String::as_str).unwrap_or("")
    }

    pub fn artist(&self) -> &str {
        self.get("artist")
    }

    pub fn album(&self) -> &str {
        self.get("album")
    }

    pub fn title(&self) -> &str {
        self.get("title")
    }
}

/// A playable track. Handles share it through an `Arc`; it outlives them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    /// Where the track lives (file path or URL). Identity of the track.
    pub location: String,
    info: TrackInfo,
}

impl Track {
    pub fn new(location: impl Into<String>, info: TrackInfo) -> Self {
        Self {
            location: location.into(),
            info,
        }
    }

    /// Take a snapshot of the current metadata.
    pub fn info(&self) -> TrackInfo {
        self.info.clone()
    }

    /// Stable storage key for this track (hex SHA-1 of its location).
    pub fn key(&self) -> String {
        let mut hasher = Sha1::new();
        hasher.update(self.location.as_bytes());
        hex::encode(hasher.finalize())
    }
}
