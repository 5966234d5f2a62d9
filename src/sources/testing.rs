//! In-memory sources that count how often they are used.

use super::{LocalSource, RemoteSource, SourceId, SourceInfo};
use crate::error::{SourceError, SourceResult};
use crate::lyrics::{LyricData, LyricDataRaw};
use crate::net::cancellable;
use crate::track::{Track, TrackInfo};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn raw(id: SourceId, text: &str, info: &TrackInfo) -> LyricDataRaw {
    LyricDataRaw {
        source_id: id,
        artist: info.artist().to_string(),
        album: info.album().to_string(),
        title: info.title().to_string(),
        text: text.to_string(),
        ..Default::default()
    }
}

/// Local source holding at most one text for every track.
pub struct FakeLocal {
    id: SourceId,
    stored: Mutex<Option<String>>,
    pub loads: AtomicUsize,
    pub saves: AtomicUsize,
}

impl FakeLocal {
    pub fn new(id: SourceId, stored: Option<&str>) -> Self {
        Self {
            id,
            stored: Mutex::new(stored.map(str::to_string)),
            loads: AtomicUsize::new(0),
            saves: AtomicUsize::new(0),
        }
    }

    pub fn stored(&self) -> Option<String> {
        self.stored.lock().unwrap().clone()
    }
}

impl SourceInfo for FakeLocal {
    fn id(&self) -> SourceId {
        self.id
    }

    fn friendly_name(&self) -> &'static str {
        "Fake local"
    }
}

#[async_trait]
impl LocalSource for FakeLocal {
    async fn load(
        &self,
        _track: &Track,
        info: &TrackInfo,
        _abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .stored()
            .map(|text| raw(self.id, &text, info))
            .into_iter()
            .collect())
    }

    async fn save(
        &self,
        track: &Track,
        _info: &TrackInfo,
        _is_timestamped: bool,
        text: &str,
        allow_overwrite: bool,
        _abort: &CancellationToken,
    ) -> SourceResult<Option<String>> {
        let mut stored = self.stored.lock().unwrap();
        if stored.is_some() && !allow_overwrite {
            return Ok(None);
        }
        *stored = Some(text.to_string());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(Some(format!("fake://{}", track.location)))
    }

    async fn delete_persisted(&self, _track: &Track, _path: &str) -> SourceResult<bool> {
        Ok(self.stored.lock().unwrap().take().is_some())
    }

    fn file_path(&self, _track: &Track, _lyrics: &LyricData) -> Option<PathBuf> {
        None
    }
}

enum Behaviour {
    Texts(Vec<String>),
    Lookup(String),
    Fail,
    Slow(Duration),
}

/// Remote source with canned answers.
pub struct FakeRemote {
    id: SourceId,
    behaviour: Behaviour,
    pub calls: AtomicUsize,
}

impl FakeRemote {
    fn with_behaviour(id: SourceId, behaviour: Behaviour) -> Self {
        Self {
            id,
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    /// Returns one candidate per entry of `texts`.
    pub fn new(id: SourceId, texts: &[&str]) -> Self {
        Self::with_behaviour(id, Behaviour::Texts(texts.iter().map(|t| t.to_string()).collect()))
    }

    /// Returns a single candidate whose text only arrives through `lookup`.
    pub fn with_lookup(id: SourceId, text: &str) -> Self {
        Self::with_behaviour(id, Behaviour::Lookup(text.to_string()))
    }

    pub fn failing(id: SourceId) -> Self {
        Self::with_behaviour(id, Behaviour::Fail)
    }

    /// Sleeps for `delay` (or until aborted) before finding nothing.
    pub fn slow(id: SourceId, delay: Duration) -> Self {
        Self::with_behaviour(id, Behaviour::Slow(delay))
    }
}

impl SourceInfo for FakeRemote {
    fn id(&self) -> SourceId {
        self.id
    }

    fn friendly_name(&self) -> &'static str {
        "Fake remote"
    }
}

#[async_trait]
impl RemoteSource for FakeRemote {
    async fn search(
        &self,
        artist: &str,
        album: &str,
        title: &str,
        abort: &CancellationToken,
    ) -> SourceResult<Vec<LyricDataRaw>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let info = TrackInfo::from_basic(artist, album, title);
        match &self.behaviour {
            Behaviour::Texts(texts) => Ok(texts.iter().map(|t| raw(self.id, t, &info)).collect()),
            Behaviour::Lookup(_) => Ok(vec![LyricDataRaw {
                lookup_id: "1".to_string(),
                ..raw(self.id, "", &info)
            }]),
            Behaviour::Fail => Err(SourceError::Status(500)),
            Behaviour::Slow(delay) => {
                cancellable(abort, async {
                    tokio::time::sleep(*delay).await;
                    Ok(Vec::new())
                })
                .await
            }
        }
    }

    async fn lookup(&self, data: &mut LyricDataRaw, _abort: &CancellationToken) -> SourceResult<()> {
        match &self.behaviour {
            Behaviour::Lookup(text) => {
                data.text = text.clone();
                Ok(())
            }
            _ => Err(SourceError::NotImplemented),
        }
    }
}
