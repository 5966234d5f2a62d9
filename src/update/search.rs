//! Search orchestration: which sources are asked, in what order, and how
//! their answers land in an update handle.

use super::handle::{LyricUpdateHandle, UpdateKind};
use crate::config::{AutoSavePolicy, Config};
use crate::error::{SourceError, SourceResult};
use crate::lyrics::{LyricData, LyricDataRaw, parser};
use crate::sources::{Source, SourceId, SourceRegistry};
use crate::track::{Track, TrackInfo};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

/// Sources to try for a track, best first.
///
/// Local sources always come before remote ones; within each group the
/// configured order is kept. Unknown ids and repeats are skipped.
pub fn search_order(active: &[SourceId], registry: &SourceRegistry, local_only: bool) -> Vec<Source> {
    let mut seen = Vec::with_capacity(active.len());
    let known: Vec<&Source> = active
        .iter()
        .filter(|id| {
            if seen.contains(*id) {
                return false;
            }
            seen.push(**id);
            true
        })
        .filter_map(|id| {
            let source = registry.get(*id);
            if source.is_none() {
                tracing::debug!("Skipping unknown lyric source {id}");
            }
            source
        })
        .collect();

    let local = known.iter().filter(|src| src.is_local());
    let remote = known.iter().filter(|src| !src.is_local() && !local_only);
    local.chain(remote).map(|src| (*src).clone()).collect()
}

/// Runs searches against a fixed registry and configuration.
#[derive(Debug, Clone)]
pub struct LyricIo {
    registry: Arc<SourceRegistry>,
    config: Arc<Config>,
    permits: Arc<Semaphore>,
}

impl LyricIo {
    pub fn new(registry: Arc<SourceRegistry>, config: Arc<Config>) -> Self {
        let permits = Arc::new(Semaphore::new(config.network.max_concurrent_searches.max(1)));
        Self {
            registry,
            config,
            permits,
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Find lyrics for the handle's track, stopping at the first source with
    /// a non-empty result. Always leaves the handle complete.
    pub async fn search_for_lyrics(&self, handle: &LyricUpdateHandle, local_only: bool) {
        handle.set_started();
        let track = handle.track();
        let info = handle.track_info();
        let exclude_brackets = self.config.search.exclude_trailing_brackets;

        for source in search_order(&self.config.active_sources(), &self.registry, local_only) {
            let Ok(abort) = handle.get_checked_abort() else {
                tracing::info!("Lyric search for {} cancelled", track.location);
                handle.set_complete();
                return;
            };

            handle.set_progress(format!("Searching {}...", source.friendly_name()));
            if !source.is_local() {
                handle.set_remote_source_searched();
            }

            let found = match source.search_track(track, info, exclude_brackets, abort).await {
                Ok(candidates) => first_usable(&source, candidates, abort).await,
                Err(e) => Err(e),
            };
            match found {
                Ok(Some(lyrics)) => {
                    tracing::info!(
                        "Found lyrics for {} from {}",
                        track.location,
                        source.friendly_name()
                    );
                    let lyrics = self.autosave(handle, lyrics, abort).await;
                    handle.set_progress(format!("Found lyrics from {}", source.friendly_name()));
                    handle.set_result(lyrics, true);
                    return;
                }
                Ok(None) => {
                    tracing::debug!("{} has no lyrics for {}", source.friendly_name(), track.location);
                }
                Err(SourceError::Cancelled) => {
                    tracing::info!("Lyric search for {} cancelled", track.location);
                    handle.set_complete();
                    return;
                }
                Err(e) => {
                    tracing::warn!("{} failed for {}: {e}", source.friendly_name(), track.location);
                }
            }
        }

        handle.set_progress("No lyrics found");
        handle.set_result(empty_result(info), true);
    }

    /// Ask every active remote source using explicit metadata, committing
    /// each distinct candidate as it arrives.
    ///
    /// Candidates whose content matches an earlier one (typically the same
    /// lyrics mirrored by several providers) are dropped.
    pub async fn search_for_all_lyrics(
        &self,
        handle: &LyricUpdateHandle,
        artist: &str,
        album: &str,
        title: &str,
    ) {
        handle.set_started();
        let mut committed: Vec<LyricData> = Vec::new();

        for source in search_order(&self.config.active_sources(), &self.registry, false) {
            let Source::Remote(remote) = &source else {
                continue;
            };
            let Ok(abort) = handle.get_checked_abort() else {
                break;
            };

            handle.set_progress(format!("Searching {}...", source.friendly_name()));
            handle.set_remote_source_searched();

            let candidates = match remote.search(artist, album, title, abort).await {
                Ok(candidates) => candidates,
                Err(SourceError::Cancelled) => break,
                Err(e) => {
                    tracing::warn!("{} failed for {artist} - {title}: {e}", source.friendly_name());
                    continue;
                }
            };

            for mut raw in candidates {
                if abort.is_cancelled() {
                    break;
                }
                match resolve_lookup(&source, &mut raw, abort).await {
                    Ok(()) => {}
                    Err(SourceError::Cancelled) => break,
                    Err(e) => {
                        tracing::warn!("{} lookup failed: {e}", source.friendly_name());
                        continue;
                    }
                }
                let lyrics = parser::parse(&raw);
                if lyrics.is_empty() || committed.iter().any(|seen| same_content(seen, &lyrics)) {
                    continue;
                }
                committed.push(lyrics.clone());
                handle.set_result(lyrics, false);
            }
        }

        handle.set_progress(format!("Found {} result(s)", committed.len()));
        handle.set_complete();
    }

    /// Hand one new candidate to a consumer, if the worker produced any since
    /// the last call.
    pub fn process_available_lyric_update(&self, handle: &LyricUpdateHandle) -> Option<LyricData> {
        handle.next_result()
    }

    /// Start a track search in the background.
    pub fn spawn_search(
        self: &Arc<Self>,
        kind: UpdateKind,
        track: Arc<Track>,
        local_only: bool,
    ) -> Arc<LyricUpdateHandle> {
        let handle = Arc::new(LyricUpdateHandle::new(kind, track, CancellationToken::new()));
        let io = Arc::clone(self);
        let worker = Arc::clone(&handle);
        tokio::spawn(async move {
            let Some(_permit) = io.acquire(&worker).await else {
                return;
            };
            io.search_for_lyrics(&worker, local_only).await;
        });
        handle
    }

    /// Start a search across every remote source in the background.
    pub fn spawn_search_all(
        self: &Arc<Self>,
        track: Arc<Track>,
        artist: String,
        album: String,
        title: String,
    ) -> Arc<LyricUpdateHandle> {
        let handle = Arc::new(LyricUpdateHandle::new(
            UpdateKind::ManualSearch,
            track,
            CancellationToken::new(),
        ));
        let io = Arc::clone(self);
        let worker = Arc::clone(&handle);
        tokio::spawn(async move {
            let Some(_permit) = io.acquire(&worker).await else {
                return;
            };
            io.search_for_all_lyrics(&worker, &artist, &album, &title)
                .await;
        });
        handle
    }

    /// A handle for the editor, complete from the start with `lyrics`.
    pub fn begin_edit(&self, track: Arc<Track>, lyrics: LyricData) -> Arc<LyricUpdateHandle> {
        let handle = LyricUpdateHandle::new(UpdateKind::Edit, track, CancellationToken::new());
        handle.set_started();
        handle.set_result(lyrics, true);
        Arc::new(handle)
    }

    /// Wait for a worker slot. Completes the handle and returns `None` if the
    /// search is aborted while queued.
    async fn acquire(&self, handle: &LyricUpdateHandle) -> Option<OwnedSemaphorePermit> {
        let Ok(abort) = handle.get_checked_abort() else {
            handle.set_complete();
            return None;
        };
        tokio::select! {
            permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                Ok(permit) => Some(permit),
                Err(e) => {
                    tracing::error!("Search worker pool closed: {e}");
                    handle.set_complete();
                    None
                }
            },
            _ = abort.cancelled() => {
                handle.set_complete();
                None
            }
        }
    }

    /// Save a fresh search result if the autosave policy asks for it.
    async fn autosave(
        &self,
        handle: &LyricUpdateHandle,
        mut lyrics: LyricData,
        abort: &CancellationToken,
    ) -> LyricData {
        if handle.kind() != UpdateKind::AutoSearch
            || lyrics.source_id == self.config.saving.save_source
        {
            return lyrics;
        }
        let wanted = match self.config.saving.autosave {
            AutoSavePolicy::Never => false,
            AutoSavePolicy::All => true,
            AutoSavePolicy::OnlySynced => lyrics.is_timestamped(),
        };
        if wanted {
            handle.set_progress("Saving lyrics...");
            self.save_lyrics(handle.track(), &mut lyrics, false, abort)
                .await;
        }
        lyrics
    }
}

/// Resolve lookups and parse until a candidate has content.
async fn first_usable(
    source: &Source,
    candidates: Vec<LyricDataRaw>,
    abort: &CancellationToken,
) -> SourceResult<Option<LyricData>> {
    for mut raw in candidates {
        match resolve_lookup(source, &mut raw, abort).await {
            Ok(()) => {}
            Err(SourceError::Cancelled) => return Err(SourceError::Cancelled),
            Err(e) => {
                tracing::warn!("{} lookup failed: {e}", source.friendly_name());
                continue;
            }
        }
        let lyrics = parser::parse(&raw);
        if !lyrics.is_empty() {
            return Ok(Some(lyrics));
        }
    }
    Ok(None)
}

async fn resolve_lookup(
    source: &Source,
    raw: &mut LyricDataRaw,
    abort: &CancellationToken,
) -> SourceResult<()> {
    if raw.lookup_id.is_empty() {
        return Ok(());
    }
    source.lookup(raw, abort).await
}

/// Two candidates carry the same lyrics, wherever they came from.
fn same_content(a: &LyricData, b: &LyricData) -> bool {
    a.lines == b.lines && a.timestamp_offset == b.timestamp_offset
}

/// The "nothing found" result, labelled with the searched track.
fn empty_result(info: &TrackInfo) -> LyricData {
    LyricData {
        artist: info.artist().to_string(),
        album: info.album().to_string(),
        title: info.title().to_string(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::testing::{FakeLocal, FakeRemote};
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    const LOCAL: SourceId = SourceId::from_u128(1);
    const REMOTE_A: SourceId = SourceId::from_u128(2);
    const REMOTE_B: SourceId = SourceId::from_u128(3);

    fn config(active: Vec<SourceId>) -> Config {
        let mut cfg = Config::default();
        cfg.search.active_sources = active;
        cfg.saving.save_source = SourceId::NONE;
        cfg.saving.autosave = AutoSavePolicy::Never;
        cfg
    }

    fn track() -> Arc<Track> {
        Arc::new(Track::new(
            "/music/song.flac",
            TrackInfo::from_basic("Band", "LP", "Song"),
        ))
    }

    fn io(registry: SourceRegistry, cfg: Config) -> LyricIo {
        LyricIo::new(Arc::new(registry), Arc::new(cfg))
    }

    fn auto_handle() -> LyricUpdateHandle {
        LyricUpdateHandle::new(UpdateKind::AutoSearch, track(), CancellationToken::new())
    }

    #[test]
    fn test_search_order_puts_local_first() {
        let mut registry = SourceRegistry::new();
        registry.register_remote(Arc::new(FakeRemote::new(REMOTE_A, &[])));
        registry.register_local(Arc::new(FakeLocal::new(LOCAL, None)));
        registry.register_remote(Arc::new(FakeRemote::new(REMOTE_B, &[])));

        let unknown = SourceId::from_u128(99);
        let active = [REMOTE_B, unknown, LOCAL, REMOTE_A, REMOTE_B];
        let ids: Vec<_> = search_order(&active, &registry, false)
            .iter()
            .map(Source::id)
            .collect();
        assert_eq!(ids, vec![LOCAL, REMOTE_B, REMOTE_A]);

        let ids: Vec<_> = search_order(&active, &registry, true)
            .iter()
            .map(Source::id)
            .collect();
        assert_eq!(ids, vec![LOCAL]);
    }

    #[tokio::test]
    async fn test_local_hit_skips_remote_sources() {
        let local = Arc::new(FakeLocal::new(LOCAL, Some("[00:01.00]local")));
        let remote_a = Arc::new(FakeRemote::new(REMOTE_A, &["remote a"]));
        let remote_b = Arc::new(FakeRemote::new(REMOTE_B, &["remote b"]));
        let mut registry = SourceRegistry::new();
        registry.register_local(local.clone());
        registry.register_remote(remote_a.clone());
        registry.register_remote(remote_b.clone());
        let io = io(registry, config(vec![LOCAL, REMOTE_A, REMOTE_B]));

        let handle = auto_handle();
        io.search_for_lyrics(&handle, false).await;

        assert!(handle.is_complete());
        assert!(!handle.has_searched_remote_sources());
        assert_eq!(remote_a.calls.load(Ordering::SeqCst), 0);
        assert_eq!(remote_b.calls.load(Ordering::SeqCst), 0);
        let result = handle.get_result().unwrap();
        assert_eq!(result.source_id, LOCAL);
        assert!(result.is_timestamped());
    }

    #[tokio::test]
    async fn test_falls_through_to_first_remote_with_content() {
        let mut registry = SourceRegistry::new();
        registry.register_local(Arc::new(FakeLocal::new(LOCAL, None)));
        let remote_a = Arc::new(FakeRemote::failing(REMOTE_A));
        let remote_b = Arc::new(FakeRemote::new(REMOTE_B, &["", "found it"]));
        registry.register_remote(remote_a.clone());
        registry.register_remote(remote_b.clone());
        let io = io(registry, config(vec![REMOTE_A, REMOTE_B, LOCAL]));

        let handle = auto_handle();
        io.search_for_lyrics(&handle, false).await;

        assert_eq!(remote_a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(remote_b.calls.load(Ordering::SeqCst), 1);
        assert!(handle.has_searched_remote_sources());
        let result = handle.get_result().unwrap();
        assert_eq!(result.source_id, REMOTE_B);
        assert_eq!(result.text(), "found it");
    }

    #[tokio::test]
    async fn test_nothing_found_commits_empty_final_result() {
        let mut registry = SourceRegistry::new();
        registry.register_local(Arc::new(FakeLocal::new(LOCAL, None)));
        let remote = Arc::new(FakeRemote::new(REMOTE_A, &[]));
        registry.register_remote(remote.clone());
        let io = io(registry, config(vec![LOCAL, REMOTE_A]));

        let handle = auto_handle();
        io.search_for_lyrics(&handle, true).await;

        assert_eq!(remote.calls.load(Ordering::SeqCst), 0);
        assert!(handle.is_complete());
        let result = handle.get_result().unwrap();
        assert!(result.is_empty());
        assert_eq!(result.title, "Song");
    }

    #[tokio::test]
    async fn test_lookup_fills_in_text() {
        let mut registry = SourceRegistry::new();
        registry.register_remote(Arc::new(FakeRemote::with_lookup(REMOTE_A, "[00:02.00]looked up")));
        let io = io(registry, config(vec![REMOTE_A]));

        let handle = auto_handle();
        io.search_for_lyrics(&handle, false).await;
        let result = handle.get_result().unwrap();
        assert_eq!(result.text(), "looked up");
    }

    #[tokio::test]
    async fn test_abort_completes_promptly() {
        let slow = Arc::new(FakeRemote::slow(REMOTE_A, Duration::from_secs(30)));
        let never = Arc::new(FakeRemote::new(REMOTE_B, &["unreachable"]));
        let mut registry = SourceRegistry::new();
        registry.register_remote(slow.clone());
        registry.register_remote(never.clone());
        let io = Arc::new(io(registry, config(vec![REMOTE_A, REMOTE_B])));

        let handle = io.spawn_search(UpdateKind::AutoSearch, track(), false);
        tokio::time::sleep(Duration::from_millis(20)).await;
        handle.abort();

        let completed = tokio::time::timeout(Duration::from_secs(5), async {
            while !handle.is_complete() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(completed.is_ok());
        assert_eq!(never.calls.load(Ordering::SeqCst), 0);
        assert!(!handle.has_result());
    }

    #[tokio::test]
    async fn test_search_all_dedups_identical_lyrics() {
        let mut registry = SourceRegistry::new();
        let local = Arc::new(FakeLocal::new(LOCAL, Some("local only")));
        registry.register_local(local.clone());
        registry.register_remote(Arc::new(FakeRemote::new(REMOTE_A, &["same", "first"])));
        registry.register_remote(Arc::new(FakeRemote::new(REMOTE_B, &["same", "second", ""])));
        let io = Arc::new(io(registry, config(vec![LOCAL, REMOTE_A, REMOTE_B])));

        let handle = io.spawn_search_all(track(), "Band".into(), "".into(), "Song".into());
        assert!(handle.wait_for_complete(Duration::from_secs(5)).await);

        let texts: Vec<_> = handle.drain_results().iter().map(LyricData::text).collect();
        assert_eq!(texts, vec!["same", "first", "second"]);
        assert_eq!(local.loads.load(Ordering::SeqCst), 0);
        assert_eq!(handle.kind(), UpdateKind::ManualSearch);
    }

    #[tokio::test]
    async fn test_process_available_update() {
        let io = io(SourceRegistry::new(), config(Vec::new()));
        let handle = auto_handle();
        assert!(io.process_available_lyric_update(&handle).is_none());

        handle.set_started();
        handle.set_result(lyrics_with_text("first"), false);
        handle.set_result(lyrics_with_text("second"), false);
        let mut texts = Vec::new();
        while let Some(lyrics) = io.process_available_lyric_update(&handle) {
            texts.push(lyrics.text());
        }
        assert_eq!(texts, vec!["first", "second"]);

        handle.set_result(lyrics_with_text("third"), true);
        assert_eq!(io.process_available_lyric_update(&handle).unwrap().text(), "third");
        assert!(io.process_available_lyric_update(&handle).is_none());
        assert_eq!(handle.status(), crate::update::handle::Status::Closed);
    }

    fn lyrics_with_text(text: &str) -> LyricData {
        LyricData {
            lines: vec![crate::lyrics::data::LyricDataLine::untimed(text)],
            ..Default::default()
        }
    }

    #[test]
    fn test_begin_edit_is_complete() {
        let io = io(SourceRegistry::new(), config(Vec::new()));
        let lyrics = LyricData {
            title: "Edited".into(),
            ..Default::default()
        };
        let handle = io.begin_edit(track(), lyrics);
        assert_eq!(handle.kind(), UpdateKind::Edit);
        assert!(handle.is_complete());
        assert_eq!(handle.get_result().unwrap().title, "Edited");
    }

    #[tokio::test]
    async fn test_autosave_only_synced() {
        let local = Arc::new(FakeLocal::new(LOCAL, None));
        let mut registry = SourceRegistry::new();
        registry.register_local(local.clone());
        registry.register_remote(Arc::new(FakeRemote::new(REMOTE_A, &["untimed"])));
        registry.register_remote(Arc::new(FakeRemote::new(REMOTE_B, &["[00:01.00]timed"])));

        let mut cfg = config(vec![REMOTE_A]);
        cfg.saving.save_source = LOCAL;
        cfg.saving.autosave = AutoSavePolicy::OnlySynced;
        let untimed_io = io(registry.clone(), cfg.clone());
        let handle = auto_handle();
        untimed_io.search_for_lyrics(&handle, false).await;
        assert_eq!(local.saves.load(Ordering::SeqCst), 0);

        cfg.search.active_sources = vec![REMOTE_B];
        let timed_io = io(registry, cfg);
        let handle = auto_handle();
        timed_io.search_for_lyrics(&handle, false).await;
        assert_eq!(local.saves.load(Ordering::SeqCst), 1);
        let result = handle.get_result().unwrap();
        assert_eq!(result.source_id, LOCAL);
    }
}
