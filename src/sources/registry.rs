//! Source registry
//!
//! The process-wide registry is installed once at startup and never changes
//! afterwards, so readers need no locking. Tests build their own
//! [`SourceRegistry`] values instead of touching the global one.

use super::{LocalSource, RemoteSource, Source, SourceId};
use crate::config::Config;
use crate::net::HttpClient;
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL: OnceCell<Arc<SourceRegistry>> = OnceCell::new();

#[derive(Debug, Default, Clone)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in source, configured from `cfg`.
    pub fn builtin(cfg: &Config, http: &HttpClient) -> Self {
        let mut registry = Self::new();
        registry.register_local(Arc::new(super::localfiles::LocalFiles::new(
            cfg.saving.directory.clone(),
        )));
        registry.register_local(Arc::new(super::tags::EmbeddedTags::new(
            cfg.search.tags.clone(),
        )));
        registry.register_local(Arc::new(super::database::LyricDatabase::new(
            cfg.saving.database.clone(),
        )));
        registry.register_remote(Arc::new(super::lrclib::Lrclib::new(http.clone())));
        registry.register_remote(Arc::new(super::lyricsovh::LyricsOvh::new(http.clone())));
        registry.register_remote(Arc::new(super::musixmatch::Musixmatch::new(
            http.clone(),
            cfg.search.musixmatch_token.clone(),
        )));
        registry
    }

    pub fn register(&mut self, source: Source) {
        let id = source.id();
        if self.get(id).is_some() {
            tracing::warn!("Source {id} registered twice, ignoring {}", source.friendly_name());
            return;
        }
        self.sources.push(source);
    }

    pub fn register_local(&mut self, source: Arc<dyn LocalSource>) {
        self.register(Source::Local(source));
    }

    pub fn register_remote(&mut self, source: Arc<dyn RemoteSource>) {
        self.register(Source::Remote(source));
    }

    pub fn get(&self, id: SourceId) -> Option<&Source> {
        self.sources.iter().find(|src| src.id() == id)
    }

    pub fn all_ids(&self) -> Vec<SourceId> {
        self.sources.iter().map(Source::id).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }
}

/// Install the process-wide registry. Returns false if one was already installed.
pub fn install(registry: SourceRegistry) -> bool {
    GLOBAL.set(Arc::new(registry)).is_ok()
}

/// The process-wide registry, if [`install`] has run.
pub fn global() -> Option<Arc<SourceRegistry>> {
    GLOBAL.get().cloned()
}
