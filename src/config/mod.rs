use crate::sources::SourceId;
use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub mod defaults;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub search: SearchConfig,
    pub saving: SavingConfig,
    pub network: NetworkConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Sources to search, in priority order.
    pub active_sources: Vec<SourceId>,
    /// Metadata tag names scanned for embedded lyrics.
    pub tags: Vec<String>,
    /// Strip trailing "(Live)"-style suffixes from metadata before searching remote sources.
    pub exclude_trailing_brackets: bool,
    /// User token for the Musixmatch desktop API. Empty disables that source.
    pub musixmatch_token: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoSavePolicy {
    Never,
    All,
    OnlySynced,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SavingConfig {
    /// Local source that edits and autosaves are written to.
    pub save_source: SourceId,
    pub autosave: AutoSavePolicy,
    /// Directory used by the local files source.
    pub directory: PathBuf,
    /// SQLite file used by the lyric database source.
    pub database: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Upper bound on searches running at the same time.
    pub max_concurrent_searches: usize,
}

impl Config {
    /// Configured sources in priority order, with the save source appended if
    /// the user left it out.
    pub fn active_sources(&self) -> Vec<SourceId> {
        let mut result = self.search.active_sources.clone();
        if !self.saving.save_source.is_nil() && !result.contains(&self.saving.save_source) {
            result.push(self.saving.save_source);
        }
        result
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        defaults::search()
    }
}

impl Default for SavingConfig {
    fn default() -> Self {
        defaults::saving()
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        defaults::network()
    }
}

pub fn data_dir() -> PathBuf {
    ProjectDirs::from("dev", "lyricsync", "lyricsync")
        .map(|p| p.data_dir().to_path_buf())
        .unwrap_or_else(|| std::env::temp_dir().join("lyricsync"))
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "lyricsync", "lyricsync")
        .context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = defaults::defaults();
        write_config(&path, &cfg)?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

fn write_config(path: &Path, cfg: &Config) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    // The file may hold a provider token.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{localfiles, lrclib};

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let cfg = load(Some(&path)).unwrap();
        assert!(path.exists());
        assert_eq!(cfg.saving.save_source, localfiles::ID);
        assert!(cfg.search.exclude_trailing_brackets);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut cfg = defaults::defaults();
        cfg.search.active_sources = vec![lrclib::ID];
        cfg.search.musixmatch_token = "secret".to_string();
        cfg.saving.autosave = AutoSavePolicy::Never;
        write_config(&path, &cfg).unwrap();

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.search.active_sources, vec![lrclib::ID]);
        assert_eq!(loaded.search.musixmatch_token, "secret");
        assert_eq!(loaded.saving.autosave, AutoSavePolicy::Never);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let cfg: Config = toml::from_str("[network]\ntimeout_secs = 3\n").unwrap();
        assert_eq!(cfg.network.timeout_secs, 3);
        assert_eq!(cfg.network.max_concurrent_searches, 4);
        assert_eq!(cfg.search.tags, defaults::search().tags);
    }

    #[test]
    fn test_active_sources_appends_save_source() {
        let mut cfg = defaults::defaults();
        cfg.search.active_sources = vec![lrclib::ID];
        assert_eq!(cfg.active_sources(), vec![lrclib::ID, localfiles::ID]);

        cfg.search.active_sources = vec![localfiles::ID, lrclib::ID];
        assert_eq!(cfg.active_sources(), vec![localfiles::ID, lrclib::ID]);
    }
}
