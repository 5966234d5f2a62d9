use super::{AutoSavePolicy, Config, NetworkConfig, SavingConfig, SearchConfig};
use crate::sources::{database, localfiles, lrclib, lyricsovh, tags};

pub fn defaults() -> Config {
    Config {
        search: search(),
        saving: saving(),
        network: network(),
    }
}

pub fn search() -> SearchConfig {
    SearchConfig {
        active_sources: vec![localfiles::ID, tags::ID, database::ID, lrclib::ID, lyricsovh::ID],
        tags: ["LYRICS", "SYNCEDLYRICS", "UNSYNCEDLYRICS", "UNSYNCED LYRICS"]
            .map(String::from)
            .to_vec(),
        exclude_trailing_brackets: true,
        musixmatch_token: String::new(),
    }
}

pub fn saving() -> SavingConfig {
    let data_dir = super::data_dir();
    SavingConfig {
        save_source: localfiles::ID,
        autosave: AutoSavePolicy::OnlySynced,
        directory: data_dir.join("lyrics"),
        database: data_dir.join("lyrics.sqlite3"),
    }
}

pub fn network() -> NetworkConfig {
    NetworkConfig {
        timeout_secs: 10,
        user_agent: concat!("lyricsync/", env!("CARGO_PKG_VERSION")).to_string(),
        max_concurrent_searches: 4,
    }
}
