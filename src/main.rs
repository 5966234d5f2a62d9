mod config;
mod error;
mod lyrics;
mod net;
mod sources;
mod storage;
mod track;
mod update;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::lyrics::{LyricData, LyricDataRaw, parser};
use crate::sources::{SourceId, SourceRegistry, registry};
use crate::track::{Track, TrackInfo};
use crate::update::{LyricIo, LyricUpdateHandle, UpdateKind};

const SCROLL_DURATION_SECS: f64 = 0.5;

#[derive(Debug, Parser)]
#[command(name = "lyricsync", version, about = "Find, parse and store song lyrics")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct TrackArgs {
    /// Track location (file path or URL).
    location: String,
    #[arg(long, default_value = "")]
    artist: String,
    #[arg(long, default_value = "")]
    album: String,
    #[arg(long, default_value = "")]
    title: String,
}

impl TrackArgs {
    fn track(&self) -> Arc<Track> {
        Arc::new(Track::new(
            self.location.clone(),
            TrackInfo::from_basic(&self.artist, &self.album, &self.title),
        ))
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search the active sources for a track's lyrics and print the best match.
    Search {
        #[command(flatten)]
        track: TrackArgs,
        /// Only look at lyrics stored on this machine.
        #[arg(long)]
        local_only: bool,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Ask every remote source and print each distinct result.
    SearchAll {
        #[arg(long, default_value = "")]
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
        #[arg(long)]
        title: String,
        #[arg(long, default_value_t = 30)]
        timeout: u64,
    },
    /// Parse an LRC or plain-text file and print its structure.
    Parse {
        file: PathBuf,
        /// Print the compacted LRC text instead.
        #[arg(long)]
        shrink: bool,
        /// Also show which line is active at this playback time (seconds).
        #[arg(long)]
        at: Option<f64>,
        /// Track length in seconds, used to place `--at` in untimed lyrics.
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Set the timestamp of one line in an LRC file and print the result.
    Stamp {
        #[command(flatten)]
        track: TrackArgs,
        file: PathBuf,
        /// Playback time in seconds to stamp the line with.
        #[arg(long)]
        at: f64,
        /// Zero-based physical line to stamp. Defaults to the first lyric line.
        #[arg(long)]
        line: Option<usize>,
        /// Store the edited lyrics in the configured save source.
        #[arg(long)]
        save: bool,
    },
    /// Print where a track's lyrics are stored on disk.
    Path {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// Store lyrics from a file for a track in the configured save source.
    Save {
        #[command(flatten)]
        track: TrackArgs,
        file: PathBuf,
        /// Replace lyrics that are already stored.
        #[arg(long)]
        overwrite: bool,
    },
    /// Delete the locally stored lyrics for a track.
    Delete {
        #[command(flatten)]
        track: TrackArgs,
    },
    /// List the registered lyric sources.
    Sources,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;
    let http = net::HttpClient::new(&cfg.network)?;
    if !registry::install(SourceRegistry::builtin(&cfg, &http)) {
        tracing::warn!("Source registry was already installed");
    }
    let registry = registry::global().context("source registry unavailable")?;
    let io = Arc::new(LyricIo::new(registry, Arc::new(cfg)));

    match cli.command {
        Command::Search {
            track,
            local_only,
            timeout,
        } => {
            let handle = io.spawn_search(UpdateKind::AutoSearch, track.track(), local_only);
            if !wait_with_progress(&handle, timeout).await {
                anyhow::bail!("search timed out after {timeout}s");
            }
            if !handle.has_result() {
                anyhow::bail!("search ended without a result");
            }
            match io.process_available_lyric_update(&handle) {
                Some(lyrics) if !lyrics.is_empty() => print_lyrics(&io, &lyrics),
                // Only a miss on remote sources is final.
                _ if handle.has_searched_remote_sources() => println!("No lyrics found."),
                _ => println!("No lyrics stored locally; remote sources were not asked."),
            }
        }
        Command::SearchAll {
            artist,
            album,
            title,
            timeout,
        } => {
            let track = Arc::new(Track::new(
                String::new(),
                TrackInfo::from_basic(&artist, &album, &title),
            ));
            let handle = io.spawn_search_all(track, artist, album, title);
            let completed = wait_with_progress(&handle, timeout).await;
            let results = handle.drain_results();
            for (i, lyrics) in results.iter().enumerate() {
                println!("=== Result {} ===", i + 1);
                print_lyrics(&io, lyrics);
                println!();
            }
            if results.is_empty() {
                println!("No lyrics found.");
            }
            if !completed {
                handle.abort();
                anyhow::bail!("search timed out after {timeout}s");
            }
            handle.close();
        }
        Command::Parse {
            file,
            shrink,
            at,
            duration,
        } => {
            let lyrics = read_lyrics_file(&file).await?;
            if shrink {
                println!("{}", parser::shrink(&lyrics));
            } else {
                print_structure(&lyrics);
            }
            match (at, duration) {
                (Some(time), _) if lyrics.is_timestamped() => {
                    let pos = lyrics.scroll_position(time, SCROLL_DURATION_SECS);
                    println!(
                        "at {time:.2}s: line {} ({:.0}% towards the next)",
                        pos.active_line,
                        pos.next_line_scroll_factor * 100.0
                    );
                }
                (Some(time), Some(duration)) => {
                    let fraction = LyricData::untimed_scroll_fraction(time, duration);
                    println!("at {time:.2}s: {:.0}% through the lyrics", fraction * 100.0);
                }
                (Some(_), None) => {
                    eprintln!("Lyrics are not synced; pass --duration to place --at");
                }
                (None, _) => {}
            }
        }
        Command::Stamp {
            track,
            file,
            at,
            line,
            save,
        } => {
            let text = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("read {}", file.display()))?;
            let index = line
                .or_else(|| parser::first_lyric_line_index(&text))
                .context("file has no lyric lines to stamp")?;
            let stamped = stamp_physical_line(&text, index, at)
                .with_context(|| format!("{} has no line {index}", file.display()))?;

            let edited = parse_text(stamped);
            let handle = io.begin_edit(track.track(), edited);
            let mut lyrics = handle.get_result().unwrap_or_default();
            println!("{}", parser::shrink(&lyrics));
            if save {
                let abort = CancellationToken::new();
                if !io.save_lyrics(handle.track(), &mut lyrics, true, &abort).await {
                    anyhow::bail!("edited lyrics were not saved");
                }
                eprintln!("Saved to {}", lyrics.persistent_storage_path);
            }
        }
        Command::Path { track } => {
            let handle = io.spawn_search(UpdateKind::ManualSearch, track.track(), true);
            if !handle.wait_for_complete(Duration::from_secs(30)).await {
                handle.abort();
                anyhow::bail!("local search timed out");
            }
            let found = handle.get_result().filter(|lyrics| !lyrics.is_empty());
            // Nothing stored yet: report where a save would go.
            let (source_id, lyrics) = match found {
                Some(lyrics) => (lyrics.source_id, lyrics),
                None => (io.config().saving.save_source, LyricData::default()),
            };
            let source = io
                .registry()
                .get(source_id)
                .with_context(|| format!("unknown lyric source {source_id}"))?;
            match source.file_path(handle.track(), &lyrics)? {
                Some(path) if lyrics.is_empty() => println!("{} (not saved yet)", path.display()),
                Some(path) => println!("{}", path.display()),
                None => println!("{} keeps no lyric files", source.friendly_name()),
            }
        }
        Command::Save {
            track,
            file,
            overwrite,
        } => {
            let track = track.track();
            let mut lyrics = read_lyrics_file(&file).await?;
            let abort = CancellationToken::new();
            if io.save_lyrics(&track, &mut lyrics, overwrite, &abort).await {
                println!("Saved to {}", lyrics.persistent_storage_path);
            } else {
                anyhow::bail!("lyrics were not saved (already stored? pass --overwrite)");
            }
        }
        Command::Delete { track } => {
            let handle = io.spawn_search(UpdateKind::ManualSearch, track.track(), true);
            if !handle.wait_for_complete(Duration::from_secs(30)).await {
                handle.abort();
                anyhow::bail!("local search timed out");
            }
            let lyrics = handle.get_result().unwrap_or_default();
            if lyrics.is_empty() {
                println!("No stored lyrics found.");
                return Ok(());
            }
            let removed = io
                .delete_saved_lyrics(handle.track(), &lyrics)
                .await
                .context("delete lyrics")?;
            if removed {
                println!("Deleted {}", lyrics.persistent_storage_path);
            } else {
                println!("Nothing was deleted.");
            }
        }
        Command::Sources => {
            let active = io.config().active_sources();
            let registry = io.registry();
            for source in registry.all_ids().into_iter().filter_map(|id| registry.get(id)) {
                let position = active
                    .iter()
                    .position(|id| *id == source.id())
                    .map(|i| format!("#{}", i + 1))
                    .unwrap_or_else(|| "off".to_string());
                let kind = if source.is_local() { "local" } else { "remote" };
                println!(
                    "{:>4}  {:<6}  {}  {}",
                    position,
                    kind,
                    source.id(),
                    source.friendly_name()
                );
            }
        }
    }

    Ok(())
}

/// Wait for the handle, echoing progress changes to stderr.
async fn wait_with_progress(handle: &LyricUpdateHandle, timeout_secs: u64) -> bool {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(timeout_secs);
    let mut last_progress = String::new();
    loop {
        if handle.wait_for_complete(Duration::from_millis(200)).await {
            return true;
        }
        let progress = handle.progress();
        if progress != last_progress {
            eprintln!("{progress}");
            last_progress = progress;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
    }
}

async fn read_lyrics_file(path: &Path) -> anyhow::Result<LyricData> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read {}", path.display()))?;
    Ok(parse_text(text))
}

fn parse_text(text: String) -> LyricData {
    parser::parse(&LyricDataRaw {
        source_id: SourceId::NONE,
        text,
        ..Default::default()
    })
}

/// `text` with physical line `index` stamped at `seconds`, or `None` if the
/// line does not exist.
fn stamp_physical_line(text: &str, index: usize, seconds: f64) -> Option<String> {
    let mut lines: Vec<String> = text.lines().map(str::to_string).collect();
    let line = lines.get_mut(index)?;
    *line = parser::stamp_line(line, seconds);
    Some(lines.join("\n"))
}

fn print_lyrics(io: &LyricIo, lyrics: &LyricData) {
    let source = io
        .registry()
        .get(lyrics.source_id)
        .map(|src| src.friendly_name())
        .unwrap_or("unknown source");
    eprintln!(
        "{} - {} ({source}{})",
        lyrics.artist,
        lyrics.title,
        if lyrics.is_timestamped() { ", synced" } else { "" }
    );
    if lyrics.is_timestamped() {
        println!("{}", parser::shrink(lyrics));
    } else {
        println!("{}", lyrics.text());
    }
}

fn print_structure(lyrics: &LyricData) {
    for tag in &lyrics.tags {
        println!("tag     {tag}");
    }
    if lyrics.timestamp_offset != 0.0 {
        println!("offset  {:+.3}s", lyrics.timestamp_offset);
    }
    for (i, line) in lyrics.lines.iter().enumerate() {
        let time = match line.timestamp {
            Some(_) => format!("{:>9.3}", lyrics.line_timestamp(i as isize)),
            None => format!("{:>9}", "-"),
        };
        for (j, sub_line) in line.text.split("\r\n").enumerate() {
            if j == 0 {
                println!("{time}  {sub_line}");
            } else {
                println!("{:>9}  {sub_line}", "");
            }
        }
    }
}
