//! Structured lyric representation.

use crate::sources::SourceId;

/// Raw provider output, before parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricDataRaw {
    pub source_id: SourceId,
    /// Where the text came from: a file path, a database key or a URL.
    pub persistent_storage_path: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    /// Provider-specific id for sources that need a follow-up lookup.
    /// Empty when `text` is already complete.
    pub lookup_id: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricDataLine {
    pub text: String,
    /// Seconds from the start of the track.
    pub timestamp: Option<f64>,
}

impl LyricDataLine {
    pub fn untimed(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: None,
        }
    }

    pub fn timed(text: impl Into<String>, timestamp: f64) -> Self {
        Self {
            text: text.into(),
            timestamp: Some(timestamp),
        }
    }
}

/// Parsed lyrics for one track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LyricData {
    pub source_id: SourceId,
    pub persistent_storage_path: String,
    pub artist: String,
    pub album: String,
    pub title: String,
    /// Metadata tag lines (`[ar:...]`, `[offset:...]`, ...) as found in the source text.
    pub tags: Vec<String>,
    /// Seconds subtracted from every line timestamp, from an `[offset:]` tag.
    pub timestamp_offset: f64,
    pub lines: Vec<LyricDataLine>,
}

/// Where a timestamped view should be scrolled to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollPosition {
    /// Index of the line currently being sung; -1 before the first line.
    pub active_line: isize,
    /// Progress from the active line towards the next one, in `[0, 1]`.
    pub next_line_scroll_factor: f64,
}

impl LyricData {
    /// Empty lyrics carrying the identity fields of `raw`.
    pub fn from_raw_metadata(raw: &LyricDataRaw) -> Self {
        Self {
            source_id: raw.source_id,
            persistent_storage_path: raw.persistent_storage_path.clone(),
            artist: raw.artist.clone(),
            album: raw.album.clone(),
            title: raw.title.clone(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|line| line.text.is_empty())
    }

    pub fn is_timestamped(&self) -> bool {
        self.lines.iter().any(|line| line.timestamp.is_some())
    }

    /// Timestamp of `lines[index]` with the offset applied.
    ///
    /// Out-of-range indices are answered with sentinels: `0` before the first
    /// line and `+inf` past the last one. Untimed lines are never reached.
    pub fn line_timestamp(&self, index: isize) -> f64 {
        if index < 0 {
            return 0.0;
        }
        match self.lines.get(index as usize) {
            Some(line) => line
                .timestamp
                .map_or(f64::INFINITY, |t| t - self.timestamp_offset),
            None => f64::INFINITY,
        }
    }

    /// Line texts joined with CRLF, without any timestamps.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.text.as_str())
            .collect::<Vec<_>>()
            .join("\r\n")
    }

    pub fn scroll_position(&self, current_time: f64, scroll_duration: f64) -> ScrollPosition {
        let count = self.lines.len() as isize;
        let mut active_line = -1;
        while active_line + 1 < count && current_time > self.line_timestamp(active_line + 1) {
            active_line += 1;
        }

        let active_time = self.line_timestamp(active_line);
        let next_time = self.line_timestamp(active_line + 1);
        let scroll_start = active_time.max(next_time - scroll_duration);

        ScrollPosition {
            active_line,
            next_line_scroll_factor: lerp_inverse_clamped(scroll_start, next_time, current_time),
        }
    }

    /// How far through untimed lyrics the view should be, in `[0, 1]`.
    pub fn untimed_scroll_fraction(position: f64, duration: f64) -> f64 {
        if duration <= 0.0 {
            return 0.0;
        }
        (position / duration).clamp(0.0, 1.0)
    }
}

fn lerp_inverse_clamped(start: f64, end: f64, value: f64) -> f64 {
    if !end.is_finite() {
        return 0.0;
    }
    if end <= start {
        return if value >= end { 1.0 } else { 0.0 };
    }
    ((value - start) / (end - start)).clamp(0.0, 1.0)
}
