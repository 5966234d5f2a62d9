//! Lyric updates: background searches, edits and persistence.

pub mod handle;
pub mod persist;
pub mod search;

pub use handle::{LyricUpdateHandle, UpdateKind};
pub use search::LyricIo;
