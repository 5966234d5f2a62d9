//! Lyrics data model and LRC format handling
//!
//! This module provides:
//! - Raw and parsed lyric data structures with timing queries
//! - LRC format parser/serializer for synchronized lyrics

pub mod data;
pub mod parser;

pub use data::{LyricData, LyricDataRaw};
