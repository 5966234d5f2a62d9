//! LRC format parser and serializer
//!
//! Parses synchronized lyrics in LRC format:
//! [mm:ss.xx] Lyrics line here
//!
//! Example:
//! [ar:Artist Name]
//! [00:12.34]Hello world
//! [00:15.00][00:45.00]Repeated line at two times
//!
//! Lines sharing a timestamp are merged into one compound line joined with
//! CRLF. Anything that does not parse as a timestamp stays as plain text, so
//! parsing never fails.

use super::data::{LyricData, LyricDataLine, LyricDataRaw};

/// Metadata tags recognised at the start of a line, e.g. `[ar:Artist]`.
const TAG_NAMES: &[&str] = &[
    "ar", "al", "ti", "au", "by", "re", "ve", "length", "offset", "id", "#",
];

const LINE_BREAK: &str = "\r\n";

/// Parse raw provider text into structured lyrics.
pub fn parse(raw: &LyricDataRaw) -> LyricData {
    let mut data = LyricData::from_raw_metadata(raw);
    let mut body: Vec<(Vec<f64>, &str)> = Vec::new();

    for line in raw.text.lines() {
        if let Some((name, value)) = parse_tag(line) {
            apply_tag(&mut data, name, value);
            data.tags.push(line.trim().to_string());
            continue;
        }
        body.push(split_timestamps(line));
    }

    if body.iter().all(|(stamps, _)| stamps.is_empty()) {
        data.lines = untimed_lines(body.into_iter().map(|(_, text)| text));
    } else {
        data.lines = timed_lines(body);
    }
    data
}

/// Re-serialize structured lyrics into LRC text.
///
/// Lines with identical text are compacted into a single line carrying several
/// timestamps. `parse(shrink(parse(x)))` yields the same structure as `parse(x)`.
pub fn shrink(data: &LyricData) -> String {
    let mut out: Vec<String> = data.tags.clone();

    if !data.is_timestamped() {
        out.extend(data.lines.iter().map(|line| line.text.clone()));
        return out.join("\n");
    }

    // Group by text, keeping the order in which each text first appears.
    let mut groups: Vec<(&str, Vec<f64>)> = Vec::new();
    for line in &data.lines {
        let timestamp = line.timestamp.unwrap_or(0.0);
        match groups.iter_mut().find(|(text, _)| *text == line.text) {
            Some((_, stamps)) => stamps.push(timestamp),
            None => groups.push((line.text.as_str(), vec![timestamp])),
        }
    }

    for (text, stamps) in groups {
        let prefix: String = stamps.iter().map(|t| print_timestamp(*t)).collect();
        for sub_line in text.split('\n') {
            let sub_line = sub_line.strip_suffix('\r').unwrap_or(sub_line);
            out.push(format!("{prefix}{sub_line}"));
        }
    }
    out.join("\n")
}

/// True if the line is a metadata tag such as `[ti:Title]`.
pub fn is_tag_line(line: &str) -> bool {
    parse_tag(line).is_some()
}

/// Index of the first physical line holding actual lyrics (not blank, not a tag).
pub fn first_lyric_line_index(text: &str) -> Option<usize> {
    text.lines()
        .position(|line| !line.trim().is_empty() && !is_tag_line(line))
}

/// Parse `[mm:ss.xx]` into seconds.
pub fn try_parse_6digit_timestamp(tag: &str) -> Option<f64> {
    parse_timestamp_with_fraction(tag, 2)
}

/// Parse `[mm:ss.xxx]` into seconds.
pub fn try_parse_7digit_timestamp(tag: &str) -> Option<f64> {
    parse_timestamp_with_fraction(tag, 3)
}

/// Format seconds as `[mm:ss.xx]`, truncating to centiseconds.
pub fn print_6digit_timestamp(seconds: f64) -> String {
    let millis = whole_millis(seconds);
    let centis = millis / 10;
    format!(
        "[{:02}:{:02}.{:02}]",
        centis / 6000,
        (centis / 100) % 60,
        centis % 100
    )
}

/// Format seconds as `[mm:ss.xxx]`.
pub fn print_7digit_timestamp(seconds: f64) -> String {
    let millis = whole_millis(seconds);
    format!(
        "[{:02}:{:02}.{:03}]",
        millis / 60_000,
        (millis / 1000) % 60,
        millis % 1000
    )
}

/// Set the timestamp of a single line to `seconds`, replacing the leading
/// timestamp if the line already has one.
pub fn stamp_line(line: &str, seconds: f64) -> String {
    let rest = leading_timestamp(line)
        .map(|(_, len)| &line[len..])
        .unwrap_or(line);
    format!("{}{}", print_6digit_timestamp(seconds), rest)
}

fn parse_tag(line: &str) -> Option<(&str, &str)> {
    let inner = line.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (name, value) = inner.split_once(':')?;
    let name = name.trim();
    TAG_NAMES
        .iter()
        .any(|tag| tag.eq_ignore_ascii_case(name))
        .then_some((name, value.trim()))
}

fn apply_tag(data: &mut LyricData, name: &str, value: &str) {
    let field = match name.to_ascii_lowercase().as_str() {
        "ar" => &mut data.artist,
        "al" => &mut data.album,
        "ti" => &mut data.title,
        "offset" => {
            let value = value.strip_prefix('+').unwrap_or(value);
            if let Ok(millis) = value.parse::<i64>() {
                data.timestamp_offset = millis as f64 / 1000.0;
            }
            return;
        }
        _ => return,
    };
    if field.is_empty() {
        *field = value.to_string();
    }
}

/// Split the leading timestamp tags off a line.
fn split_timestamps(line: &str) -> (Vec<f64>, &str) {
    let mut stamps = Vec::new();
    let mut rest = line;
    while let Some((seconds, len)) = leading_timestamp(rest) {
        stamps.push(seconds);
        rest = &rest[len..];
    }
    (stamps, rest)
}

/// A timestamp tag at the very start of `text`, with its byte length.
fn leading_timestamp(text: &str) -> Option<(f64, usize)> {
    if !text.starts_with('[') {
        return None;
    }
    let end = text.find(']')? + 1;
    let tag = &text[..end];
    try_parse_6digit_timestamp(tag)
        .or_else(|| try_parse_7digit_timestamp(tag))
        .map(|seconds| (seconds, end))
}

fn parse_timestamp_with_fraction(tag: &str, fraction_digits: usize) -> Option<f64> {
    let tag = tag.trim();
    let inner = tag.strip_prefix('[').unwrap_or(tag);
    let inner = inner.strip_suffix(']').unwrap_or(inner);

    let (minutes, rest) = inner.split_once(':')?;
    let (seconds, fraction) = rest.split_once('.')?;

    let all_digits = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(minutes)
        || !all_digits(seconds)
        || !all_digits(fraction)
        || seconds.len() != 2
        || fraction.len() != fraction_digits
    {
        return None;
    }

    let minutes: u32 = minutes.parse().ok()?;
    let seconds: u32 = seconds.parse().ok()?;
    let fraction: u32 = fraction.parse().ok()?;
    if seconds >= 60 {
        return None;
    }

    Some(
        f64::from(minutes) * 60.0
            + f64::from(seconds)
            + f64::from(fraction) / 10f64.powi(fraction_digits as i32),
    )
}

/// Round away float noise so that `12.34` is 12340ms and not 12339ms.
fn whole_millis(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}

fn print_timestamp(seconds: f64) -> String {
    if whole_millis(seconds) % 10 == 0 {
        print_6digit_timestamp(seconds)
    } else {
        print_7digit_timestamp(seconds)
    }
}

fn untimed_lines<'a>(texts: impl Iterator<Item = &'a str>) -> Vec<LyricDataLine> {
    let mut lines: Vec<LyricDataLine> = texts.map(LyricDataLine::untimed).collect();

    // Blank lines only matter between stanzas.
    while lines.last().is_some_and(|l| l.text.trim().is_empty()) {
        lines.pop();
    }
    let leading = lines
        .iter()
        .take_while(|l| l.text.trim().is_empty())
        .count();
    lines.drain(..leading);
    lines
}

fn timed_lines(body: Vec<(Vec<f64>, &str)>) -> Vec<LyricDataLine> {
    let mut entries: Vec<(f64, String)> = Vec::new();
    // Entries produced by the most recent timestamped physical line.
    let mut current: Vec<usize> = Vec::new();

    for (stamps, text) in body {
        if stamps.is_empty() {
            if text.trim().is_empty() {
                continue;
            }
            if current.is_empty() {
                entries.push((0.0, text.to_string()));
                current.push(entries.len() - 1);
                continue;
            }
            // Continuation of the previous timestamped line.
            for &i in &current {
                let entry = &mut entries[i].1;
                if !entry.is_empty() {
                    entry.push_str(LINE_BREAK);
                }
                entry.push_str(text);
            }
            continue;
        }

        current.clear();
        for seconds in stamps {
            entries.push((seconds, text.to_string()));
            current.push(entries.len() - 1);
        }
    }

    // Stable, so same-timestamp lines keep their input order.
    entries.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut lines: Vec<LyricDataLine> = Vec::with_capacity(entries.len());
    for (seconds, text) in entries {
        match lines.last_mut() {
            Some(prev) if prev.timestamp == Some(seconds) => {
                prev.text.push_str(LINE_BREAK);
                prev.text.push_str(&text);
            }
            _ => lines.push(LyricDataLine::timed(text, seconds)),
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_text(text: &str) -> LyricData {
        parse(&LyricDataRaw {
            text: text.to_string(),
            ..LyricDataRaw::default()
        })
    }

    fn reparse(data: &LyricData) -> LyricData {
        parse_text(&shrink(data))
    }

    fn assert_same_structure(a: &LyricData, b: &LyricData) {
        assert_eq!(a.lines, b.lines);
        assert_eq!(a.tags, b.tags);
        assert_eq!(a.timestamp_offset, b.timestamp_offset);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(try_parse_6digit_timestamp("[00:12.34]"), Some(12.34));
        assert_eq!(try_parse_6digit_timestamp("01:30.00"), Some(90.0));
        assert_eq!(try_parse_7digit_timestamp("[00:12.345]"), Some(12.345));
        assert_eq!(try_parse_6digit_timestamp("[123:00.50]"), Some(7380.5));
        assert_eq!(try_parse_6digit_timestamp("[00:12.345]"), None);
        assert_eq!(try_parse_7digit_timestamp("[00:12.34]"), None);
        assert_eq!(try_parse_6digit_timestamp("[00:75.00]"), None);
        assert_eq!(try_parse_6digit_timestamp("[aa:12.34]"), None);
        assert_eq!(try_parse_6digit_timestamp("[-1:12.34]"), None);
        assert_eq!(try_parse_6digit_timestamp("[00:12:34]"), None);
    }

    #[test]
    fn test_print_timestamp_truncates() {
        assert_eq!(print_6digit_timestamp(12.34), "[00:12.34]");
        assert_eq!(print_6digit_timestamp(12.349), "[00:12.34]");
        assert_eq!(print_6digit_timestamp(61.5), "[01:01.50]");
        assert_eq!(print_6digit_timestamp(0.0), "[00:00.00]");
        assert_eq!(print_7digit_timestamp(12.345), "[00:12.345]");
    }

    #[test]
    fn test_parse_lrc() {
        let lrc = r#"
[ti:Test Song]
[ar:Test Artist]
[00:12.34]First line
[00:15.00]Second line
"#;
        let parsed = parse_text(lrc);
        assert!(parsed.is_timestamped());
        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(parsed.lines[0].timestamp, Some(12.34));
        assert_eq!(parsed.lines[0].text, "First line");
        assert_eq!(parsed.title, "Test Song");
        assert_eq!(parsed.artist, "Test Artist");
        assert_eq!(parsed.tags, vec!["[ti:Test Song]", "[ar:Test Artist]"]);
    }

    #[test]
    fn test_tags_do_not_override_source_metadata() {
        let parsed = parse(&LyricDataRaw {
            artist: "From Source".to_string(),
            text: "[ar:From Tag]\n[00:01.00]x".to_string(),
            ..LyricDataRaw::default()
        });
        assert_eq!(parsed.artist, "From Source");
    }

    #[test]
    fn test_compound_line_merge() {
        let parsed = parse_text("[00:10.00]Hello\n[00:10.00]World");
        assert_eq!(parsed.lines, vec![LyricDataLine::timed("Hello\r\nWorld", 10.0)]);
    }

    #[test]
    fn test_multi_tag_split() {
        let parsed = parse_text("[00:05.00][00:10.00]Same text");
        assert_eq!(
            parsed.lines,
            vec![
                LyricDataLine::timed("Same text", 5.0),
                LyricDataLine::timed("Same text", 10.0),
            ]
        );
    }

    #[test]
    fn test_lines_sorted_by_timestamp() {
        let parsed = parse_text("[00:20.00]b\n[00:05.00]a\n[00:05.00][00:30.00]c");
        let stamps: Vec<_> = parsed.lines.iter().map(|l| l.timestamp).collect();
        assert_eq!(stamps, vec![Some(5.0), Some(20.0), Some(30.0)]);
        assert_eq!(parsed.lines[0].text, "a\r\nc");
    }

    #[test]
    fn test_continuation_lines_join_previous_timestamp() {
        let parsed = parse_text("[00:12.34]First line\n[00:20.00]\nLine A\nLine B");
        assert_eq!(parsed.lines.len(), 2);
        assert_eq!(parsed.lines[1], LyricDataLine::timed("Line A\r\nLine B", 20.0));
    }

    #[test]
    fn test_malformed_tag_is_plain_text() {
        let parsed = parse_text("[99:99:99]Weird");
        assert!(!parsed.is_timestamped());
        assert_eq!(parsed.lines, vec![LyricDataLine::untimed("[99:99:99]Weird")]);
    }

    #[test]
    fn test_malformed_tag_after_valid_one_stays_in_text() {
        let parsed = parse_text("[00:01.00][bad]text");
        assert_eq!(parsed.lines, vec![LyricDataLine::timed("[bad]text", 1.0)]);
    }

    #[test]
    fn test_untimed_keeps_stanza_breaks() {
        let parsed = parse_text("\n\nVerse one\n\nVerse two\n\n");
        let texts: Vec<_> = parsed.lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["Verse one", "", "Verse two"]);
    }

    #[test]
    fn test_crlf_input() {
        let parsed = parse_text("[00:01.00]a\r\n[00:02.00]b\r\n");
        assert_eq!(parsed.lines[0].text, "a");
        assert_eq!(parsed.lines[1].text, "b");
    }

    #[test]
    fn test_offset_tag() {
        let parsed = parse_text("[offset:+500]\n[00:10.00]x");
        assert_eq!(parsed.timestamp_offset, 0.5);
        assert_eq!(parsed.line_timestamp(0), 9.5);
    }

    #[test]
    fn test_is_tag_line() {
        assert!(is_tag_line("[ar:Someone]"));
        assert!(is_tag_line("  [length: 03:20]"));
        assert!(is_tag_line("[offset:-100]"));
        assert!(!is_tag_line("[00:12.34]Lyrics"));
        assert!(!is_tag_line("[ar:Someone] trailing"));
        assert!(!is_tag_line("plain"));
        assert!(!is_tag_line(""));
    }

    #[test]
    fn test_first_lyric_line_index() {
        assert_eq!(first_lyric_line_index("[ar:x]\n[ti:y]\n\n[00:01.00]go"), Some(3));
        assert_eq!(first_lyric_line_index("[ar:x]"), None);
    }

    #[test]
    fn test_stamp_line() {
        assert_eq!(stamp_line("Hello", 1.5), "[00:01.50]Hello");
        assert_eq!(stamp_line("[00:09.99]Hello", 61.0), "[01:01.00]Hello");
        assert_eq!(stamp_line("[00:09.999]Hello", 2.0), "[00:02.00]Hello");
        assert_eq!(stamp_line("[ar:x]", 2.0), "[00:02.00][ar:x]");
    }

    #[test]
    fn test_shrink_compacts_repeated_lines() {
        let parsed = parse_text("[00:15.00]Chorus\n[00:20.00]Verse\n[00:45.00]Chorus");
        assert_eq!(shrink(&parsed), "[00:15.00][00:45.00]Chorus\n[00:20.00]Verse");
    }

    #[test]
    fn test_round_trip_timestamped() {
        let inputs = [
            "[ar:Artist Name]\n[al:Album Name]\n[ti:Track Title]\n[00:12.34]First line\n[00:15.00][00:45.00]Repeated line at two times\n[00:20.00]\nLine A\nLine B",
            "[00:10.00]Hello\n[00:10.00]World\n[00:11.00]Hello\n[00:11.00]World",
            "[00:01.234]millis\n[00:02.50]centis\n[00:02.50]",
            "leading untimed\n[00:03.00]x\n[00:01.00]y",
            "[offset:-250]\n[00:01.00]a\n\n[00:02.00]b",
        ];
        for input in inputs {
            let first = parse_text(input);
            assert_same_structure(&first, &reparse(&first));
        }
    }

    #[test]
    fn test_round_trip_untimed() {
        let inputs = ["One\nTwo\n\nThree", "[ti:Title]\nOnly line\n", "", "\n\n"];
        for input in inputs {
            let first = parse_text(input);
            assert!(!first.is_timestamped());
            assert_same_structure(&first, &reparse(&first));
        }
    }
}
