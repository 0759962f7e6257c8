//! Line-level extraction rules for downloader and transcoder output.
//!
//! Every function here looks at a single line and keeps no state. A line that
//! matches nothing is reported back as [`DownloaderEvent::LogLine`] /
//! [`TranscoderEvent::LogLine`]; garbled input never fails.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

/// `[download] Destination: <file>`
static DESTINATION_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[download\] Destination:\s*(\S.*?)\s*$").unwrap());

/// `[download]  45.2%`
static PERCENT_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[download\]\s+(\d+(?:\.\d+)?)%").unwrap());

/// `[Merger] Merging formats into "<file>"`, quotes optional.
static MERGE_RULE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\[Merger\] Merging formats into\s+"?([^"]*?)"?\s*$"#).unwrap()
});

/// `[ExtractAudio] Destination: <file>`
static EXTRACT_AUDIO_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[ExtractAudio\] Destination:\s*(\S.*?)\s*$").unwrap());

/// `time=HH:MM:SS.ms` in transcoder status lines.
static TIMESTAMP_RULE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)").unwrap());

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloaderEvent {
    DestinationFound(PathBuf),
    Progress(u8),
    /// Post-processed artifact; supersedes any destination seen before.
    FinalFileFound(PathBuf),
    LogLine(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscoderEvent {
    Progress(u8),
    LogLine(String),
}

pub fn parse_downloader_line(line: &str) -> DownloaderEvent {
    if let Some(path) = capture_path(&MERGE_RULE, line) {
        return DownloaderEvent::FinalFileFound(path);
    }
    if let Some(path) = capture_path(&EXTRACT_AUDIO_RULE, line) {
        return DownloaderEvent::FinalFileFound(path);
    }
    if let Some(path) = capture_path(&DESTINATION_RULE, line) {
        return DownloaderEvent::DestinationFound(path);
    }
    if let Some(percent) = parse_percent(line) {
        return DownloaderEvent::Progress(percent);
    }
    DownloaderEvent::LogLine(line.to_string())
}

/// `total_seconds` comes from the prober; non-positive totals never yield
/// progress.
pub fn parse_transcoder_line(line: &str, total_seconds: f64) -> TranscoderEvent {
    match parse_timestamp(line) {
        Some(elapsed) if total_seconds > 0.0 => {
            let percent = (elapsed / total_seconds * 100.0).clamp(0.0, 100.0);
            TranscoderEvent::Progress(percent as u8)
        }
        _ => TranscoderEvent::LogLine(line.to_string()),
    }
}

/// Download percentage, truncated to an integer and capped at 100.
pub fn parse_percent(line: &str) -> Option<u8> {
    let caps = PERCENT_RULE.captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0) as u8)
}

/// Seconds encoded by the `time=` marker.
pub fn parse_timestamp(line: &str) -> Option<f64> {
    let caps = TIMESTAMP_RULE.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

fn capture_path(rule: &Regex, line: &str) -> Option<PathBuf> {
    let raw = rule.captures(line)?.get(1)?.as_str().trim();
    if raw.is_empty() {
        return None;
    }
    Some(PathBuf::from(raw))
}
