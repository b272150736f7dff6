#![forbid(unsafe_code)]
#![deny(missing_docs)]

//! **grove-logview** – Structured reader for the Grove ops log format.
//!
//! Each log line starts with a `YYYY/MM/DD HH:MM:SS ` timestamp, followed
//! by a run of box-drawing indent glyphs (`│ └ ┌ ─`) whose count is the
//! nesting depth, followed by the payload. Payloads classify into
//! `BEGIN:`/`END:` scope markers or a severity taken from a leading
//! pictogram. The reader feeds the `/logs` endpoint: parse, filter by
//! level, paginate.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Entries per page unless the caller asks otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 100;

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const TIMESTAMP_LEN: usize = 19;

const INDENT_GLYPHS: [char; 4] = ['│', '└', '┌', '─'];

//─────────────────────────────
//  Types
//─────────────────────────────

/// Severity of a classified log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// `ℹ` or any unclassified payload.
    Info,
    /// `✓`
    Success,
    /// `✗`
    Failure,
    /// `🔍`
    Debug,
    /// `📝`
    Notice,
    /// `⚠`
    Warning,
    /// `❌`
    Error,
    /// `🔥`
    Critical,
    /// `🚨`
    Alert,
    /// `💀`
    Emergency,
}

impl std::str::FromStr for LogLevel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "info" => Ok(Self::Info),
            "success" => Ok(Self::Success),
            "failure" => Ok(Self::Failure),
            "debug" => Ok(Self::Debug),
            "notice" => Ok(Self::Notice),
            "warning" | "warn" => Ok(Self::Warning),
            "error" => Ok(Self::Error),
            "critical" => Ok(Self::Critical),
            "alert" => Ok(Self::Alert),
            "emergency" => Ok(Self::Emergency),
            other => Err(ParseError::UnknownLevel(other.to_owned())),
        }
    }
}

/// Structural classification of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// `BEGIN: <name>` scope opener.
    Begin,
    /// `END: <name>` scope closer.
    End,
    /// Everything else.
    Message,
}

/// One parsed log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Parsed line timestamp.
    pub timestamp: NaiveDateTime,
    /// Nesting depth: count of indent glyphs before the payload.
    pub depth: usize,
    /// Scope marker or plain message.
    pub kind: LogKind,
    /// Severity.
    pub level: LogLevel,
    /// Payload with the classification glyph stripped.
    pub message: String,
}

/// One page of a filtered log view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPage {
    /// Entries on this page.
    pub entries: Vec<LogEntry>,
    /// 1-based page number.
    pub page: usize,
    /// Page size the view was cut with.
    pub page_size: usize,
    /// True when later pages exist.
    pub has_more: bool,
}

/// Log parsing failures.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    /// Level filter string not in the known set.
    #[error("unknown log level: {0}")]
    UnknownLevel(String),
}

//─────────────────────────────
//  Parsing
//─────────────────────────────

/// Parse one line. Returns `None` for lines without a valid timestamp
/// prefix (continuation output, blank lines).
pub fn parse_line(line: &str) -> Option<LogEntry> {
    if line.len() < TIMESTAMP_LEN + 1 || !line.is_char_boundary(TIMESTAMP_LEN) {
        return None;
    }
    let timestamp =
        NaiveDateTime::parse_from_str(&line[..TIMESTAMP_LEN], TIMESTAMP_FORMAT).ok()?;

    let rest = line[TIMESTAMP_LEN..].trim_start();
    let mut depth = 0usize;
    let mut payload_start = 0usize;
    for (idx, ch) in rest.char_indices() {
        if INDENT_GLYPHS.contains(&ch) {
            depth += 1;
            payload_start = idx + ch.len_utf8();
        } else if ch == ' ' {
            payload_start = idx + 1;
        } else {
            break;
        }
    }
    let payload = rest[payload_start..].trim_start();

    let (kind, level, message) = classify(payload);
    Some(LogEntry {
        timestamp,
        depth,
        kind,
        level,
        message,
    })
}

fn classify(payload: &str) -> (LogKind, LogLevel, String) {
    if let Some(name) = payload.strip_prefix("BEGIN: ") {
        return (LogKind::Begin, LogLevel::Info, name.to_owned());
    }
    if let Some(name) = payload.strip_prefix("END: ") {
        return (LogKind::End, LogLevel::Info, name.to_owned());
    }

    let mut chars = payload.chars();
    let level = match chars.next() {
        Some('ℹ') => Some(LogLevel::Info),
        Some('✓') => Some(LogLevel::Success),
        Some('✗') => Some(LogLevel::Failure),
        Some('🔍') => Some(LogLevel::Debug),
        Some('📝') => Some(LogLevel::Notice),
        Some('⚠') => Some(LogLevel::Warning),
        Some('❌') => Some(LogLevel::Error),
        Some('🔥') => Some(LogLevel::Critical),
        Some('🚨') => Some(LogLevel::Alert),
        Some('💀') => Some(LogLevel::Emergency),
        _ => None,
    };

    match level {
        Some(level) => (LogKind::Message, level, chars.as_str().trim_start().to_owned()),
        None => (LogKind::Message, LogLevel::Info, payload.to_owned()),
    }
}

/// Parse a whole log body, skipping unparsable lines.
pub fn parse_log(body: &str) -> Vec<LogEntry> {
    body.lines().filter_map(parse_line).collect()
}

/// Parse the log file at `path`.
pub fn read_log_file(path: impl AsRef<std::path::Path>) -> std::io::Result<Vec<LogEntry>> {
    Ok(parse_log(&std::fs::read_to_string(path)?))
}

//─────────────────────────────
//  Views
//─────────────────────────────

/// Keep only entries at exactly `level`.
pub fn filter_level(entries: Vec<LogEntry>, level: LogLevel) -> Vec<LogEntry> {
    entries.into_iter().filter(|e| e.level == level).collect()
}

/// Cut a 1-based page out of `entries`.
pub fn paginate(entries: Vec<LogEntry>, page: usize, page_size: usize) -> LogPage {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let start = (page - 1) * page_size;
    let end = (start + page_size).min(entries.len());
    let has_more = entries.len() > end;
    let entries = if start < entries.len() {
        entries[start..end].to_vec()
    } else {
        Vec::new()
    };
    LogPage {
        entries,
        page,
        page_size,
        has_more,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
2024/03/01 09:15:00 ┌─ BEGIN: NewServer
2024/03/01 09:15:00 │  ℹ API server starting on http://localhost:8080
2024/03/01 09:15:01 │  ✓ Saved initial state to file
2024/03/01 09:15:02 │  │  🔍 Loaded forest
2024/03/01 09:15:03 │  ✗ Failed to save state: disk full
2024/03/01 09:15:04 └─ END: NewServer
2024/03/01 09:15:05 ⚠ retrying snapshot
not a log line
2024/03/01 09:15:06 plain message without glyph
";

    #[test]
    fn begin_and_end_lines_are_scope_markers() {
        let entries = parse_log(SAMPLE);
        assert_eq!(entries[0].kind, LogKind::Begin);
        assert_eq!(entries[0].message, "NewServer");
        assert_eq!(entries[0].level, LogLevel::Info);

        let end = entries.iter().find(|e| e.kind == LogKind::End).unwrap();
        assert_eq!(end.message, "NewServer");
    }

    #[test]
    fn glyphs_classify_levels() {
        let entries = parse_log(SAMPLE);
        let levels: Vec<LogLevel> = entries.iter().map(|e| e.level).collect();
        assert!(levels.contains(&LogLevel::Success));
        assert!(levels.contains(&LogLevel::Failure));
        assert!(levels.contains(&LogLevel::Debug));
        assert!(levels.contains(&LogLevel::Warning));
    }

    #[test]
    fn glyph_is_stripped_from_the_message() {
        let entry = parse_line("2024/03/01 09:15:03 │  ✗ Failed to save state").unwrap();
        assert_eq!(entry.message, "Failed to save state");
        assert_eq!(entry.level, LogLevel::Failure);
    }

    #[test]
    fn indent_run_counts_as_depth() {
        let entries = parse_log(SAMPLE);
        let debug = entries.iter().find(|e| e.level == LogLevel::Debug).unwrap();
        assert_eq!(debug.depth, 2);

        let top = entries.iter().find(|e| e.level == LogLevel::Warning).unwrap();
        assert_eq!(top.depth, 0);
    }

    #[test]
    fn unclassified_payload_defaults_to_info() {
        let entry = parse_line("2024/03/01 09:15:06 plain message without glyph").unwrap();
        assert_eq!(entry.kind, LogKind::Message);
        assert_eq!(entry.level, LogLevel::Info);
        assert_eq!(entry.message, "plain message without glyph");
    }

    #[test]
    fn malformed_lines_are_skipped() {
        assert!(parse_line("not a log line").is_none());
        assert!(parse_line("").is_none());
        assert_eq!(parse_log(SAMPLE).len(), 8);
    }

    #[test]
    fn level_filter_is_exact() {
        let entries = parse_log(SAMPLE);
        let failures = filter_level(entries, LogLevel::Failure);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].message.contains("disk full"));
    }

    #[test]
    fn level_names_parse_case_insensitively() {
        assert_eq!("ERROR".parse::<LogLevel>().unwrap(), LogLevel::Error);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!(matches!(
            "nope".parse::<LogLevel>(),
            Err(ParseError::UnknownLevel(_))
        ));
    }

    #[test]
    fn pagination_cuts_and_flags_more() {
        let entries = parse_log(SAMPLE);
        let total = entries.len();

        let first = paginate(entries.clone(), 1, 3);
        assert_eq!(first.entries.len(), 3);
        assert!(first.has_more);

        let last_page = total.div_ceil(3);
        let last = paginate(entries.clone(), last_page, 3);
        assert!(!last.has_more);

        let beyond = paginate(entries, last_page + 1, 3);
        assert!(beyond.entries.is_empty());
        assert!(!beyond.has_more);
    }
}
