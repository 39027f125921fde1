//! Session logging with rotation and search.
//!
//! Appends processed (post-gag, displayed) lines to a per-session log
//! file, optionally alongside a raw command log for lines the local user
//! sent. Rotation is checked on a sampled basis rather than every line;
//! the contract is only that logs rotate before exceeding the configured
//! size by more than a bounded number of lines. Search runs over its own
//! read handle and never blocks the writer, so results over a live file
//! may miss the most recent lines.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use fancy_regex::Regex;
use rand::Rng;
use tracing::{debug, info};

use crate::common::error::{RecorderError, RecorderResult};

/// Timestamp prefix format for logged lines.
const LINE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Query characters that switch search from substring to regex mode.
const REGEX_HINT_CHARS: &[char] = &['[', '(', '{', '\\', '^', '$'];

/// Recorder settings.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory holding the session logs.
    pub directory: PathBuf,
    /// File stem for this session's logs.
    pub session_name: String,
    /// Rotate the active log once it reaches this size.
    pub max_file_bytes: u64,
    /// Run the rotation check on roughly 1 in N appended lines.
    pub rotation_sample: u32,
    /// Prefix each logged line with a timestamp.
    pub timestamps: bool,
    /// Also keep a raw log of locally sent commands.
    pub log_commands: bool,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs"),
            session_name: "session".to_string(),
            max_file_bytes: 5 * 1024 * 1024,
            rotation_sample: 100,
            timestamps: true,
            log_commands: false,
        }
    }
}

/// One matching line from a log search.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub struct SearchResult {
    /// 1-based line number in the searched file.
    pub line_number: usize,
    pub line: String,
    /// Context lines preceding the match.
    pub before: Vec<String>,
    /// Context lines following the match.
    pub after: Vec<String>,
    /// Parsed from the logged line when the format embeds one.
    pub timestamp: Option<NaiveDateTime>,
}

/// Append-only session recorder.
pub struct SessionRecorder {
    config: RecorderConfig,
    log_path: PathBuf,
    command_path: PathBuf,
    log: File,
    command_log: Option<File>,
}

impl SessionRecorder {
    /// Open (or create) the session's log files.
    pub fn new(config: RecorderConfig) -> RecorderResult<Self> {
        std::fs::create_dir_all(&config.directory).map_err(|e| RecorderError::OpenFailed {
            path: config.directory.display().to_string(),
            source: e,
        })?;

        let log_path = config.directory.join(format!("{}.log", config.session_name));
        let command_path = config
            .directory
            .join(format!("{}.commands.log", config.session_name));

        let log = open_append(&log_path)?;
        let command_log = if config.log_commands {
            Some(open_append(&command_path)?)
        } else {
            None
        };

        Ok(Self {
            config,
            log_path,
            command_path,
            log,
            command_log,
        })
    }

    /// Path of the active session log.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Append one displayed line to the session log.
    pub fn record_line(&mut self, line: &str) -> RecorderResult<()> {
        let entry = if self.config.timestamps {
            format!("[{}] {}\n", Local::now().format(LINE_TIMESTAMP_FORMAT), line)
        } else {
            format!("{}\n", line)
        };

        self.log
            .write_all(entry.as_bytes())
            .map_err(|e| RecorderError::WriteFailed {
                path: self.log_path.display().to_string(),
                source: e,
            })?;

        self.maybe_rotate()
    }

    /// Append one locally sent command to the command log, if enabled.
    pub fn record_command(&mut self, command: &str) -> RecorderResult<()> {
        let command_log = match self.command_log.as_mut() {
            Some(file) => file,
            None => return Ok(()),
        };

        command_log
            .write_all(format!("{}\n", command).as_bytes())
            .map_err(|e| RecorderError::WriteFailed {
                path: self.command_path.display().to_string(),
                source: e,
            })
    }

    /// Sampled rotation check: roughly 1 in `rotation_sample` calls looks
    /// at the file size and rotates when the threshold is reached.
    fn maybe_rotate(&mut self) -> RecorderResult<()> {
        let sample = self.config.rotation_sample.max(1);
        if !rand::thread_rng().gen_ratio(1, sample) {
            return Ok(());
        }

        let size = self
            .log
            .metadata()
            .map_err(|e| RecorderError::RotateFailed {
                path: self.log_path.display().to_string(),
                source: e,
            })?
            .len();

        if size >= self.config.max_file_bytes {
            self.rotate()?;
        }
        Ok(())
    }

    /// Archive the active log under a timestamped name and start fresh.
    fn rotate(&mut self) -> RecorderResult<()> {
        let rotate_err = |e: std::io::Error| RecorderError::RotateFailed {
            path: self.log_path.display().to_string(),
            source: e,
        };

        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut archive = self
            .config
            .directory
            .join(format!("{}-{}.log", self.config.session_name, stamp));
        let mut counter = 1;
        while archive.exists() {
            archive = self
                .config
                .directory
                .join(format!("{}-{}.{}.log", self.config.session_name, stamp, counter));
            counter += 1;
        }

        self.log.flush().map_err(rotate_err)?;
        std::fs::rename(&self.log_path, &archive).map_err(rotate_err)?;
        self.log = open_append(&self.log_path)?;

        info!("Rotated session log to {}", archive.display());
        Ok(())
    }

    /// Search the active log.
    ///
    /// Case-insensitive. A query containing any of `[ ( { \ ^ $` is
    /// treated as a regular expression rather than a literal substring.
    /// Returns matching lines with 1-based line numbers, `context` lines
    /// of surrounding text, and a parsed timestamp when present.
    #[allow(dead_code)]
    pub fn search(&self, query: &str, context: usize) -> RecorderResult<Vec<SearchResult>> {
        search_file(&self.log_path, query, context)
    }
}

fn open_append(path: &Path) -> RecorderResult<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RecorderError::OpenFailed {
            path: path.display().to_string(),
            source: e,
        })
}

/// Matcher for a search query: literal substring or regex.
enum QueryMatcher {
    Substring(String),
    Regex(Regex),
}

impl QueryMatcher {
    fn compile(query: &str) -> RecorderResult<Self> {
        if query.contains(REGEX_HINT_CHARS) {
            let regex = Regex::new(&format!("(?i){}", query)).map_err(|e| {
                RecorderError::InvalidSearchPattern {
                    pattern: query.to_string(),
                    message: e.to_string(),
                }
            })?;
            Ok(Self::Regex(regex))
        } else {
            Ok(Self::Substring(query.to_lowercase()))
        }
    }

    fn is_match(&self, line: &str) -> bool {
        match self {
            Self::Substring(needle) => line.to_lowercase().contains(needle),
            Self::Regex(regex) => regex.is_match(line).unwrap_or(false),
        }
    }
}

/// Search a log file for matching lines.
///
/// Opens its own read handle, so an active writer is never blocked; lines
/// appended after the read starts may be missed.
#[allow(dead_code)]
pub fn search_file(path: &Path, query: &str, context: usize) -> RecorderResult<Vec<SearchResult>> {
    let matcher = QueryMatcher::compile(query)?;

    let file = File::open(path).map_err(|e| RecorderError::OpenFailed {
        path: path.display().to_string(),
        source: e,
    })?;

    let lines: Vec<String> = BufReader::new(file)
        .lines()
        .collect::<Result<_, _>>()
        .map_err(|e| RecorderError::OpenFailed {
            path: path.display().to_string(),
            source: e,
        })?;

    let mut results = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        if !matcher.is_match(line) {
            continue;
        }

        let before_start = idx.saturating_sub(context);
        let after_end = (idx + 1 + context).min(lines.len());

        results.push(SearchResult {
            line_number: idx + 1,
            line: line.clone(),
            before: lines[before_start..idx].to_vec(),
            after: lines[idx + 1..after_end].to_vec(),
            timestamp: parse_line_timestamp(line),
        });
    }

    debug!("Search '{}' matched {} lines", query, results.len());
    Ok(results)
}

/// Parse the `[YYYY-MM-DD HH:MM:SS]` prefix written by the recorder.
fn parse_line_timestamp(line: &str) -> Option<NaiveDateTime> {
    let rest = line.strip_prefix('[')?;
    let end = rest.find(']')?;
    NaiveDateTime::parse_from_str(&rest[..end], LINE_TIMESTAMP_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(dir: &Path) -> RecorderConfig {
        RecorderConfig {
            directory: dir.to_path_buf(),
            session_name: "test".to_string(),
            max_file_bytes: 1024 * 1024,
            rotation_sample: 100,
            timestamps: false,
            log_commands: false,
        }
    }

    #[test]
    fn test_append_and_search() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();

        recorder.record_line("You enter the tavern.").unwrap();
        recorder.record_line("Bob tells you hello").unwrap();
        recorder.record_line("You leave the tavern.").unwrap();

        let results = recorder.search("tells you", 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_number, 2);
        assert_eq!(results[0].line, "Bob tells you hello");
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        recorder.record_line("The DRAGON roars.").unwrap();

        assert_eq!(recorder.search("dragon", 0).unwrap().len(), 1);
    }

    #[test]
    fn test_search_context_lines() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        for line in ["one", "two", "match here", "four", "five"] {
            recorder.record_line(line).unwrap();
        }

        let results = recorder.search("match", 2).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].before, vec!["one", "two"]);
        assert_eq!(results[0].after, vec!["four", "five"]);
    }

    #[test]
    fn test_search_context_clamped_at_edges() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        recorder.record_line("first match").unwrap();
        recorder.record_line("second").unwrap();

        let results = recorder.search("first", 5).unwrap();
        assert!(results[0].before.is_empty());
        assert_eq!(results[0].after, vec!["second"]);
    }

    #[test]
    fn test_search_regex_heuristic() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        recorder.record_line("You gain 120 experience.").unwrap();
        recorder.record_line("You gain a level!").unwrap();

        // Contains ^ and $: treated as a regex
        let results = recorder.search(r"^You gain \d+ experience\.$", 0).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].line_number, 1);
    }

    #[test]
    fn test_search_literal_despite_special_looking_text() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        recorder.record_line("price is 5 gold. next").unwrap();

        // No regex hint characters: "5 gold." matches literally
        assert_eq!(recorder.search("5 gold.", 0).unwrap().len(), 1);
    }

    #[test]
    fn test_invalid_regex_query_is_an_error() {
        let dir = tempdir().unwrap();
        let recorder = SessionRecorder::new(test_config(dir.path())).unwrap();

        assert!(matches!(
            recorder.search("[unclosed", 0),
            Err(RecorderError::InvalidSearchPattern { .. })
        ));
    }

    #[test]
    fn test_search_idempotent() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        for i in 0..20 {
            recorder.record_line(&format!("line {}", i)).unwrap();
        }

        let first = recorder.search("line 1", 1).unwrap();
        let second = recorder.search("line 1", 1).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_timestamp_parsed_from_line() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.timestamps = true;
        let mut recorder = SessionRecorder::new(config).unwrap();
        recorder.record_line("timestamped entry").unwrap();

        let results = recorder.search("timestamped", 0).unwrap();
        assert!(results[0].timestamp.is_some());
    }

    #[test]
    fn test_no_timestamp_is_none() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        recorder.record_line("bare entry").unwrap();

        let results = recorder.search("bare", 0).unwrap();
        assert!(results[0].timestamp.is_none());
    }

    #[test]
    fn test_rotation_bounded_overshoot() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.max_file_bytes = 256;
        config.rotation_sample = 1; // check every line: deterministic

        let mut recorder = SessionRecorder::new(config).unwrap();
        for i in 0..100 {
            recorder.record_line(&format!("filler line number {}", i)).unwrap();
        }

        // Active log stays below the threshold plus one line of overshoot
        let size = std::fs::metadata(recorder.log_path()).unwrap().len();
        assert!(size < 256 + 64, "active log too large: {} bytes", size);

        // The rotated archives hold the rest
        let archives = std::fs::read_dir(dir.path()).unwrap().count();
        assert!(archives > 1, "expected rotated archive files");
    }

    #[test]
    fn test_command_log_separate_from_session_log() {
        let dir = tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.log_commands = true;

        let mut recorder = SessionRecorder::new(config).unwrap();
        recorder.record_line("server output").unwrap();
        recorder.record_command("kill orc").unwrap();

        let session = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        let commands = std::fs::read_to_string(dir.path().join("test.commands.log")).unwrap();
        assert!(session.contains("server output"));
        assert!(!session.contains("kill orc"));
        assert_eq!(commands, "kill orc\n");
    }

    #[test]
    fn test_command_log_disabled_by_default() {
        let dir = tempdir().unwrap();
        let mut recorder = SessionRecorder::new(test_config(dir.path())).unwrap();
        recorder.record_command("kill orc").unwrap();

        assert!(!dir.path().join("test.commands.log").exists());
    }
}
