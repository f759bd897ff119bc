//! Raw traffic logging to disk.
//!
//! When enabled, every line read from or written to the server is appended
//! to a daily file named `<server>_<date>.log` in the configured log
//! directory (default: `~/.local/share/crabirc/logs/`).

use crate::config::LoggingConfig;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Received,
    Sent,
}

impl Direction {
    fn marker(self) -> &'static str {
        match self {
            Direction::Received => "<<",
            Direction::Sent => ">>",
        }
    }
}

/// Appends wire traffic to per-server daily log files.
///
/// File handles are cached for the lifetime of the logger. A file that
/// cannot be opened is reported once and its lines are dropped.
pub struct TrafficLogger {
    enabled: bool,
    log_dir: PathBuf,
    log_received: bool,
    log_sent: bool,
    server: String,
    file_handles: HashMap<String, Option<File>>,
}

impl TrafficLogger {
    pub fn new(config: &LoggingConfig, server: &str) -> Self {
        Self {
            enabled: config.enabled,
            log_dir: expand_home(&config.log_dir),
            log_received: config.log_received,
            log_sent: config.log_sent,
            server: sanitize(server),
            file_handles: HashMap::new(),
        }
    }

    pub fn log_received(&mut self, line: &str) {
        if self.log_received {
            self.log(Direction::Received, line);
        }
    }

    pub fn log_sent(&mut self, line: &str) {
        if self.log_sent {
            self.log(Direction::Sent, line);
        }
    }

    fn log(&mut self, direction: Direction, line: &str) {
        if !self.enabled {
            return;
        }
        let now = chrono::Local::now();
        let filename = format!("{}_{}.log", self.server, now.format("%Y-%m-%d"));
        let entry = format!(
            "[{}] {} {}",
            now.format("%H:%M:%S"),
            direction.marker(),
            line
        );

        let log_dir = &self.log_dir;
        let handle = self
            .file_handles
            .entry(filename)
            .or_insert_with_key(|name| match open_log(log_dir, name) {
                Ok(file) => Some(file),
                Err(e) => {
                    warn!(file = %name, error = %e, "cannot open traffic log");
                    None
                }
            });
        if let Some(file) = handle {
            if let Err(e) = writeln!(file, "{}", entry) {
                warn!(error = %e, "traffic log write failed");
            }
        }
    }
}

fn open_log(dir: &Path, name: &str) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))
}

fn expand_home(dir: &str) -> PathBuf {
    match dir.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(dir),
        },
        None => PathBuf::from(dir),
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("crabirc-log-{}-{}", tag, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn config(dir: &PathBuf, enabled: bool) -> LoggingConfig {
        LoggingConfig {
            enabled,
            log_dir: dir.to_string_lossy().into_owned(),
            log_received: true,
            log_sent: false,
        }
    }

    fn read_all(dir: &PathBuf) -> String {
        let mut out = String::new();
        for entry in fs::read_dir(dir).unwrap() {
            out.push_str(&fs::read_to_string(entry.unwrap().path()).unwrap());
        }
        out
    }

    #[test]
    fn test_writes_received_lines() {
        let dir = temp_dir("recv");
        let mut logger = TrafficLogger::new(&config(&dir, true), "irc.example.net:6667");
        logger.log_received("PING :abc");
        logger.log_sent("PONG :abc");
        drop(logger);

        let names: Vec<String> = fs::read_dir(&dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("irc.example.net_6667_"));

        let text = read_all(&dir);
        assert!(text.contains("<< PING :abc"));
        assert!(!text.contains("PONG"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_disabled_writes_nothing() {
        let dir = temp_dir("off");
        let mut logger = TrafficLogger::new(&config(&dir, false), "srv");
        logger.log_received("PING :abc");
        assert!(!dir.exists());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/var/log/irc"), PathBuf::from("/var/log/irc"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/logs"), home.join("logs"));
        }
    }
}
