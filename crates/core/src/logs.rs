//! Append-only operational log files.
//!
//! Four files live under the configured log directory: account events,
//! authentication events, deletion audit lines and server errors.
//! Appends are best effort; a full disk must never fail the request
//! that triggered the log line.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Users,
    Security,
    Audit,
    Errors,
}

impl LogKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            LogKind::Users => "users.log",
            LogKind::Security => "security.log",
            LogKind::Audit => "audit.log",
            LogKind::Errors => "errors.log",
        }
    }

    /// Resolves the short name used in the log viewer.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "users" => Some(LogKind::Users),
            "security" => Some(LogKind::Security),
            "audit" => Some(LogKind::Audit),
            "errors" => Some(LogKind::Errors),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogFiles {
    dir: PathBuf,
}

impl LogFiles {
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(LogFiles { dir })
    }

    pub fn path(&self, kind: LogKind) -> PathBuf {
        self.dir.join(kind.file_name())
    }

    /// Appends a timestamped line. Failures are reported through
    /// tracing and otherwise swallowed.
    pub fn append(&self, kind: LogKind, line: &str) {
        let stamped = format!("{} {}\n", Utc::now().format("%Y-%m-%d %H:%M:%S"), line);
        if let Err(e) = append_raw(&self.path(kind), &stamped) {
            tracing::warn!(file = kind.file_name(), error = %e, "log append failed");
        }
    }

    /// Reads a whole log file. Files written by other tools are
    /// sometimes Latin-1; those are transcoded byte-for-byte rather
    /// than rejected. A missing file reads as empty.
    pub fn read(&self, kind: LogKind) -> std::io::Result<String> {
        let path = self.path(kind);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(String::new()),
            Err(e) => return Err(e),
        };
        Ok(match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
        })
    }
}

fn append_raw(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line.as_bytes())
}
