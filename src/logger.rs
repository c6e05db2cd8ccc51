/*============================================================
  Synavera Project: Syn-Repo
  Module: synrepo_core::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Provide structured, append-only logging for mirror and
    catalog update sessions.

  Security / Safety Notes:
    Entries carry URLs, repository names and counts only; flag
    submitter addresses are never logged.

  Dependencies:
    std::fs::File, std::sync::Mutex, chrono for UTC stamps,
    sha2 for session integrity hashing.

  Operational Scope:
    Shared (behind Arc) by the pipelines and their worker tasks
    to emit RFC-3339 UTC stamped entries and to seal the session
    log with a digest.

  Revision History:
    2026-09-14 COD  Adapted logging module for Syn-Repo-Core.
    2026-10-02 COD  Count degraded events for update summaries.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{Result, SynrepoError};

/// Structured log level for Syn-Repo-Core events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// Levels that always reach stderr and count towards the warning total.
    fn is_degraded(self) -> bool {
        matches!(self, LogLevel::Warn | LogLevel::Error)
    }
}

type Sink = Mutex<BufWriter<File>>;

/// Shared logger that emits append-only entries in Synavera format.
pub struct Logger {
    sink: Option<Sink>,
    path: Option<PathBuf>,
    verbose: bool,
    quiet: bool,
    warnings: AtomicUsize,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally appends to `path`.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let sink = path.as_deref().map(open_sink).transpose()?;
        Ok(Self {
            sink,
            path,
            verbose,
            quiet: false,
            warnings: AtomicUsize::new(0),
        })
    }

    /// Logger that only counts; nothing is printed or written.
    pub fn silent() -> Self {
        Self {
            sink: None,
            path: None,
            verbose: false,
            quiet: true,
            warnings: AtomicUsize::new(0),
        }
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        if level.is_degraded() {
            self.warnings.fetch_add(1, Ordering::Relaxed);
        }
        if self.quiet {
            return;
        }

        let stamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let line = format!("{stamp} [{}] [{code}] {}", level.as_str(), message.as_ref());
        if self.verbose || level.is_degraded() {
            eprintln!("{line}");
        }
        if let Err(err) = self.append(&line) {
            eprintln!("{stamp} [{}] [LOGGER] {err}", LogLevel::Error.as_str());
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let Some(sink) = &self.sink else {
            return Ok(());
        };
        let Ok(mut writer) = sink.lock() else {
            return Ok(());
        };
        writeln!(writer, "{line}")?;
        writer.flush()
    }

    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Number of WARN and ERROR entries emitted so far.
    pub fn warning_count(&self) -> usize {
        self.warnings.load(Ordering::Relaxed)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Seal the session: write `<log>.hash` holding the SHA-256 of the log in
    /// `sha256sum` format.
    pub fn finalize(&self) -> Result<()> {
        let Some(path) = self.path() else {
            return Ok(());
        };
        if let Some(Ok(mut writer)) = self.sink.as_ref().map(|s| s.lock()) {
            let _ = writer.flush();
        }

        let data = std::fs::read(path).map_err(|err| {
            SynrepoError::Filesystem(format!("Failed to read log for hashing {}: {err}", path.display()))
        })?;
        let name = path.file_name().unwrap_or_default().to_string_lossy();
        let record = format!("{:x}  {name}\n", Sha256::digest(&data));

        let target = digest_path(path);
        std::fs::write(&target, record).map_err(|err| {
            SynrepoError::Filesystem(format!("Failed to write hash file {}: {err}", target.display()))
        })
    }
}

fn open_sink(path: &Path) -> Result<Sink> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| {
            SynrepoError::Filesystem(format!(
                "Failed to create log directory {}: {err}",
                parent.display()
            ))
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SynrepoError::Filesystem(format!("Failed to open log file {}: {err}", path.display()))
        })?;
    Ok(Mutex::new(BufWriter::new(file)))
}

fn digest_path(path: &Path) -> PathBuf {
    let mut raw = path.as_os_str().to_os_string();
    raw.push(".hash");
    PathBuf::from(raw)
}
