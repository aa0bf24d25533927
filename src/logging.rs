//! Tracing setup.
//!
//! Two layers: a stderr layer whose level follows `-v`/`-q` (or `RUST_LOG`),
//! and a plain-text layer that writes INFO and above into the current
//! session's `scan.log` once a session directory exists.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Destination of the per-session log file. Writes are dropped while detached.
#[derive(Clone, Default)]
pub struct ScanLog {
    file: Arc<Mutex<Option<File>>>,
}

impl ScanLog {
    /// Start appending log records to `path`.
    pub fn attach(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        *self.lock()? = Some(file);
        Ok(())
    }

    pub fn detach(&self) {
        if let Ok(mut guard) = self.file.lock() {
            if let Some(file) = guard.as_mut() {
                let _ = file.flush();
            }
            *guard = None;
        }
    }

    pub fn is_attached(&self) -> bool {
        self.file.lock().map(|g| g.is_some()).unwrap_or(false)
    }

    fn lock(&self) -> io::Result<std::sync::MutexGuard<'_, Option<File>>> {
        self.file
            .lock()
            .map_err(|_| io::Error::other("scan log lock poisoned"))
    }
}

impl Write for ScanLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.lock()?.as_mut() {
            Some(file) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.lock()?.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for ScanLog {
    type Writer = ScanLog;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Stderr filter directive for the given verbosity flags.
pub fn stderr_directive(verbose: bool, quiet: bool) -> &'static str {
    if quiet {
        "reconflow=error"
    } else if verbose {
        "reconflow=debug"
    } else {
        "reconflow=warn"
    }
}

/// Install the global subscriber. Returns the handle used to attach `scan.log`.
pub fn init(verbose: bool, quiet: bool) -> ScanLog {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(stderr_directive(verbose, quiet)));
    let stderr_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let scan_log = ScanLog::default();
    let file_layer = fmt::layer()
        .with_writer(scan_log.clone())
        .with_ansi(false)
        .with_target(false)
        .with_filter(EnvFilter::new("reconflow=info"));

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    scan_log
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directive_precedence() {
        assert_eq!(stderr_directive(true, true), "reconflow=error");
        assert_eq!(stderr_directive(true, false), "reconflow=debug");
        assert_eq!(stderr_directive(false, false), "reconflow=warn");
    }

    #[test]
    fn test_scan_log_writes_only_when_attached() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.log");
        let mut log = ScanLog::default();

        log.write_all(b"dropped\n").unwrap();
        assert!(!path.exists());

        log.attach(&path).unwrap();
        assert!(log.is_attached());
        log.write_all(b"INFO CMD subfinder -d example.com\n").unwrap();
        log.detach();
        log.write_all(b"dropped again\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "INFO CMD subfinder -d example.com\n");
    }
}
