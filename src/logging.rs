//! Daily log files.
//!
//! Log output goes to `<dir>/YYYY-MM-DD.log`. `LogDirectory` is the
//! `MakeWriter` handed to the file layer of the tracing subscriber, and it
//! also serves the admin listing and cleaning endpoints. A housekeeping task
//! switches files at local midnight and prunes files past the retention window.

use chrono::{DateTime, Days, Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing_subscriber::fmt::MakeWriter;

const LOG_EXTENSION: &str = "log";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Log file metadata for the admin listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogFileInfo {
    pub name: String,
    pub size: u64,
    pub mod_time: String,
}

struct ActiveLog {
    date: NaiveDate,
    file: File,
}

struct Inner {
    dir: PathBuf,
    keep_days: u32,
    active: Mutex<ActiveLog>,
}

/// Handle to the log directory and the file currently written to
#[derive(Clone)]
pub struct LogDirectory {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for LogDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDirectory")
            .field("dir", &self.inner.dir)
            .field("keep_days", &self.inner.keep_days)
            .finish()
    }
}

fn file_name(date: NaiveDate) -> String {
    format!("{}.{}", date.format(DATE_FORMAT), LOG_EXTENSION)
}

fn open_append(dir: &Path, date: NaiveDate) -> io::Result<File> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(file_name(date)))
}

/// Date encoded in a log file name, `None` for anything else in the directory
fn parse_log_date(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(LOG_EXTENSION)?.strip_suffix('.')?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}

impl LogDirectory {
    /// Create the directory if needed and open today's file for appending
    pub fn open(dir: impl Into<PathBuf>, keep_days: u32, today: NaiveDate) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let file = open_append(&dir, today)?;

        Ok(Self {
            inner: Arc::new(Inner {
                dir,
                keep_days,
                active: Mutex::new(ActiveLog { date: today, file }),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.inner.dir
    }

    pub fn keep_days(&self) -> u32 {
        self.inner.keep_days
    }

    fn active(&self) -> MutexGuard<'_, ActiveLog> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Switch to `today`'s file; returns false when it is already active
    pub fn rotate(&self, today: NaiveDate) -> io::Result<bool> {
        let mut active = self.active();
        if active.date == today {
            return Ok(false);
        }

        let file = open_append(&self.inner.dir, today)?;
        *active = ActiveLog { date: today, file };
        Ok(true)
    }

    /// Log files, most recently modified first
    pub fn list_files(&self) -> io::Result<Vec<LogFileInfo>> {
        let mut files: Vec<(SystemTime, String, u64)> = Vec::new();

        for entry in fs::read_dir(&self.inner.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.ends_with(".log") {
                continue;
            }
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, name, metadata.len()));
        }

        files.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));

        Ok(files
            .into_iter()
            .map(|(modified, name, size)| LogFileInfo {
                name,
                size,
                mod_time: DateTime::<Local>::from(modified).to_rfc3339(),
            })
            .collect())
    }

    /// Delete dated log files older than `days` days
    ///
    /// `days == 0` deletes every log file except today's. Returns the number
    /// of files removed.
    pub fn clean(&self, days: u32, today: NaiveDate) -> io::Result<usize> {
        if days == 0 {
            self.remove_where(|date| date != today)
        } else {
            let cutoff = today
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN);
            self.remove_where(|date| date < cutoff)
        }
    }

    /// Apply the retention window; a window of 0 days keeps everything
    pub fn prune_expired(&self, today: NaiveDate) -> io::Result<usize> {
        match self.inner.keep_days {
            0 => Ok(0),
            days => self.clean(days, today),
        }
    }

    fn remove_where(&self, expired: impl Fn(NaiveDate) -> bool) -> io::Result<usize> {
        let mut deleted = 0;

        for entry in fs::read_dir(&self.inner.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(date) = parse_log_date(&name) else {
                continue;
            };
            if !expired(date) {
                continue;
            }

            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    deleted += 1;
                    tracing::info!("Deleted log file {}", name);
                }
                Err(e) => tracing::warn!("Failed to delete log file {}: {}", name, e),
            }
        }

        Ok(deleted)
    }
}

/// Writer for one formatted event
pub struct LogWriter<'a> {
    logs: &'a LogDirectory,
}

impl Write for LogWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.logs.active().file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.logs.active().file.flush()
    }
}

impl<'a> MakeWriter<'a> for LogDirectory {
    type Writer = LogWriter<'a>;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter { logs: self }
    }
}

/// Time left until one second past the next local midnight
fn until_next_rotation(now: NaiveDateTime) -> Duration {
    now.date()
        .succ_opt()
        .and_then(|tomorrow| tomorrow.and_hms_opt(0, 0, 1))
        .and_then(|next| (next - now).to_std().ok())
        .unwrap_or(Duration::from_secs(60))
}

/// Rotate at every local midnight and prune expired files until `stop` fires
pub fn spawn_housekeeping(logs: LogDirectory, mut stop: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let today = Local::now().date_naive();
        match logs.prune_expired(today) {
            Ok(0) => {}
            Ok(n) => tracing::info!("Pruned {} expired log files", n),
            Err(e) => tracing::error!("Log pruning failed: {}", e),
        }

        loop {
            let wait = until_next_rotation(Local::now().naive_local());

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
            }

            let today = Local::now().date_naive();
            match logs.rotate(today) {
                Ok(true) => tracing::info!("Switched to log file {}", file_name(today)),
                Ok(false) => {}
                Err(e) => tracing::error!("Log rotation failed: {}", e),
            }
            if let Err(e) = logs.prune_expired(today) {
                tracing::error!("Log pruning failed: {}", e);
            }
        }

        tracing::debug!("Log housekeeping stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    fn touch(dir: &Path, name: &str) {
        fs::write(dir.join(name), b"line\n").unwrap();
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_parse_log_date() {
        assert_eq!(parse_log_date("2025-03-09.log"), Some(date("2025-03-09")));
        assert_eq!(parse_log_date("2025-03-09.txt"), None);
        assert_eq!(parse_log_date("notes.log"), None);
        assert_eq!(parse_log_date("2025-03-09log"), None);
    }

    #[test]
    fn test_open_creates_todays_file_and_writes() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("logs");
        let logs = LogDirectory::open(&dir, 3, date("2025-03-09")).unwrap();

        let mut writer = logs.make_writer();
        writer.write_all(b"hello\n").unwrap();
        writer.flush().unwrap();

        assert_eq!(fs::read_to_string(dir.join("2025-03-09.log")).unwrap(), "hello\n");
    }

    #[test]
    fn test_rotate_switches_file() {
        let temp_dir = TempDir::new().unwrap();
        let logs = LogDirectory::open(temp_dir.path(), 3, date("2025-03-09")).unwrap();

        assert!(!logs.rotate(date("2025-03-09")).unwrap());
        assert!(logs.rotate(date("2025-03-10")).unwrap());

        logs.make_writer().write_all(b"next day\n").unwrap();
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2025-03-10.log")).unwrap(),
            "next day\n"
        );
        assert_eq!(
            fs::read_to_string(temp_dir.path().join("2025-03-09.log")).unwrap(),
            ""
        );
    }

    #[test]
    fn test_clean_by_age() {
        let temp_dir = TempDir::new().unwrap();
        let today = date("2025-03-10");
        let logs = LogDirectory::open(temp_dir.path(), 0, today).unwrap();
        for name in ["2025-03-01.log", "2025-03-06.log", "2025-03-07.log", "2025-03-09.log"] {
            touch(temp_dir.path(), name);
        }
        touch(temp_dir.path(), "readme.txt");

        // cutoff is 2025-03-07; that day is kept
        assert_eq!(logs.clean(3, today).unwrap(), 2);
        assert_eq!(
            names(temp_dir.path()),
            vec!["2025-03-07.log", "2025-03-09.log", "2025-03-10.log", "readme.txt"]
        );
    }

    #[test]
    fn test_clean_zero_keeps_only_today() {
        let temp_dir = TempDir::new().unwrap();
        let today = date("2025-03-10");
        let logs = LogDirectory::open(temp_dir.path(), 0, today).unwrap();
        touch(temp_dir.path(), "2025-03-09.log");
        touch(temp_dir.path(), "2024-12-31.log");

        assert_eq!(logs.clean(0, today).unwrap(), 2);
        assert_eq!(names(temp_dir.path()), vec!["2025-03-10.log"]);
    }

    #[test]
    fn test_prune_respects_keep_forever() {
        let temp_dir = TempDir::new().unwrap();
        let today = date("2025-03-10");
        touch(temp_dir.path(), "2020-01-01.log");

        let forever = LogDirectory::open(temp_dir.path(), 0, today).unwrap();
        assert_eq!(forever.prune_expired(today).unwrap(), 0);

        let three_days = LogDirectory::open(temp_dir.path(), 3, today).unwrap();
        assert_eq!(three_days.prune_expired(today).unwrap(), 1);
    }

    #[test]
    fn test_list_files_only_logs() {
        let temp_dir = TempDir::new().unwrap();
        let logs = LogDirectory::open(temp_dir.path(), 3, date("2025-03-10")).unwrap();
        touch(temp_dir.path(), "2025-03-09.log");
        touch(temp_dir.path(), "other.txt");

        let files = logs.list_files().unwrap();
        let mut listed: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        listed.sort();
        assert_eq!(listed, vec!["2025-03-09.log", "2025-03-10.log"]);
        assert!(files.iter().any(|f| f.name == "2025-03-09.log" && f.size == 5));
    }

    #[test]
    fn test_until_next_rotation() {
        let now = date("2025-03-09").and_hms_opt(23, 59, 0).unwrap();
        assert_eq!(until_next_rotation(now), Duration::from_secs(61));

        let morning = date("2025-03-09").and_hms_opt(0, 0, 1).unwrap();
        assert_eq!(until_next_rotation(morning), Duration::from_secs(86_400));
    }

    #[tokio::test]
    async fn test_housekeeping_stops_on_signal() {
        let temp_dir = TempDir::new().unwrap();
        let logs = LogDirectory::open(temp_dir.path(), 3, Local::now().date_naive()).unwrap();
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = spawn_housekeeping(logs, stop_rx);
        stop_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
