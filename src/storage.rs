use crate::error::{SupervisorError, SupervisorResult};
use chrono::{DateTime, Utc};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Identity read back from the state store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidRecord {
    pub pid: u32,
    /// When the record was written; approximates the process start time
    pub written_at: DateTime<Utc>,
}

/// Durable record of the supervised process identity.
///
/// Only the process controller writes; everything else reads.
pub trait StateStore: Send + Sync {
    /// Persist `pid`, replacing any previous record. Readers never observe a
    /// partially written value.
    fn write(&self, pid: u32) -> SupervisorResult<()>;

    /// Current identity, or `None` when absent or unreadable.
    fn read(&self) -> Option<PidRecord>;

    /// Remove the record. Removing an absent record succeeds.
    fn clear(&self) -> SupervisorResult<()>;
}

/// Plain pid file: one decimal pid followed by a newline.
#[derive(Debug, Clone)]
pub struct PidFileStore {
    path: PathBuf,
}

impl PidFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl StateStore for PidFileStore {
    fn write(&self, pid: u32) -> SupervisorResult<()> {
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)
            .map_err(|err| SupervisorError::state("cannot create state directory", &dir, err))?;

        // temp file in the same directory so the rename stays on one filesystem
        let mut tmp = NamedTempFile::new_in(&dir)
            .map_err(|err| SupervisorError::state("cannot create temp file", &dir, err))?;
        writeln!(tmp, "{pid}")
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|err| SupervisorError::state("cannot write pid", tmp.path(), err))?;
        tmp.persist(&self.path)
            .map_err(|err| SupervisorError::state("cannot replace pid file", &self.path, err.error))?;

        debug!(pid, path = %self.path.display(), "pid record written");
        Ok(())
    }

    fn read(&self) -> Option<PidRecord> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "pid file unreadable, ignoring");
                return None;
            }
        };

        let pid = match contents.trim().parse::<u32>() {
            Ok(pid) if pid > 0 => pid,
            _ => {
                warn!(
                    path = %self.path.display(),
                    contents = contents.trim(),
                    "pid file is corrupt, ignoring"
                );
                return None;
            }
        };

        let written_at = fs::metadata(&self.path)
            .and_then(|meta| meta.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Some(PidRecord { pid, written_at })
    }

    fn clear(&self) -> SupervisorResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "pid record cleared");
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(SupervisorError::state("cannot remove pid file", &self.path, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> PidFileStore {
        PidFileStore::new(dir.path().join("logs").join("app.pid"))
    }

    #[test]
    fn write_then_read_round_trips_pid() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(store.read().is_none());
        store.write(4321).unwrap();

        let record = store.read().unwrap();
        assert_eq!(record.pid, 4321);
        assert!(record.written_at <= Utc::now());
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "4321\n");
    }

    #[test]
    fn write_overwrites_previous_value() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.write(100).unwrap();
        store.write(200).unwrap();
        assert_eq!(store.read().unwrap().pid, 200);

        // no temp files left behind next to the record
        let leftovers: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name() != "app.pid")
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn corrupt_or_empty_records_read_as_absent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();

        for contents in ["", "not-a-pid", "0\n", "-12", "12 34"] {
            fs::write(store.path(), contents).unwrap();
            assert!(store.read().is_none(), "contents {contents:?}");
        }

        fs::write(store.path(), "  987  \n").unwrap();
        assert_eq!(store.read().unwrap().pid, 987);
    }

    #[test]
    fn clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.clear().unwrap();

        store.write(55).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.read().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn bare_file_name_uses_current_directory_parent() {
        let store = PidFileStore::new("app.pid");
        assert_eq!(store.parent_dir(), PathBuf::from("."));
    }
}
