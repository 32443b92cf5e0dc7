use anyhow::Context;
use chrono::Local;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Sentinel uid meaning "no checkpoint recorded yet".
pub const NO_CHECKPOINT: i64 = -1;

/// Outcome label written into the checkpoint log. The labels are
/// fixed-width so the tab-separated log stays column-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointStatus {
    Updated,
    NotUpdated,
}

impl CheckpointStatus {
    pub fn label(self) -> &'static str {
        match self {
            CheckpointStatus::Updated => "UID updated    :",
            CheckpointStatus::NotUpdated => "UID not updated:",
        }
    }
}

/// Append-only progress log. Each pass appends one line
/// `<label>\t<uid>\t<local time>\t<hostname>` and the effective last-seen
/// uid is the most recent well-formed line. Prior lines are never
/// rewritten, so a crash mid-append cannot corrupt earlier state.
///
/// A single writer per checkpoint file is assumed; there is no locking
/// against concurrent passes.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: PathBuf) -> Self {
        CheckpointStore { path }
    }

    /// Effective last-seen uid, or `NO_CHECKPOINT` when the file does not
    /// exist or holds no well-formed line. Malformed lines (wrong field
    /// count, non-numeric uid) are skipped with a warning while scanning
    /// backward; they are never fatal.
    pub fn last_seen_uid(&self) -> anyhow::Result<i64> {
        if !self.path.exists() {
            log::info!("Checkpoint file {} does not exist.", self.path.display());
            return Ok(NO_CHECKPOINT);
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("reading checkpoint file {}", self.path.display()))?;
        for line in content.lines().rev() {
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() != 4 {
                log::warn!("Tab split size is {}.", fields.len());
                continue;
            }
            let uid = fields[1];
            let numeric = !uid.is_empty() && uid.chars().all(|c| c.is_ascii_digit());
            if uid != "-1" && !numeric {
                log::warn!("Uid {uid:?} is not a digit");
                continue;
            }
            match uid.parse::<i64>() {
                Ok(value) => return Ok(value),
                Err(_) => {
                    log::warn!("Uid {uid:?} does not fit in an integer");
                    continue;
                }
            }
        }
        Ok(NO_CHECKPOINT)
    }

    /// Append one checkpoint entry, creating the file (and its directory)
    /// on first use.
    pub fn append(&self, status: CheckpointStatus, uid: i64) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("creating checkpoint directory {}", parent.display()))?;
            }
        }
        let origin = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown-host".to_string());
        let line = format!(
            "{}\t{}\t{}\t{}\n",
            status.label(),
            uid,
            Local::now().format("%c"),
            origin
        );
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening checkpoint file {}", self.path.display()))?;
        file.write_all(line.as_bytes())
            .with_context(|| format!("appending to checkpoint file {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> CheckpointStore {
        CheckpointStore::new(dir.path().join("checkpoint.tsv"))
    }

    #[test]
    fn test_missing_file_reads_as_no_checkpoint() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.last_seen_uid().unwrap(), NO_CHECKPOINT);
    }

    #[test]
    fn test_append_creates_file_and_reads_back() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.append(CheckpointStatus::Updated, 42).unwrap();
        assert_eq!(store.last_seen_uid().unwrap(), 42);
    }

    #[test]
    fn test_latest_well_formed_entry_wins() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.append(CheckpointStatus::Updated, 10).unwrap();
        store.append(CheckpointStatus::NotUpdated, 10).unwrap();
        store.append(CheckpointStatus::Updated, 17).unwrap();
        assert_eq!(store.last_seen_uid().unwrap(), 17);
    }

    #[test]
    fn test_trailing_malformed_lines_are_skipped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.tsv");
        let store = CheckpointStore::new(path.clone());
        store.append(CheckpointStatus::Updated, 99).unwrap();
        let mut content = fs::read_to_string(&path).unwrap();
        content.push_str("garbage line without tabs\n");
        content.push_str("UID updated    :\tnot-a-number\tSat Aug 29 10:00:00 2026\thost\n");
        content.push_str("too\tfew\tfields\n");
        fs::write(&path, content).unwrap();
        assert_eq!(store.last_seen_uid().unwrap(), 99);
    }

    #[test]
    fn test_file_with_only_malformed_lines_reads_as_no_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.tsv");
        fs::write(&path, "nonsense\nmore\tnonsense\n").unwrap();
        let store = CheckpointStore::new(path);
        assert_eq!(store.last_seen_uid().unwrap(), NO_CHECKPOINT);
    }

    #[test]
    fn test_sentinel_entry_is_well_formed() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.append(CheckpointStatus::NotUpdated, NO_CHECKPOINT).unwrap();
        assert_eq!(store.last_seen_uid().unwrap(), NO_CHECKPOINT);
    }

    #[test]
    fn test_entries_are_appended_not_rewritten() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.tsv");
        let store = CheckpointStore::new(path.clone());
        store.append(CheckpointStatus::Updated, 5).unwrap();
        store.append(CheckpointStatus::Updated, 6).unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("UID updated    :\t5\t"));
        assert!(lines[1].starts_with("UID updated    :\t6\t"));
        assert_eq!(lines[1].split('\t').count(), 4);
    }
}
