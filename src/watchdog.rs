use crate::checkpoint::{CheckpointStatus, CheckpointStore};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

/// Per-message time budget enforced by process termination.
///
/// Armed before a message is fetched and disarmed once it is fully
/// handled. If the budget elapses, the watchdog thread best-effort
/// records a checkpoint just before the stuck uid and exits the process;
/// the next run resumes at the stuck message. Termination is irrevocable
/// once the timer fires, so the only synchronization needed with the main
/// flow is cancelling before the deadline. At most one watchdog is live
/// at a time.
pub struct Watchdog {
    cancel: mpsc::Sender<()>,
    _handle: thread::JoinHandle<()>,
}

impl Watchdog {
    pub fn arm(uid: u32, checkpoint: CheckpointStore, timeout: Duration) -> Self {
        let (cancel, fuse) = mpsc::channel();
        let handle = thread::spawn(move || match fuse.recv_timeout(timeout) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => {}
            Err(mpsc::RecvTimeoutError::Timeout) => {
                log::error!(
                    "uid {uid}: processing exceeded {}s, terminating",
                    timeout.as_secs()
                );
                if let Err(e) =
                    checkpoint.append(CheckpointStatus::Updated, i64::from(uid) - 1)
                {
                    log::error!("watchdog checkpoint write failed: {e}");
                }
                std::process::exit(1);
            }
        });
        Watchdog {
            cancel,
            _handle: handle,
        }
    }

    /// Cancel the timer; the message completed within budget.
    pub fn disarm(self) {
        let _ = self.cancel.send(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_disarmed_watchdog_leaves_no_checkpoint() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.tsv");
        let store = CheckpointStore::new(path.clone());
        let watchdog = Watchdog::arm(7, store, Duration::from_millis(20));
        watchdog.disarm();
        thread::sleep(Duration::from_millis(80));
        // Timer was cancelled in time: no entry, and the process is alive.
        assert!(!path.exists());
    }

    #[test]
    fn test_dropped_watchdog_counts_as_cancelled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("checkpoint.tsv");
        let store = CheckpointStore::new(path.clone());
        drop(Watchdog::arm(7, store, Duration::from_millis(20)));
        thread::sleep(Duration::from_millis(80));
        assert!(!path.exists());
    }
}
