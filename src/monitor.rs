use crate::checkpoint::{CheckpointStatus, CheckpointStore, NO_CHECKPOINT};
use crate::decoder;
use crate::mail_source::{MailSource, SearchRange};
use crate::notifier::NotificationChannel;
use crate::rules;
use crate::watchdog::Watchdog;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// On a first run (no checkpoint yet) only this many of the newest uids
/// are processed, so activating the monitor on a full mailbox does not
/// flood the alert channel with its entire history.
const FIRST_RUN_WINDOW: usize = 100;

/// Hard per-message budget; enforced by the watchdog.
const MESSAGE_TIMEOUT: Duration = Duration::from_secs(60);

/// Result of handling one candidate uid.
enum StepOutcome {
    Continue,
    /// A contained failure: a resume-before-this-uid checkpoint has been
    /// written and no further uids may be processed this pass.
    StopPass,
}

/// One-pass scan orchestrator: derives the resume point from the
/// checkpoint store, walks the new uids in ascending order, fetches and
/// decodes each once, alerts on keyword matches, and records progress.
pub struct Monitor<S: MailSource, N: NotificationChannel> {
    source: S,
    notifier: N,
    checkpoint: CheckpointStore,
    keywords_file: PathBuf,
    interrupt: Arc<AtomicBool>,
}

impl<S: MailSource, N: NotificationChannel> Monitor<S, N> {
    pub fn new(
        source: S,
        notifier: N,
        checkpoint: CheckpointStore,
        keywords_file: PathBuf,
        interrupt: Arc<AtomicBool>,
    ) -> Self {
        Monitor {
            source,
            notifier,
            checkpoint,
            keywords_file,
            interrupt,
        }
    }

    /// Run one polling pass.
    ///
    /// Select and search failures propagate without touching the
    /// checkpoint; the caller decides whether to reconnect and retry the
    /// whole pass. Per-message failures are contained: the pass stops
    /// with a checkpoint just before the failing uid and returns Ok, so
    /// the next pass retries that exact message.
    pub fn run_once(&mut self) -> anyhow::Result<()> {
        self.source.select_inbox()?;

        let last_seen = self.checkpoint.last_seen_uid()?;
        let candidates = if last_seen == NO_CHECKPOINT {
            log::info!("Reading recent {FIRST_RUN_WINDOW} mails.");
            let mut uids = self.source.search_uids(SearchRange::All)?;
            let skip = uids.len().saturating_sub(FIRST_RUN_WINDOW);
            uids.split_off(skip)
        } else {
            // The server may echo the highest existing uid even when it
            // is below the range start; the <= last_seen guard in the
            // loop handles that.
            self.source
                .search_uids(SearchRange::From((last_seen + 1) as u32))?
        };
        log::info!("Mails to parse: {candidates:?}");

        let keywords = rules::load_keywords(&self.keywords_file)?;

        let mut any_processed = false;
        let mut stopped_early = false;
        for &uid in &candidates {
            if self.interrupt.load(Ordering::SeqCst) {
                log::info!("Interrupt requested, disconnecting without checkpoint");
                self.source.disconnect();
                self.notifier.close();
                return Ok(());
            }
            if i64::from(uid) <= last_seen {
                log::info!("No mail to parse. Already seen.");
                break;
            }
            any_processed = true;

            let watchdog = Watchdog::arm(uid, self.checkpoint.clone(), MESSAGE_TIMEOUT);
            let outcome = self.process_message(uid, &keywords);
            watchdog.disarm();
            match outcome {
                StepOutcome::Continue => {}
                StepOutcome::StopPass => {
                    stopped_early = true;
                    break;
                }
            }
        }

        self.notifier.close();

        if stopped_early {
            // The resume-before-failure entry is already the latest one.
        } else if any_processed {
            let last = *candidates.last().unwrap_or(&0);
            self.checkpoint
                .append(CheckpointStatus::Updated, i64::from(last))?;
        } else {
            self.checkpoint
                .append(CheckpointStatus::NotUpdated, last_seen)?;
        }
        Ok(())
    }

    fn process_message(&mut self, uid: u32, keywords: &[String]) -> StepOutcome {
        log::info!("=========================== Received new email with uid {uid} ===========================");
        let raw = match self.source.fetch_raw(uid) {
            Ok(raw) => raw,
            Err(e) => {
                log::error!("uid {uid}: {e}");
                return self.stop_before(uid);
            }
        };

        let message = decoder::decode_message(&raw);
        if message.subject.is_empty() {
            log::error!("uid {uid}: message has no subject");
        }

        if rules::body_matches(&message.body, keywords) {
            if let Err(e) = self.notifier.send_alert(&message, uid) {
                log::error!("uid {uid}: {e}");
                return self.stop_before(uid);
            }
            if let Err(e) = self
                .notifier
                .create_ticket(&message.subject, &message.body)
            {
                log::error!("uid {uid}: {e}");
                return self.stop_before(uid);
            }
        }

        log::info!("uid {uid} finished.");
        StepOutcome::Continue
    }

    /// Record that everything before `uid` is handled, so the next pass
    /// resumes at the failing message.
    fn stop_before(&mut self, uid: u32) -> StepOutcome {
        if let Err(e) = self
            .checkpoint
            .append(CheckpointStatus::Updated, i64::from(uid) - 1)
        {
            log::error!("failed to write resume checkpoint for uid {uid}: {e}");
        } else {
            log::info!("Checkpoint updated to resume before uid {uid}.");
        }
        StepOutcome::StopPass
    }

    /// Disconnect from the mailbox without completing a pass.
    pub fn disconnect(&mut self) {
        self.source.disconnect();
    }
}
