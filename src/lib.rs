pub mod checkpoint;
pub mod config;
pub mod decoder;
pub mod health;
pub mod mail_source;
pub mod monitor;
pub mod notifier;
pub mod rules;
pub mod watchdog;

pub use checkpoint::{CheckpointStatus, CheckpointStore, NO_CHECKPOINT};
pub use config::Config;
pub use decoder::NormalizedMessage;
pub use mail_source::{ImapMailSource, MailSource, MailSourceError, SearchRange};
pub use monitor::Monitor;
pub use notifier::{NotificationChannel, NotifyError, SmtpNotifier};
