use crate::config::Config;
use native_tls::{TlsConnector, TlsStream};
use std::net::TcpStream;

/// Which uids to ask the server for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchRange {
    /// Every uid in the mailbox.
    All,
    /// Uids from this value upward (`UID <n>:*`).
    From(u32),
}

#[derive(Debug, thiserror::Error)]
pub enum MailSourceError {
    #[error("IMAP login rejected: {0}")]
    Auth(String),
    #[error("mailbox select failed: {0}")]
    Select(String),
    #[error("uid search failed: {0}")]
    Search(String),
    #[error("fetch for uid {uid} failed: {reason}")]
    Fetch { uid: u32, reason: String },
    #[error("TLS setup failed: {0}")]
    Tls(#[from] native_tls::Error),
    #[error("server connection lost: {0}")]
    ConnectionLost(String),
}

impl MailSourceError {
    /// Whether the entry point should reconnect and retry the whole pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, MailSourceError::ConnectionLost(_))
    }
}

/// Remote mailbox seam consumed by the scan loop. The production
/// implementation wraps an IMAP session; tests substitute their own.
pub trait MailSource {
    fn select_inbox(&mut self) -> Result<(), MailSourceError>;
    /// Matching uids in ascending order. Note that IMAP servers answer a
    /// `UID <n>:*` query with the highest existing uid even when it is
    /// below `n`, so callers must still guard against already-seen uids.
    fn search_uids(&mut self, range: SearchRange) -> Result<Vec<u32>, MailSourceError>;
    fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>, MailSourceError>;
    fn disconnect(&mut self);
}

pub(crate) fn search_query(range: SearchRange) -> String {
    match range {
        SearchRange::All => "ALL".to_string(),
        SearchRange::From(uid) => format!("UID {uid}:*"),
    }
}

/// IMAP-over-TLS mailbox client.
pub struct ImapMailSource {
    session: imap::Session<TlsStream<TcpStream>>,
}

impl ImapMailSource {
    /// Connect and authenticate. A rejected login is `Auth` and fatal for
    /// the pass; connectivity problems surface as `ConnectionLost` so the
    /// entry point can retry.
    pub fn connect(config: &Config) -> Result<Self, MailSourceError> {
        let tls = TlsConnector::builder().build()?;
        let client = imap::connect(
            (config.imap.server.as_str(), config.imap.port),
            config.imap.server.as_str(),
            &tls,
        )
        .map_err(|e| MailSourceError::ConnectionLost(e.to_string()))?;
        let session = client
            .login(&config.imap.account, &config.imap.password)
            .map_err(|(e, _)| MailSourceError::Auth(e.to_string()))?;
        log::info!("Logged in to {} as {}", config.imap.server, config.imap.account);
        Ok(ImapMailSource { session })
    }

    fn lost(e: &imap::error::Error) -> bool {
        matches!(
            e,
            imap::error::Error::ConnectionLost | imap::error::Error::Io(_)
        )
    }
}

impl MailSource for ImapMailSource {
    fn select_inbox(&mut self) -> Result<(), MailSourceError> {
        self.session.select("INBOX").map_err(|e| {
            if Self::lost(&e) {
                MailSourceError::ConnectionLost(e.to_string())
            } else {
                MailSourceError::Select(e.to_string())
            }
        })?;
        Ok(())
    }

    fn search_uids(&mut self, range: SearchRange) -> Result<Vec<u32>, MailSourceError> {
        let query = search_query(range);
        let set = self.session.uid_search(&query).map_err(|e| {
            if Self::lost(&e) {
                MailSourceError::ConnectionLost(e.to_string())
            } else {
                MailSourceError::Search(e.to_string())
            }
        })?;
        let mut uids: Vec<u32> = set.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch_raw(&mut self, uid: u32) -> Result<Vec<u8>, MailSourceError> {
        let fetches = self
            .session
            .uid_fetch(uid.to_string(), "RFC822")
            .map_err(|e| MailSourceError::Fetch {
                uid,
                reason: e.to_string(),
            })?;
        let fetch = fetches.iter().next().ok_or(MailSourceError::Fetch {
            uid,
            reason: "server returned no data".to_string(),
        })?;
        let body = fetch.body().ok_or(MailSourceError::Fetch {
            uid,
            reason: "fetch response had no body".to_string(),
        })?;
        Ok(body.to_vec())
    }

    fn disconnect(&mut self) {
        log::info!("Logging out");
        if let Err(e) = self.session.logout() {
            log::info!("logout: {e}");
        }
    }
}
