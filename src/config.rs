use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub imap: ImapConfig,
    pub smtp: SmtpConfig,
    pub files: FileConfig,
    pub alert: AlertConfig,
    pub tracker: TrackerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImapConfig {
    pub server: String,
    pub port: u16,
    pub account: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub account: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    pub checkpoint_file: PathBuf,
    pub keywords_file: PathBuf,
    pub health_record_file: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub sender: String,
    pub receivers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub api_url: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl TrackerConfig {
    pub fn issue_url(&self) -> String {
        format!("{}/issues", self.api_url.trim_end_matches('/'))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            imap: ImapConfig {
                server: "imap.example.com".to_string(),
                port: 993,
                account: "monitor@example.com".to_string(),
                password: "changeme".to_string(),
            },
            smtp: SmtpConfig {
                server: "smtp.example.com".to_string(),
                port: 587,
                account: "monitor@example.com".to_string(),
                password: "changeme".to_string(),
            },
            files: FileConfig {
                checkpoint_file: PathBuf::from("/var/lib/mailwatch/checkpoint.tsv"),
                keywords_file: PathBuf::from("/etc/mailwatch/keywords.txt"),
                health_record_file: PathBuf::from("/var/lib/mailwatch/health-record.log"),
            },
            alert: AlertConfig {
                sender: "monitor@example.com".to_string(),
                receivers: vec!["oncall@example.com".to_string()],
            },
            tracker: TrackerConfig {
                api_url: "https://api.github.com/repos/example/inbox-alerts".to_string(),
                token: None,
            },
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
