use clap::{Arg, Command};
use log::LevelFilter;
use mailwatch::checkpoint::CheckpointStore;
use mailwatch::mail_source::{ImapMailSource, MailSourceError};
use mailwatch::notifier::SmtpNotifier;
use mailwatch::{Config, Monitor};
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const RECONNECT_DELAY: Duration = Duration::from_secs(30);

fn main() {
    let matches = Command::new("mailwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Checkpointed IMAP mailbox monitor with keyword alerting")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/mailwatch.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config_path = matches.get_one::<String>("config").unwrap();
    let config = match Config::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration from {config_path}: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        println!("Configuration file '{config_path}' is valid");
        return;
    }

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = interrupt.clone();
    ctrlc::set_handler(move || {
        log::info!("Received ctrl-c or SIGINT, cleaning up");
        flag.store(true, Ordering::SeqCst);
    })
    .expect("Error setting signal handler");

    loop {
        match run_pass(&config, interrupt.clone()) {
            Ok(()) => break,
            Err(e) if is_transient(&e) => {
                log::warn!("Server error: {e}\nreconnecting in 30 seconds...");
                std::thread::sleep(RECONNECT_DELAY);
            }
            Err(e) => {
                log::error!("ERROR, UNEXPECTED EXCEPTION");
                log::error!("{e:#}");
                process::exit(1);
            }
        }
    }

    if interrupt.load(Ordering::SeqCst) {
        // Interrupted: the pass did not complete, no health breadcrumb.
        return;
    }

    if let Err(e) = mailwatch::health::update_health_record(&config.files.health_record_file) {
        log::warn!("Failed to update health record: {e:#}");
    }
}

/// Build a fresh connection pair and run one pass. A transient failure
/// returned from here is retried wholesale by the caller; re-deriving
/// the resume point from the checkpoint makes the retry safe.
fn run_pass(config: &Config, interrupt: Arc<AtomicBool>) -> anyhow::Result<()> {
    let source = ImapMailSource::connect(config)?;
    let notifier = SmtpNotifier::connect(config)?;
    let checkpoint = CheckpointStore::new(config.files.checkpoint_file.clone());
    let mut monitor = Monitor::new(
        source,
        notifier,
        checkpoint,
        config.files.keywords_file.clone(),
        interrupt,
    );
    monitor.run_once()
}

fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<MailSourceError>()
        .is_some_and(MailSourceError::is_transient)
}

fn generate_default_config(path: &str) {
    let config = Config::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}
