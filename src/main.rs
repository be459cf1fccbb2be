use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;

use mail_tender::config::TenderConfig;
use mail_tender::handlers::HandlerRegistry;
use mail_tender::logging::{self, LogTarget};
use mail_tender::mailbox::{Calendar, GoogleClient, INBOX_LABEL, Mailbox, resolve_label};
use mail_tender::scan::{ScanOptions, Scanner};
use mail_tender::sink::HttpSink;

#[derive(Debug, Parser)]
#[command(name = "mail-tender", version, about = "File known inbox mail as scheduled tasks")]
struct Cli {
    /// Log at debug level.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Append log output to the log file (default).
    #[arg(long, global = true, overrides_with = "no_log")]
    log: bool,

    /// Log to stderr instead of the log file.
    #[arg(long = "no-log", global = true, overrides_with = "log")]
    no_log: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Check that the configured access token works.
    Authorize,
    /// Run one pass over the inbox and the context folders.
    Scan {
        /// Classify and log without capturing tasks or changing labels.
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = TenderConfig::from_env().context("failed to load configuration")?;

    let target = if cli.no_log && !cli.log {
        LogTarget::Stderr
    } else {
        LogTarget::File(&config.log_file)
    };
    let _log_guard = logging::init(target, cli.verbose)?;

    let client = Arc::new(GoogleClient::new(config.access_token.clone()));

    match cli.command {
        Command::Authorize => {
            // Credential acquisition happens elsewhere; this only proves the token.
            let inbox = resolve_label(client.as_ref(), INBOX_LABEL)
                .await
                .context("access token was rejected or the mailbox is unreachable")?;
            let now = chrono::Utc::now();
            let events = client
                .list_events(now, now + chrono::Duration::days(1), None)
                .await
                .context("calendar is unreachable with this token")?;
            info!(label = %inbox, events = events.len(), "Access token verified");
            eprintln!("Authorized: mailbox and calendar reachable");
        }
        Command::Scan { dry_run } => {
            // ── Handlers ─────────────────────────────────────────────────
            let registry = Arc::new(HandlerRegistry::with_builtin()?);
            info!(
                handlers = registry.len(),
                dry_run,
                sink = %config.sink_url,
                "Starting scan"
            );

            // ── Scan ─────────────────────────────────────────────────────
            let mailbox: Arc<dyn Mailbox> = client;
            let scanner = Scanner::new(
                mailbox,
                Arc::new(HttpSink::new(config.sink_url.clone())),
                registry,
                ScanOptions::from_config(&config, dry_run),
            );
            let report = scanner.run().await;
            info!(report = ?report, "done");
        }
    }

    Ok(())
}
