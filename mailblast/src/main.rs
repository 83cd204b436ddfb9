//! Mailblast - send one message to every valid, non-bounced recipient.
//!
//! Configuration comes from environment variables, optionally preloaded from a
//! `.env` file; see [`mailblast::Config`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mailblast::{
    config, Blast, BlastReport, Config, ConsoleOperator, Operator, SendGridTransport,
    TerminalProgress, Tone,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Structured JSON logs on stderr; quiet by default so the progress bars stay readable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true).with_writer(std::io::stderr))
        .init();

    tracing::info!("mailblast_starting");

    let operator = Arc::new(ConsoleOperator::new());
    operator.announce(Tone::Info, "Hello! Launching email blast application.");

    // Settings may live in a .env file next to the lists; real env vars win
    config::preload_env_file();

    let config = Config::from_env();
    tracing::info!(
        api_key_set = config.api_key.is_some(),
        from_email = ?config.from_email,
        test_email = ?config.test_email,
        send_concurrency = config.send_concurrency,
        send_timeout_ms = config.send_timeout_ms,
        failed_path = %config.failed_path.display(),
        "config_loaded"
    );

    let transport = SendGridTransport::new(
        &config.api_url,
        Duration::from_millis(config.send_timeout_ms),
    )
    .context("Failed to create SendGrid client")?;

    let report = Blast::new(config, Arc::new(transport), operator)
        .with_progress(Arc::new(TerminalProgress::new()))
        .run()
        .await
        .context("Email blast failed")?;

    match report {
        BlastReport::Completed(report) => tracing::info!(
            processed = report.summary.processed,
            sent = report.summary.sent,
            failed = report.summary.failed,
            skipped = report.summary.skipped,
            "mailblast_complete"
        ),
        BlastReport::Aborted(reason) => tracing::info!(reason = ?reason, "mailblast_aborted"),
    }

    Ok(())
}
