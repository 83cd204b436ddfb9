//! Configuration module for environment variable parsing.
//!
//! All settings are read once at startup into [`Config`]. Nothing else in the
//! crate touches the environment; the parts a send needs are handed on as an
//! explicit [`RunConfiguration`].

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

/// Default SendGrid API base URL.
pub const DEFAULT_API_URL: &str = "https://api.sendgrid.com";

/// File name of the failure log when no path is configured.
pub const FAILED_EMAILS_FILE: &str = "failedEmails.csv";

/// Application configuration loaded from environment variables.
#[derive(Clone)]
pub struct Config {
    /// SendGrid API key
    pub api_key: Option<String>,

    /// Sender address used in the `from` field
    pub from_email: Option<String>,

    /// Optional sender display name
    pub from_name: Option<String>,

    /// Subject line for every message in the run
    pub subject: Option<String>,

    /// HTML body file
    pub body_path: PathBuf,

    /// CSV of addresses reported as bounced
    pub bounced_path: PathBuf,

    /// CSV of `email,unsubscribeId` rows to send to
    pub valid_path: PathBuf,

    /// Where failed sends are recorded for a later retry run
    pub failed_path: PathBuf,

    /// Optional address that receives a test message before the blast
    pub test_email: Option<String>,

    /// SendGrid API base URL
    pub api_url: String,

    /// Per-send timeout in milliseconds
    pub send_timeout_ms: u64,

    /// Maximum number of sends in flight at once
    pub send_concurrency: usize,

    /// Progress display refresh interval in milliseconds
    pub progress_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            api_key: non_empty_var("SENDGRID_API_KEY"),

            from_email: non_empty_var("FROM_EMAIL"),

            from_name: non_empty_var("FROM_NAME"),

            subject: non_empty_var("EMAIL_SUBJECT"),

            body_path: path_var("EMAIL_BODY_PATH", "emailBody.html"),

            bounced_path: path_var("BOUNCED_EMAILS_PATH", "bouncedEmails.csv"),

            valid_path: path_var("VALID_EMAILS_PATH", "validEmails.csv"),

            failed_path: non_empty_var("FAILED_EMAILS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(default_failed_path),

            test_email: non_empty_var("TEST_EMAIL"),

            api_url: non_empty_var("SENDGRID_API_URL")
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),

            send_timeout_ms: parse_number::<u64>("SEND_TIMEOUT_MS", 10_000),

            send_concurrency: parse_number::<usize>("SEND_CONCURRENCY", 1).max(1),

            progress_interval_ms: parse_number::<u64>("PROGRESS_INTERVAL_MS", 200).max(10),
        }
    }

    /// Build the settings a send needs, checking that the required ones are present.
    pub fn run_configuration(&self) -> RunConfiguration {
        let api_key = self.api_key.clone().unwrap_or_default();
        let from_email = self.from_email.clone().unwrap_or_default();

        if api_key.is_empty() {
            warn!(env_var = "SENDGRID_API_KEY", "config_missing_value");
        }
        if from_email.is_empty() {
            warn!(env_var = "FROM_EMAIL", "config_missing_value");
        }

        RunConfiguration {
            valid: !api_key.is_empty() && !from_email.is_empty(),
            api_key,
            from_email,
            from_name: self.from_name.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key_set", &self.api_key.is_some())
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("subject", &self.subject)
            .field("body_path", &self.body_path)
            .field("bounced_path", &self.bounced_path)
            .field("valid_path", &self.valid_path)
            .field("failed_path", &self.failed_path)
            .field("test_email", &self.test_email)
            .field("api_url", &self.api_url)
            .field("send_timeout_ms", &self.send_timeout_ms)
            .field("send_concurrency", &self.send_concurrency)
            .field("progress_interval_ms", &self.progress_interval_ms)
            .finish()
    }
}

/// Settings passed through to every send.
///
/// The dispatch loop never inspects these; only the transport does.
#[derive(Clone, PartialEq, Eq)]
pub struct RunConfiguration {
    pub api_key: String,
    pub from_email: String,
    pub from_name: Option<String>,
    /// Whether the required settings were all present
    pub valid: bool,
}

impl fmt::Debug for RunConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunConfiguration")
            .field("api_key", &"<redacted>")
            .field("from_email", &self.from_email)
            .field("from_name", &self.from_name)
            .field("valid", &self.valid)
            .finish()
    }
}

/// Preload a `.env` file from the working directory or a parent.
///
/// Variables already set in the environment are not overridden.
pub fn preload_env_file() -> Option<PathBuf> {
    report_env_file(dotenvy::dotenv())
}

/// Preload a specific `.env` file.
pub fn preload_env_file_from(path: &Path) -> Option<PathBuf> {
    report_env_file(dotenvy::from_path(path).map(|()| path.to_path_buf()))
}

fn report_env_file(result: Result<PathBuf, dotenvy::Error>) -> Option<PathBuf> {
    match result {
        Ok(path) => {
            info!(path = %path.display(), "dotenv_loaded");
            Some(path)
        }
        Err(e) if e.not_found() => None,
        Err(e) => {
            warn!(error = %e, "dotenv_invalid");
            None
        }
    }
}

/// The failure log sits next to the executable, falling back to the working directory.
fn default_failed_path() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(FAILED_EMAILS_FILE)))
        .unwrap_or_else(|| PathBuf::from(FAILED_EMAILS_FILE))
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn path_var(name: &str, default: &str) -> PathBuf {
    PathBuf::from(non_empty_var(name).unwrap_or_else(|| default.to_string()))
}

/// Parse a numeric variable, warning and falling back when it is malformed.
fn parse_number<T: std::str::FromStr + Copy>(name: &str, default: T) -> T {
    let raw = match non_empty_var(name) {
        Some(v) => v,
        None => return default,
    };

    match raw.parse() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid number, using default");
            default
        }
    }
}
