//! CSV loading for the bounced and valid recipient lists.
//!
//! Both files are simple comma-separated text. A leading header row is
//! recognised by the absence of an `@` and skipped.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::{BouncedSet, Recipient};

/// Errors raised while reading an input list.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("line {line}: row has no email address")]
    MalformedRow { line: usize },
}

/// Read the bounced list from disk.
pub async fn load_bounced(path: &Path) -> Result<BouncedSet, InputError> {
    let raw = read(path).await?;
    let bounced: BouncedSet = parse_bounced(&raw).into_iter().collect();

    info!(path = %path.display(), bounced_count = bounced.len(), "bounced_list_loaded");

    Ok(bounced)
}

/// Read the valid-recipients list from disk.
pub async fn load_valid(path: &Path) -> Result<Vec<Recipient>, InputError> {
    let raw = read(path).await?;
    let valid = parse_valid(&raw)?;

    info!(path = %path.display(), valid_count = valid.len(), "valid_list_loaded");

    Ok(valid)
}

/// Extract the address column (the first one) from a bounced-list CSV.
pub fn parse_bounced(raw: &str) -> Vec<String> {
    data_rows(raw)
        .filter_map(|(line, fields)| {
            let email = fields.first().copied().unwrap_or_default();
            if email.is_empty() {
                warn!(line = line, "bounced_row_without_email");
                None
            } else {
                Some(email.to_string())
            }
        })
        .collect()
}

/// Parse `email,unsubscribeId` rows.
///
/// A missing unsubscribe id becomes an empty string; a missing email is an error.
pub fn parse_valid(raw: &str) -> Result<Vec<Recipient>, InputError> {
    data_rows(raw)
        .map(|(line, fields)| {
            let email = fields.first().copied().unwrap_or_default();
            if email.is_empty() {
                return Err(InputError::MalformedRow { line });
            }
            let unsubscribe_id = fields.get(1).copied().unwrap_or_default();
            Ok(Recipient::new(email, unsubscribe_id))
        })
        .collect()
}

async fn read(path: &Path) -> Result<String, InputError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| InputError::Read {
            path: path.to_path_buf(),
            source,
        })
}

/// Yield `(line_number, fields)` for every non-blank data row.
fn data_rows(raw: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    let mut first = true;

    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter(move |(_, line)| {
            let is_header = first && !line.contains('@');
            first = false;
            !is_header
        })
        .map(|(index, line)| (index + 1, line.split(',').map(clean_field).collect::<Vec<_>>()))
}

fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"').trim()
}
