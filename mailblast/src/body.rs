//! Message body loading.

use std::io;
use std::path::Path;

use tracing::{info, warn};

use crate::recipients::InputError;

/// Subject and HTML content sent unchanged to every recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody {
    pub subject: String,
    pub html: String,
}

impl MessageBody {
    pub fn new(subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            html: html.into(),
        }
    }

    /// A body with no subject or no content cannot be sent.
    pub fn is_empty(&self) -> bool {
        self.subject.trim().is_empty() || self.html.trim().is_empty()
    }
}

/// Read the HTML body from disk and pair it with the configured subject.
///
/// A missing file yields an empty body; any other read failure is an error.
pub async fn load_body(path: &Path, subject: Option<&str>) -> Result<MessageBody, InputError> {
    let html = match tokio::fs::read_to_string(path).await {
        Ok(html) => html,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "body_file_missing");
            String::new()
        }
        Err(source) => {
            return Err(InputError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let body = MessageBody::new(subject.unwrap_or_default(), html);

    info!(
        path = %path.display(),
        subject_length = body.subject.len(),
        html_length = body.html.len(),
        "body_loaded"
    );

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_is_empty() {
        assert!(MessageBody::new("", "<p>Hi</p>").is_empty());
        assert!(MessageBody::new("Hello", "  \n").is_empty());
        assert!(!MessageBody::new("Hello", "<p>Hi</p>").is_empty());
    }

    #[tokio::test]
    async fn test_load_body() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<p>News</p>").unwrap();

        let body = load_body(file.path(), Some("Monthly update")).await.unwrap();
        assert_eq!(body, MessageBody::new("Monthly update", "<p>News</p>"));
    }

    #[tokio::test]
    async fn test_load_body_without_subject_is_empty() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "<p>News</p>").unwrap();

        let body = load_body(file.path(), None).await.unwrap();
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_load_body_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let body = load_body(&dir.path().join("emailBody.html"), Some("Monthly update"))
            .await
            .unwrap();

        assert!(body.is_empty());
        assert_eq!(body.subject, "Monthly update");
    }
}
