//! Delivery of a single message.
//!
//! The dispatch loop only sees the [`Transport`] trait; the SendGrid HTTP
//! client is the production implementation.

pub mod sendgrid;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::body::MessageBody;
use crate::config::RunConfiguration;
use crate::recipients::Recipient;

pub use sendgrid::SendGridTransport;

/// Why a single send did not go through.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider rejected the message with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("send timed out after {0:?}")]
    Timeout(Duration),

    #[error("invalid api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Sends one message to one recipient.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        config: &RunConfiguration,
        recipient: &Recipient,
        body: &MessageBody,
    ) -> Result<(), SendError>;
}
