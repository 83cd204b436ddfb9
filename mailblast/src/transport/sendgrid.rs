//! SendGrid v3 mail-send client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};
use url::Url;

use super::{SendError, Transport};
use crate::body::MessageBody;
use crate::config::RunConfiguration;
use crate::recipients::Recipient;

/// Path of the mail-send endpoint relative to the API base URL.
const MAIL_SEND_PATH: &str = "/v3/mail/send";

/// Placeholder in the body replaced with the recipient's unsubscribe id.
pub const UNSUBSCRIBE_PLACEHOLDER: &str = "{{unsubscribeId}}";

/// Transport that posts each message to the SendGrid API.
#[derive(Debug, Clone)]
pub struct SendGridTransport {
    client: Client,
    endpoint: Url,
}

impl SendGridTransport {
    /// Create a transport for the given API base URL.
    pub fn new(api_url: &str, timeout: Duration) -> Result<Self, SendError> {
        let endpoint = Url::parse(api_url)?.join(MAIL_SEND_PATH)?;

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for SendGridTransport {
    async fn send(
        &self,
        config: &RunConfiguration,
        recipient: &Recipient,
        body: &MessageBody,
    ) -> Result<(), SendError> {
        let payload = MailSendRequest::new(config, recipient, body);

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&config.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                error!(to = %recipient.email, error = %e, is_timeout = e.is_timeout(), "sendgrid_request_error");
                SendError::Http(e)
            })?;

        let status = response.status();
        if status.is_success() {
            info!(to = %recipient.email, status_code = status.as_u16(), "sendgrid_accepted");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        error!(
            to = %recipient.email,
            status_code = status.as_u16(),
            response_length = body.len(),
            "sendgrid_rejected"
        );

        Err(SendError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
    substitutions: Substitutions<'a>,
    custom_args: CustomArgs<'a>,
}

#[derive(Debug, Serialize)]
struct Substitutions<'a> {
    #[serde(rename = "{{unsubscribeId}}")]
    unsubscribe_id: &'a str,
}

#[derive(Debug, Serialize)]
struct CustomArgs<'a> {
    #[serde(rename = "unsubscribeId")]
    unsubscribe_id: &'a str,
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    content_type: &'a str,
    value: &'a str,
}

impl<'a> MailSendRequest<'a> {
    fn new(config: &'a RunConfiguration, recipient: &'a Recipient, body: &'a MessageBody) -> Self {
        Self {
            personalizations: [Personalization {
                to: [Address {
                    email: &recipient.email,
                    name: None,
                }],
                substitutions: Substitutions {
                    unsubscribe_id: &recipient.unsubscribe_id,
                },
                custom_args: CustomArgs {
                    unsubscribe_id: &recipient.unsubscribe_id,
                },
            }],
            from: Address {
                email: &config.from_email,
                name: config.from_name.as_deref(),
            },
            subject: &body.subject,
            content: [Content {
                content_type: "text/html",
                value: &body.html,
            }],
        }
    }
}
