use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use coverquote_core::config::SlackConfig;
use coverquote_core::ports::{NotificationError, SlackPost, SlackPoster};

use crate::blocks::notification_message;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Posts notifications to a Slack incoming webhook.
pub struct WebhookSlackPoster {
    client: Client,
    webhook_url: SecretString,
}

impl WebhookSlackPoster {
    pub fn new(webhook_url: SecretString) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .build()
            .map_err(|error| NotificationError(format!("slack client: {error}")))?;
        Ok(Self { client, webhook_url })
    }
}

#[async_trait]
impl SlackPoster for WebhookSlackPoster {
    async fn post(&self, post: &SlackPost) -> Result<(), NotificationError> {
        let message = notification_message(post);
        let response = self
            .client
            .post(self.webhook_url.expose_secret())
            .json(&message)
            .send()
            .await
            .map_err(|error| NotificationError(format!("slack webhook request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "slack.webhook.rejected",
                channel = %post.channel,
                status = status.as_u16(),
                body = %body,
                "slack rejected notification"
            );
            return Err(NotificationError(format!("slack webhook returned {status}: {body}")));
        }

        debug!(event_name = "slack.webhook.posted", channel = %post.channel, "slack notification sent");
        Ok(())
    }
}

/// Stand-in used when no webhook is configured: the post is only logged.
#[derive(Default)]
pub struct LoggingSlackPoster;

#[async_trait]
impl SlackPoster for LoggingSlackPoster {
    async fn post(&self, post: &SlackPost) -> Result<(), NotificationError> {
        info!(
            event_name = "slack.webhook.skipped",
            channel = %post.channel,
            severity = ?post.severity,
            message = %post.message,
            "slack webhook not configured; notification logged only"
        );
        Ok(())
    }
}

pub fn poster_from_config(
    config: &SlackConfig,
) -> Result<std::sync::Arc<dyn SlackPoster>, NotificationError> {
    match config.webhook_url.clone() {
        Some(url) => Ok(std::sync::Arc::new(WebhookSlackPoster::new(url)?)),
        None => Ok(std::sync::Arc::new(LoggingSlackPoster)),
    }
}
