//! Slack delivery for engine notifications.
//!
//! - `blocks` renders a [`SlackPost`](coverquote_core::ports::SlackPost) into an
//!   incoming-webhook payload with Block Kit sections and a severity colour bar.
//! - `webhook` posts that payload, or only logs it when no webhook URL is configured.

pub mod blocks;
pub mod webhook;

pub use webhook::{poster_from_config, LoggingSlackPoster, WebhookSlackPoster};
