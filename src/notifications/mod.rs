//! Notification channels for alert delivery.

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

pub mod webhook;

pub use webhook::WebhookSender;

#[derive(Debug, Error)]
pub enum SenderError {
    #[error("failed to send notification: {0}")]
    SendFailed(String),
    #[error("invalid configuration for sender: {0}")]
    InvalidConfiguration(String),
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
    #[error("templating error: {0}")]
    TemplatingError(String),
}

/// A trait for delivering an alert message to one channel type.
///
/// `context` carries the alert event fields (target id, name, old/new status,
/// timestamp) for channels that support templating.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError>;
}
