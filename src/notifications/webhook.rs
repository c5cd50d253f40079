use async_trait::async_trait;
use reqwest::{Client, Method, header};
use serde::Deserialize;
use std::collections::HashMap;
use tera::{Context, Tera};

use super::{NotificationSender, SenderError};

/// Configuration for one webhook channel, loaded from the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    #[serde(default = "default_method")]
    pub method: String,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    /// Tera template for the POST body; alert fields like `{{ name }}` and
    /// `{{ new_status }}` are available. Without a template the plain message
    /// is sent.
    #[serde(default)]
    pub body_template: Option<String>,
}

fn default_method() -> String {
    "POST".to_string()
}

/// A sender for pushing alerts via a custom webhook.
pub struct WebhookSender {
    client: Client,
    config: WebhookConfig,
}

impl WebhookSender {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        message: &str,
        context: &HashMap<String, String>,
    ) -> Result<(), SenderError> {
        let method = match self.config.method.to_uppercase().as_str() {
            "POST" => Method::POST,
            "GET" => Method::GET,
            other => {
                return Err(SenderError::InvalidConfiguration(format!(
                    "unsupported HTTP method: {other}"
                )));
            }
        };

        let mut request = self.client.request(method.clone(), &self.config.url);

        if let Some(headers) = &self.config.headers {
            let mut header_map = header::HeaderMap::new();
            for (key, value) in headers {
                let name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("invalid header name: {e}"))
                })?;
                let value = header::HeaderValue::from_str(value).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("invalid header value: {e}"))
                })?;
                header_map.insert(name, value);
            }
            request = request.headers(header_map);
        }

        if method == Method::POST {
            let template = self.config.body_template.as_deref().unwrap_or(message);
            let mut tera_context = Context::new();
            for (key, value) in context {
                tera_context.insert(key, value);
            }
            let body = Tera::one_off(template, &tera_context, true)
                .map_err(|e| SenderError::TemplatingError(e.to_string()))?;
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(SenderError::SendFailed(format!(
                "webhook returned non-success status {status}: {body}"
            )));
        }

        Ok(())
    }
}
