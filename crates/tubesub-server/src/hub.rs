//! Outbound client for the WebSub hub.
//!
//! The only outbound call is the subscribe request: a form-encoded POST that
//! the hub acknowledges (`202 Accepted`) before verifying asynchronously
//! against our callback.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Longest slice of a hub error body kept for `last_error`.
const ERROR_BODY_CHARS: usize = 200;

/// Hub client errors.
#[derive(Debug, Error)]
pub enum HubError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Form fields of a subscribe request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeForm {
    pub topic: String,
    pub callback: String,
    pub verify_token: String,
    pub secret: Option<String>,
    pub lease_seconds: Option<u64>,
}

impl SubscribeForm {
    /// Form pairs in wire order.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("hub.mode", "subscribe".to_string()),
            ("hub.topic", self.topic.clone()),
            ("hub.callback", self.callback.clone()),
            ("hub.verify", "async".to_string()),
            ("hub.verify_token", self.verify_token.clone()),
        ];
        if let Some(secret) = &self.secret {
            pairs.push(("hub.secret", secret.clone()));
        }
        if let Some(lease) = self.lease_seconds {
            pairs.push(("hub.lease_seconds", lease.to_string()));
        }
        pairs
    }
}

/// What the hub answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubResponse {
    pub status: u16,
    /// Response body, truncated; only kept for non-2xx answers.
    pub body: String,
}

impl HubResponse {
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Seam between the subscriber and the network.
#[async_trait]
pub trait HubClient: Send + Sync {
    async fn subscribe(&self, form: &SubscribeForm) -> Result<HubResponse, HubError>;
}

/// `reqwest`-backed hub client.
#[derive(Debug, Clone)]
pub struct ReqwestHub {
    http: reqwest::Client,
    hub_url: String,
}

impl ReqwestHub {
    /// Create a client posting to `hub_url`.
    pub fn new(hub_url: &str) -> Result<Self, HubError> {
        let hub_url = hub_url.trim();
        if hub_url.is_empty() {
            return Err(HubError::Config("hub URL is empty".into()));
        }

        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .user_agent(concat!("tubesub/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            hub_url: hub_url.to_string(),
        })
    }

    pub fn hub_url(&self) -> &str {
        &self.hub_url
    }
}

#[async_trait]
impl HubClient for ReqwestHub {
    async fn subscribe(&self, form: &SubscribeForm) -> Result<HubResponse, HubError> {
        let response = self
            .http
            .post(&self.hub_url)
            .form(&form.to_pairs())
            .send()
            .await?;

        let status = response.status();
        let body = if status.is_success() {
            String::new()
        } else {
            let text = response.text().await.unwrap_or_default();
            text.chars().take(ERROR_BODY_CHARS).collect()
        };

        debug!(status = status.as_u16(), topic = %form.topic, "Hub answered subscribe request");

        Ok(HubResponse {
            status: status.as_u16(),
            body,
        })
    }
}
