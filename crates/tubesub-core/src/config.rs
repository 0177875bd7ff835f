//! WebSub configuration.
//!
//! Loaded once at process start (from CLI flags / environment in the binary),
//! validated, and then shared immutably by every component through an `Arc`.
//! Nothing reads the process environment after startup.

use std::fmt;

use crate::error::{Error, Result};

/// Default hub used by the mirrored channels.
pub const DEFAULT_HUB_URL: &str = "https://pubsubhubbub.appspot.com/subscribe";

/// Default callback path mounted by the server.
pub const DEFAULT_CALLBACK_PATH: &str = "/websub/youtube";

/// Lease hint sent to the hub (5 days).
pub const DEFAULT_LEASE_SECONDS: u64 = 432_000;

/// A subscribe request is skipped while the active lease has more than this
/// left (2 days).
pub const MIN_REMAINING_LEASE_SECS: i64 = 2 * 24 * 60 * 60;

/// How long after a subscribe request the hub's verification callback is
/// still accepted (15 minutes).
pub const VERIFICATION_WINDOW_SECS: i64 = 15 * 60;

/// Immutable WebSub settings.
#[derive(Clone, PartialEq, Eq)]
pub struct WebSubConfig {
    /// Hub subscribe endpoint.
    pub hub_url: String,
    /// Absolute callback URL the hub verifies and delivers to.
    pub callback_url: String,
    /// Shared `hub.verify_token`. `None` is a misconfiguration surfaced per request.
    pub verify_token: Option<String>,
    /// Shared `hub.secret` used for HMAC signatures.
    pub secret: Option<String>,
    /// `hub.lease_seconds` hint; `None` lets the hub pick.
    pub lease_seconds: Option<u64>,
    pub min_remaining_lease_secs: i64,
    pub verification_window_secs: i64,
}

impl WebSubConfig {
    /// Build a config for `public_origin` (e.g. `https://mirror.example`)
    /// with the callback mounted at `callback_path`.
    pub fn new(public_origin: &str, callback_path: &str) -> Self {
        let origin = public_origin.trim().trim_end_matches('/');
        let path = if callback_path.starts_with('/') {
            callback_path.to_string()
        } else {
            format!("/{callback_path}")
        };

        Self {
            hub_url: DEFAULT_HUB_URL.to_string(),
            callback_url: format!("{origin}{path}"),
            verify_token: None,
            secret: None,
            lease_seconds: Some(DEFAULT_LEASE_SECONDS),
            min_remaining_lease_secs: MIN_REMAINING_LEASE_SECS,
            verification_window_secs: VERIFICATION_WINDOW_SECS,
        }
    }

    #[must_use]
    pub fn with_hub_url(mut self, hub_url: impl Into<String>) -> Self {
        self.hub_url = hub_url.into();
        self
    }

    /// Set the verify token. Blank values count as unset.
    #[must_use]
    pub fn with_verify_token(mut self, token: Option<String>) -> Self {
        self.verify_token = non_blank(token);
        self
    }

    /// Set the signing secret. Blank values count as unset.
    #[must_use]
    pub fn with_secret(mut self, secret: Option<String>) -> Self {
        self.secret = non_blank(secret);
        self
    }

    /// Set the lease hint; `0` means "let the hub decide".
    #[must_use]
    pub const fn with_lease_seconds(mut self, lease_seconds: u64) -> Self {
        self.lease_seconds = if lease_seconds == 0 {
            None
        } else {
            Some(lease_seconds)
        };
        self
    }

    /// Path component of the callback URL, where the server mounts the
    /// WebSub endpoint. Falls back to `/` for a bare origin.
    pub fn callback_path(&self) -> &str {
        let after_scheme = self
            .callback_url
            .split_once("://")
            .map_or(self.callback_url.as_str(), |(_, rest)| rest);
        let path = after_scheme.find('/').map_or("/", |i| &after_scheme[i..]);
        path.split(['?', '#']).next().unwrap_or("/")
    }

    /// Check the values that can never work at runtime.
    ///
    /// A missing verify token or secret is *not* rejected here: the handlers
    /// report it per request (500) so an operator sees it in the hub's
    /// delivery diagnostics as well as in logs.
    pub fn validate(&self) -> Result<()> {
        if !is_http_url(&self.hub_url) {
            return Err(Error::Config(format!(
                "hub URL must be an absolute http(s) URL: {:?}",
                self.hub_url
            )));
        }
        if !is_http_url(&self.callback_url) {
            return Err(Error::Config(format!(
                "callback URL must be an absolute http(s) URL: {:?}",
                self.callback_url
            )));
        }
        if self.min_remaining_lease_secs < 0 || self.verification_window_secs <= 0 {
            return Err(Error::Config("lease windows must be positive".into()));
        }
        Ok(())
    }
}

impl fmt::Debug for WebSubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSubConfig")
            .field("hub_url", &self.hub_url)
            .field("callback_url", &self.callback_url)
            .field("verify_token", &redacted(self.verify_token.as_ref()))
            .field("secret", &redacted(self.secret.as_ref()))
            .field("lease_seconds", &self.lease_seconds)
            .field("min_remaining_lease_secs", &self.min_remaining_lease_secs)
            .field("verification_window_secs", &self.verification_window_secs)
            .finish()
    }
}

fn redacted(value: Option<&String>) -> Option<&'static str> {
    value.map(|_| "<redacted>")
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_http_url(value: &str) -> bool {
    let rest = value
        .strip_prefix("https://")
        .or_else(|| value.strip_prefix("http://"));
    rest.is_some_and(|r| !r.is_empty() && !r.starts_with('/'))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn callback_url_joins_origin_and_path() {
        let cfg = WebSubConfig::new("https://mirror.example/", "websub/youtube");
        assert_eq!(cfg.callback_url, "https://mirror.example/websub/youtube");

        let cfg = WebSubConfig::new("https://mirror.example", DEFAULT_CALLBACK_PATH);
        assert_eq!(cfg.callback_url, "https://mirror.example/websub/youtube");
    }

    #[test]
    fn callback_path_is_extracted_from_url() {
        let cfg = WebSubConfig::new("https://mirror.example:8443", "/websub/youtube");
        assert_eq!(cfg.callback_path(), "/websub/youtube");

        let cfg = WebSubConfig::new("http://localhost", "/");
        assert_eq!(cfg.callback_path(), "/");

        let mut cfg = WebSubConfig::new("https://m.example", "/cb");
        cfg.callback_url = "https://m.example/hook?x=1".into();
        assert_eq!(cfg.callback_path(), "/hook");
        cfg.callback_url = "https://m.example".into();
        assert_eq!(cfg.callback_path(), "/");
    }

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = WebSubConfig::new("https://m.example", DEFAULT_CALLBACK_PATH);
        assert_eq!(cfg.hub_url, DEFAULT_HUB_URL);
        assert_eq!(cfg.lease_seconds, Some(432_000));
        assert_eq!(cfg.min_remaining_lease_secs, 172_800);
        assert_eq!(cfg.verification_window_secs, 900);
        assert!(cfg.verify_token.is_none());
        assert!(cfg.secret.is_none());
    }

    #[test]
    fn blank_secrets_count_as_unset() {
        let cfg = WebSubConfig::new("https://m.example", "/cb")
            .with_verify_token(Some("  ".into()))
            .with_secret(Some(String::new()));
        assert!(cfg.verify_token.is_none());
        assert!(cfg.secret.is_none());

        let cfg = cfg
            .with_verify_token(Some("tok".into()))
            .with_secret(Some("sec".into()));
        assert_eq!(cfg.verify_token.as_deref(), Some("tok"));
        assert_eq!(cfg.secret.as_deref(), Some("sec"));
    }

    #[test]
    fn debug_output_redacts_shared_secrets() {
        let cfg = WebSubConfig::new("https://m.example", "/cb")
            .with_verify_token(Some("tok-value-123".into()))
            .with_secret(Some("hmac-secret-456".into()));
        let debug = format!("{cfg:?}");
        assert!(!debug.contains("tok-value-123"));
        assert!(!debug.contains("hmac-secret-456"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("https://m.example/cb"));

        let unset = format!("{:?}", WebSubConfig::new("https://m.example", "/cb"));
        assert!(unset.contains("secret: None"));
    }

    #[test]
    fn zero_lease_means_hub_default() {
        let cfg = WebSubConfig::new("https://m.example", "/cb").with_lease_seconds(0);
        assert!(cfg.lease_seconds.is_none());
    }

    #[test]
    fn validate_rejects_relative_callback() {
        let cfg = WebSubConfig::new("", "/cb");
        assert!(matches!(cfg.validate(), Err(Error::Config(_))));

        let cfg = WebSubConfig::new("https://m.example", "/cb").with_hub_url("ftp://hub");
        assert!(cfg.validate().is_err());

        let cfg = WebSubConfig::new("http://localhost:8080", "/cb");
        cfg.validate().unwrap();
    }
}
