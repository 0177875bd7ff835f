//! Shared fixtures for unit tests.

#![allow(clippy::unwrap_used)]

use std::sync::Mutex;

use async_trait::async_trait;
use tubesub_core::WebSubConfig;

use crate::hub::{HubClient, HubError, HubResponse, SubscribeForm};

pub const VERIFY_TOKEN: &str = "verify-me";
pub const SECRET: &str = "hmac-secret";

/// Config as a deployed mirror would have it.
pub fn test_config() -> WebSubConfig {
    WebSubConfig::new("https://mirror.example", "/websub/youtube")
        .with_verify_token(Some(VERIFY_TOKEN.into()))
        .with_secret(Some(SECRET.into()))
        .with_lease_seconds(432_000)
}

enum Reply {
    Status(u16, String),
    Unreachable,
}

/// In-memory hub that records every form it is sent.
pub struct FakeHub {
    reply: Mutex<Reply>,
    forms: Mutex<Vec<SubscribeForm>>,
}

impl FakeHub {
    fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            forms: Mutex::default(),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Reply::Status(202, String::new()))
    }

    pub fn with_status(status: u16, body: &str) -> Self {
        Self::new(Reply::Status(status, body.into()))
    }

    pub fn unreachable() -> Self {
        Self::new(Reply::Unreachable)
    }

    pub fn set_status(&self, status: u16, body: &str) {
        *self.reply.lock().unwrap() = Reply::Status(status, body.into());
    }

    pub fn forms(&self) -> Vec<SubscribeForm> {
        self.forms.lock().unwrap().clone()
    }
}

#[async_trait]
impl HubClient for FakeHub {
    async fn subscribe(&self, form: &SubscribeForm) -> Result<HubResponse, HubError> {
        self.forms.lock().unwrap().push(form.clone());
        match &*self.reply.lock().unwrap() {
            Reply::Status(status, body) => Ok(HubResponse {
                status: *status,
                body: body.clone(),
            }),
            Reply::Unreachable => Err(HubError::Config("connection refused".into())),
        }
    }
}
