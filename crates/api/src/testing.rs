//! Test doubles and an in-memory application

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::Config;
use crate::email::{MailError, Mailer};
use crate::state::AppState;
use crate::store::{memory::MemoryStore, Storage};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-must-be-at-least-32-characters-long";
pub const TEST_BASIC_USER: &str = "ops";
pub const TEST_BASIC_PASSWORD: &str = "s3cret";

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub template_id: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub data: Value,
    pub sandbox: bool,
}

/// Mailer that records every message and always succeeds
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentEmail>>,
}

impl RecordingMailer {
    pub async fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(
        &self,
        template_id: &str,
        recipient_name: &str,
        recipient_email: &str,
        data: &Value,
        sandbox: bool,
    ) -> Result<(), MailError> {
        self.sent.lock().await.push(SentEmail {
            template_id: template_id.to_string(),
            recipient_name: recipient_name.to_string(),
            recipient_email: recipient_email.to_string(),
            data: data.clone(),
            sandbox,
        });
        Ok(())
    }
}

/// Mailer whose provider is permanently unreachable
pub struct FailingMailer;

#[async_trait]
impl Mailer for FailingMailer {
    async fn send(
        &self,
        _template_id: &str,
        _recipient_name: &str,
        _recipient_email: &str,
        _data: &Value,
        _sandbox: bool,
    ) -> Result<(), MailError> {
        Err(MailError::Exhausted {
            attempts: crate::email::MAX_ATTEMPTS,
            last: Box::new(MailError::Transport("connection refused".to_string())),
        })
    }
}

pub fn test_config() -> Config {
    Config {
        bind_address: "127.0.0.1:0".to_string(),
        environment: "test".to_string(),
        client_url: "http://localhost:5173".to_string(),
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        query_timeout_secs: 5,
        jwt_secret: TEST_JWT_SECRET.to_string(),
        jwt_issuer: "socialnet".to_string(),
        jwt_audience: "socialnet".to_string(),
        jwt_expiry_hours: 1,
        basic_auth_username: TEST_BASIC_USER.to_string(),
        basic_auth_password: TEST_BASIC_PASSWORD.to_string(),
        invitation_expiry_hours: 1,
        resend_api_key: String::new(),
        email_from: "SocialNet <noreply@localhost>".to_string(),
    }
}

/// Application state over a fresh in-memory store
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::default());
        let state = AppState::new(config, Storage::from_backend(store.clone()), mailer.clone());
        Self {
            store,
            mailer,
            state,
        }
    }

    /// A bearer token for `user_id`
    pub fn token_for(&self, user: &socialnet_shared::User) -> String {
        self.state
            .jwt
            .issue(user.id)
            .expect("issue test token")
            .token
    }
}
