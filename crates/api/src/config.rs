//! Application configuration

use std::env;
use std::str::FromStr;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    // Server
    pub bind_address: String,
    pub environment: String,
    /// Front-end base URL; activation links point here
    pub client_url: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub query_timeout_secs: u64,

    // Authentication
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_hours: i64,
    pub basic_auth_username: String,
    pub basic_auth_password: String,
    pub invitation_expiry_hours: i64,

    // Email
    pub resend_api_key: String,
    pub email_from: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            // Server
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            client_url: env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            // Database
            database_url: env::var("DATABASE_URL")
                .map_err(|_| ConfigError::Missing("DATABASE_URL"))?,
            database_max_connections: positive("DATABASE_MAX_CONNECTIONS", 30)?,
            query_timeout_secs: positive("QUERY_TIMEOUT_SECS", 5)?,

            // Authentication
            jwt_secret: {
                let secret =
                    env::var("JWT_SECRET").map_err(|_| ConfigError::Missing("JWT_SECRET"))?;
                if secret.len() < 32 {
                    return Err(ConfigError::WeakSecret(
                        "JWT_SECRET must be at least 32 characters",
                    ));
                }
                secret
            },
            jwt_issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "socialnet".to_string()),
            jwt_audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "socialnet".to_string()),
            jwt_expiry_hours: positive("JWT_EXPIRY_HOURS", 72)?,
            basic_auth_username: non_empty("BASIC_AUTH_USERNAME")?,
            basic_auth_password: non_empty("BASIC_AUTH_PASSWORD")?,
            invitation_expiry_hours: positive("INVITATION_EXPIRY_HOURS", 72)?,

            // Email
            resend_api_key: env::var("RESEND_API_KEY").unwrap_or_default(),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "SocialNet <noreply@localhost>".to_string()),
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Outside production, mail is rendered and logged but never sent.
    pub fn mail_sandbox(&self) -> bool {
        !self.is_production()
    }
}

fn non_empty(name: &'static str) -> Result<String, ConfigError> {
    match env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ConfigError::Missing(name)),
    }
}

/// A positive number, or `default` when unset
fn positive<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + PartialOrd + Default,
{
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.parse::<T>() {
        Ok(value) if value > T::default() => Ok(value),
        _ => Err(ConfigError::Invalid {
            name,
            reason: "must be a positive integer",
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("Weak secret: {0}")]
    WeakSecret(&'static str),
    #[error("Invalid value for {name}: {reason}")]
    Invalid {
        name: &'static str,
        reason: &'static str,
    },
}
