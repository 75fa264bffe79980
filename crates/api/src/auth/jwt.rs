//! Session token issuance and validation
//!
//! Tokens are HS256-signed and self-contained. There is no revocation list:
//! a token is valid from issuance until its `exp` claim, then expired.

use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use serde::{Deserialize, Serialize};
use socialnet_shared::UserId;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// The only algorithm this service signs with or accepts.
const SIGNING_ALGORITHM: Algorithm = Algorithm::HS256;

/// JWT claims structure for SocialNet-issued tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID, decimal string)
    pub sub: String,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Issued at
    pub iat: i64,
    /// Not before
    pub nbf: i64,
    /// Expiration
    pub exp: i64,
    /// JWT ID, for log correlation only
    pub jti: String,
}

impl Claims {
    /// Decode the subject claim into a user id.
    pub fn user_id(&self) -> Result<UserId, JwtError> {
        self.sub
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| JwtError::InvalidSubject)
    }
}

/// A freshly signed token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub jti: String,
    pub expires_at: OffsetDateTime,
}

/// JWT manager for token operations
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    ttl: Duration,
}

impl JwtManager {
    /// Create a new JWT manager
    pub fn new(secret: &str, issuer: &str, audience: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.to_string(),
            audience: audience.to_string(),
            ttl,
        }
    }

    /// Issue a session token for `user_id` with the configured lifetime
    pub fn issue(&self, user_id: UserId) -> Result<IssuedToken, JwtError> {
        self.issue_with_ttl(user_id, self.ttl)
    }

    /// Issue a session token expiring `ttl` from now
    pub fn issue_with_ttl(&self, user_id: UserId, ttl: Duration) -> Result<IssuedToken, JwtError> {
        if !ttl.is_positive() {
            return Err(JwtError::InvalidTtl);
        }

        let now = OffsetDateTime::now_utc();
        let expires_at = now + ttl;
        let jti = Uuid::new_v4().to_string();

        let claims = Claims {
            sub: user_id.to_string(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.unix_timestamp(),
            nbf: now.unix_timestamp(),
            exp: expires_at.unix_timestamp(),
            jti: jti.clone(),
        };

        let token = encode(&Header::new(SIGNING_ALGORITHM), &claims, &self.encoding_key)
            .map_err(|e| JwtError::Encoding(e.to_string()))?;

        Ok(IssuedToken {
            token,
            jti,
            expires_at,
        })
    }

    /// Validate and decode a token.
    ///
    /// The header must assert exactly HS256; `exp`, `iss`, `aud` and `sub`
    /// are mandatory. Callers must not expose which check failed.
    pub fn validate(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(SIGNING_ALGORITHM);
        validation.algorithms = vec![SIGNING_ALGORITHM];
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.set_issuer(&[self.issuer.as_str()]);
        validation.set_audience(&[self.audience.as_str()]);

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(JwtError::from)?;

        // The library tolerates `exp == now`; a token is dead at its expiry instant.
        if claims.exp <= OffsetDateTime::now_utc().unix_timestamp() {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

/// Token failures. Distinguishable for logging, never for the caller.
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token has expired")]
    Expired,
    #[error("Token is not valid yet")]
    NotYetValid,
    #[error("Token signature mismatch")]
    InvalidSignature,
    #[error("Token uses an unexpected algorithm")]
    InvalidAlgorithm,
    #[error("Token issuer mismatch")]
    InvalidIssuer,
    #[error("Token audience mismatch")]
    InvalidAudience,
    #[error("Token is missing required claim: {0}")]
    MissingClaim(String),
    #[error("Token subject is not a user id")]
    InvalidSubject,
    #[error("Token lifetime must be positive")]
    InvalidTtl,
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Token encoding failed: {0}")]
    Encoding(String),
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::ImmatureSignature => JwtError::NotYetValid,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                JwtError::InvalidAlgorithm
            }
            ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
            ErrorKind::InvalidAudience => JwtError::InvalidAudience,
            ErrorKind::MissingRequiredClaim(claim) => JwtError::MissingClaim(claim.clone()),
            _ => JwtError::Malformed(err.to_string()),
        }
    }
}
