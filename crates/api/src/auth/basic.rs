//! Static credential check for operational endpoints

use base64::{engine::general_purpose::STANDARD, Engine};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Challenge sent with every Basic auth rejection
pub const BASIC_CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;

/// Configured operational credential pair.
///
/// Both halves are kept as SHA-256 digests so comparisons run over
/// equal-length inputs regardless of what the client sends.
#[derive(Clone)]
pub struct BasicCredentials {
    username_digest: [u8; 32],
    password_digest: [u8; 32],
}

impl BasicCredentials {
    pub fn new(username: &str, password: &str) -> Self {
        Self {
            username_digest: digest(username),
            password_digest: digest(password),
        }
    }

    /// Constant-time check of both halves. Never short-circuits.
    pub fn verify(&self, username: &str, password: &str) -> bool {
        let username_ok = self.username_digest.ct_eq(&digest(username));
        let password_ok = self.password_digest.ct_eq(&digest(password));
        (username_ok & password_ok).into()
    }
}

impl std::fmt::Debug for BasicCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasicCredentials").finish_non_exhaustive()
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BasicAuthError {
    #[error("authorization header is not of the form `Basic <credentials>`")]
    Malformed,
    #[error("credentials are not valid base64")]
    Encoding,
    #[error("credentials are not valid UTF-8")]
    Utf8,
    #[error("credentials lack a `:` separator")]
    MissingSeparator,
}

/// Decode a `Basic <base64(user:pass)>` header value.
///
/// The password may itself contain `:`; only the first one separates.
pub fn parse_basic_authorization(header: &str) -> Result<(String, String), BasicAuthError> {
    let mut parts = header.split(' ');
    let (scheme, encoded) = match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(encoded), None) => (scheme, encoded),
        _ => return Err(BasicAuthError::Malformed),
    };
    if scheme != "Basic" {
        return Err(BasicAuthError::Malformed);
    }

    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| BasicAuthError::Encoding)?;
    let decoded = String::from_utf8(decoded).map_err(|_| BasicAuthError::Utf8)?;

    decoded
        .split_once(':')
        .map(|(user, pass)| (user.to_string(), pass.to_string()))
        .ok_or(BasicAuthError::MissingSeparator)
}
