//! Account activation by invitation
//!
//! Registration creates an inactive user and an invitation in one
//! transaction, emails the raw token, and stores only its SHA-256 digest.
//! Presenting the token before expiry activates the account and consumes
//! every invitation for that user.

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use serde_json::json;
use sha2::{Digest, Sha256};
use socialnet_shared::{NewUser, PendingInvitation, StoreError, User, UserId};
use time::{Duration, OffsetDateTime};

use crate::email::{MailError, Mailer, USER_INVITATION_TEMPLATE};
use crate::store::{InviteDelivery, UserStore};

const TOKEN_BYTES: usize = 32;

/// A fresh random opaque token, hex encoded
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// The one-way digest persisted in place of the token
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Result of a successful registration. `token` is never stored.
#[derive(Debug, Clone)]
pub struct Invited {
    pub user: User,
    pub token: String,
}

/// Sends the activation link while the registration is still uncommitted
struct InvitationEmail<'a> {
    mailer: &'a dyn Mailer,
    activation_url: String,
    sandbox: bool,
}

#[async_trait]
impl InviteDelivery for InvitationEmail<'_> {
    async fn deliver(&self, user: &User) -> Result<(), MailError> {
        let data = json!({
            "username": user.username,
            "activationURL": self.activation_url,
        });
        self.mailer
            .send(
                USER_INVITATION_TEMPLATE,
                &user.username,
                &user.email,
                &data,
                self.sandbox,
            )
            .await
    }
}

#[derive(Clone)]
pub struct InvitationService {
    users: Arc<dyn UserStore>,
    mailer: Arc<dyn Mailer>,
    ttl: Duration,
    client_url: String,
    sandbox: bool,
}

impl InvitationService {
    pub fn new(
        users: Arc<dyn UserStore>,
        mailer: Arc<dyn Mailer>,
        ttl: Duration,
        client_url: impl Into<String>,
        sandbox: bool,
    ) -> Self {
        Self {
            users,
            mailer,
            ttl,
            client_url: client_url.into(),
            sandbox,
        }
    }

    /// Link the invitee follows to activate the account
    pub fn activation_url(&self, token: &str) -> String {
        format!("{}/confirm/{}", self.client_url.trim_end_matches('/'), token)
    }

    /// Create an inactive user, persist the invitation digest and send the link.
    ///
    /// All-or-nothing: a duplicate, a storage failure or a delivery failure
    /// leaves no user and no invitation behind.
    pub async fn create_and_invite(&self, user: NewUser) -> Result<Invited, StoreError> {
        let token = generate_token();
        let invitation = PendingInvitation {
            token_hash: hash_token(&token),
            expires_at: OffsetDateTime::now_utc() + self.ttl,
        };
        let delivery = InvitationEmail {
            mailer: self.mailer.as_ref(),
            activation_url: self.activation_url(&token),
            sandbox: self.sandbox,
        };

        let user = self
            .users
            .create_and_invite(&user, &invitation, &delivery)
            .await
            .map_err(|e| {
                if let StoreError::Delivery(ref reason) = e {
                    tracing::error!(email = %user.email, reason = %reason, "Invitation email failed, registration rolled back");
                }
                e
            })?;

        tracing::info!(user_id = %user.id, expires_at = %invitation.expires_at, "Invitation issued");
        Ok(Invited { user, token })
    }

    /// Activate the account holding `token`.
    ///
    /// Unknown and expired tokens are both `NotFound`.
    pub async fn activate(&self, token: &str) -> Result<User, StoreError> {
        let user = self
            .users
            .activate(&hash_token(token), OffsetDateTime::now_utc())
            .await?;
        tracing::info!(user_id = %user.id, "User activated");
        Ok(user)
    }

    /// Remove a user and any invitation still pending for it
    pub async fn delete(&self, user_id: UserId) -> Result<(), StoreError> {
        self.users.delete(user_id).await?;
        tracing::info!(user_id = %user_id, "User deleted");
        Ok(())
    }
}
