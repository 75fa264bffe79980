//! Shared application state

use std::sync::Arc;

use time::Duration;

use crate::auth::{AuthState, BasicCredentials, JwtManager, OwnershipGuard, RoleAuthorizer};
use crate::config::Config;
use crate::email::Mailer;
use crate::invitations::InvitationService;
use crate::store::Storage;

/// Role a non-owner needs to edit someone else's post
pub const POST_UPDATE_ROLE: &str = "moderator";
/// Role a non-owner needs to delete someone else's post or account
pub const DELETE_ROLE: &str = "admin";
/// Role every new account starts with
pub const DEFAULT_ROLE: &str = "user";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Storage,
    pub jwt: JwtManager,
    pub basic: BasicCredentials,
    pub invitations: InvitationService,
    pub authorizer: RoleAuthorizer,
}

impl AppState {
    /// Wire every component from the loaded configuration
    pub fn new(config: Config, storage: Storage, mailer: Arc<dyn Mailer>) -> Self {
        let jwt = JwtManager::new(
            &config.jwt_secret,
            &config.jwt_issuer,
            &config.jwt_audience,
            Duration::hours(config.jwt_expiry_hours),
        );
        let basic = BasicCredentials::new(&config.basic_auth_username, &config.basic_auth_password);
        let invitations = InvitationService::new(
            storage.users.clone(),
            mailer,
            Duration::hours(config.invitation_expiry_hours),
            config.client_url.clone(),
            config.mail_sandbox(),
        );
        let authorizer = RoleAuthorizer::new(storage.roles.clone());

        Self {
            config: Arc::new(config),
            storage,
            jwt,
            basic,
            invitations,
            authorizer,
        }
    }

    /// State for the bearer and basic guards
    pub fn auth_state(&self) -> AuthState {
        AuthState {
            jwt: self.jwt.clone(),
            users: self.storage.users.clone(),
            basic: self.basic.clone(),
        }
    }

    /// Ownership guard for non-owners holding at least `required_role`
    pub fn ownership_guard(&self, required_role: &'static str) -> OwnershipGuard {
        OwnershipGuard::new(self.authorizer.clone(), required_role)
    }
}
