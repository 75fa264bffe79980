//! Role precedence authorization for content mutation

use std::sync::Arc;

use socialnet_shared::{Role, StoreError, User, UserId};

use crate::store::RoleStore;

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// The required role is not configured. A deployment bug, not a denial.
    #[error("Role `{0}` is not configured")]
    UnknownRole(String),
    #[error(transparent)]
    Store(StoreError),
}

/// Whether `held` ranks at or above `required`
pub fn dominates(held: &Role, required: &Role) -> bool {
    held.level >= required.level
}

#[derive(Clone)]
pub struct RoleAuthorizer {
    roles: Arc<dyn RoleStore>,
}

impl RoleAuthorizer {
    pub fn new(roles: Arc<dyn RoleStore>) -> Self {
        Self { roles }
    }

    /// Decide whether `principal` may act on a resource owned by `owner_id`.
    ///
    /// Owners are always allowed and the role is never looked up for them.
    /// Everyone else needs a role level at least that of `required_role`.
    pub async fn authorize(
        &self,
        principal: &User,
        owner_id: UserId,
        required_role: &str,
    ) -> Result<bool, AuthzError> {
        if principal.id == owner_id {
            return Ok(true);
        }

        let required = self
            .roles
            .get_by_name(required_role)
            .await
            .map_err(|e| match e {
                StoreError::NotFound => AuthzError::UnknownRole(required_role.to_string()),
                other => AuthzError::Store(other),
            })?;

        Ok(dominates(&principal.role, &required))
    }
}
