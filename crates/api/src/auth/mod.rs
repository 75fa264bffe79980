//! Authentication and authorization for SocialNet

pub mod authorizer;
pub mod basic;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use authorizer::{AuthzError, RoleAuthorizer};
pub use basic::BasicCredentials;
pub use jwt::{Claims, IssuedToken, JwtError, JwtManager};
pub use middleware::{
    require_basic, require_bearer, require_owner_or_role, AuthState, AuthUser, OwnershipGuard,
    ResourceOwner,
};
pub use password::{hash_password, validate_password, verify_password, PasswordError};
