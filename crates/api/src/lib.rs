//! SocialNet API Library
//!
//! Identity, authorization and content routes for the SocialNet service.

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod invitations;
pub mod routes;
pub mod security;
pub mod state;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
