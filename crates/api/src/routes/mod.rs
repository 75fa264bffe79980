//! API routes

pub mod auth;
pub mod health;
pub mod posts;
pub mod users;

use std::time::Duration;

use axum::{
    error_handling::HandleErrorLayer,
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;

use crate::{
    auth::{require_basic, require_bearer, require_owner_or_role},
    error::{handle_middleware_error, ApiError},
    security::security_headers_middleware,
    state::{AppState, DELETE_ROLE, POST_UPDATE_ROLE},
};

/// Request bodies larger than this are rejected before parsing
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    let auth_state = state.auth_state();

    // Operational routes (static credential)
    let ops_routes = Router::new()
        .route("/health", get(health::health))
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), require_basic));

    // Public routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register_user))
        .route("/auth/token", post(auth::create_token))
        .route("/users/activate/:token", put(users::activate_user));

    // Routes addressing one user. Layers run bottom-up: bearer, then load_user,
    // then any per-method ownership guard.
    let user_routes = Router::new()
        .route(
            "/users/:user_id",
            get(users::get_user).delete(users::delete_user.layer(
                middleware::from_fn_with_state(
                    state.ownership_guard(DELETE_ROLE),
                    require_owner_or_role,
                ),
            )),
        )
        .route("/users/:user_id/follow", put(users::follow_user))
        .route("/users/:user_id/unfollow", put(users::unfollow_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), users::load_user))
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), require_bearer));

    // Routes addressing one post
    let post_routes = Router::new()
        .route(
            "/posts/:post_id",
            get(posts::get_post)
                .patch(posts::update_post.layer(middleware::from_fn_with_state(
                    state.ownership_guard(POST_UPDATE_ROLE),
                    require_owner_or_role,
                )))
                .delete(posts::delete_post.layer(middleware::from_fn_with_state(
                    state.ownership_guard(DELETE_ROLE),
                    require_owner_or_role,
                ))),
        )
        .route_layer(middleware::from_fn_with_state(state.clone(), posts::load_post))
        .route_layer(middleware::from_fn_with_state(auth_state.clone(), require_bearer));

    let create_post_routes = Router::new()
        .route("/posts", post(posts::create_post))
        .route_layer(middleware::from_fn_with_state(auth_state, require_bearer));

    let v1_routes = Router::new()
        .merge(ops_routes)
        .merge(public_routes)
        .merge(user_routes)
        .merge(post_routes)
        .merge(create_post_routes)
        .method_not_allowed_fallback(method_not_allowed);

    Router::new()
        .nest("/v1", v1_routes)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn(security_headers_middleware))
        .with_state(state)
}

/// Bound every request by `timeout`; an elapsed deadline renders as a JSON 503.
pub fn with_request_timeout(router: Router, timeout: Duration) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(HandleErrorLayer::new(handle_middleware_error))
            .timeout(timeout),
    )
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}
