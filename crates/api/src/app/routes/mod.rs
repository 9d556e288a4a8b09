use axum::{
    Router,
    routing::{get, post},
};

pub mod items;
pub mod login;
pub mod private;
pub mod profiles;
pub mod roles;
pub mod system;
pub mod users;
pub mod utils;

/// Endpoints reachable without a bearer token.
pub fn public(mount_private: bool) -> Router {
    let router = Router::new()
        .route("/login/access-token", post(login::access_token))
        .route("/users/signup", post(users::signup))
        .route("/utils/health-check/", get(utils::health_check));

    if mount_private {
        router.merge(private::router())
    } else {
        router
    }
}

/// Endpoints behind the auth middleware.
pub fn protected() -> Router {
    Router::new()
        .route("/login/test-token", post(login::test_token))
        .merge(users::router())
        .merge(items::router())
        .merge(profiles::router())
        .merge(roles::router())
}
