use std::sync::Arc;

use axum::{Extension, Router, routing::post};

use crate::app::dto::{PrivateUserCreate, UserPublic};
use crate::app::errors::ApiError;
use crate::app::extract::Json;
use crate::app::services::AppServices;

/// Local-environment helpers. Not authenticated.
pub fn router() -> Router {
    Router::new().route("/private/users/", post(create_user))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<PrivateUserCreate>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services.create_user(body.into()).await?;
    Ok(Json(user.into()))
}
