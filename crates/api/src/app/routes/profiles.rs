use std::sync::Arc;

use axum::{Extension, Router, routing::{get, post}};

use profilehub_core::UserId;
use profilehub_profiles::{ProfileCreate, ProfileUpdate};

use crate::app::dto::{Message, ProfilePublic};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path};
use crate::app::services::AppServices;
use crate::context::CurrentUser;

/// Profiles are addressed by their owner's user id.
pub fn router() -> Router {
    Router::new()
        .route("/profiles/", post(create_profile))
        .route(
            "/profiles/:user_id",
            get(read_profile).patch(update_profile).delete(delete_profile),
        )
}

pub async fn read_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(user_id): Path<UserId>,
) -> Result<Json<ProfilePublic>, ApiError> {
    Ok(Json(services.get_profile(user_id).await?))
}

pub async fn create_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ProfileCreate>,
) -> Result<Json<ProfilePublic>, ApiError> {
    Ok(Json(services.create_profile(&current, body).await?))
}

pub async fn update_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<UserId>,
    Json(body): Json<ProfileUpdate>,
) -> Result<Json<ProfilePublic>, ApiError> {
    Ok(Json(services.update_profile(&current, user_id, body).await?))
}

pub async fn delete_profile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Message>, ApiError> {
    services.delete_profile(&current, user_id).await?;
    Ok(Json(Message::new("Profile deleted successfully")))
}
