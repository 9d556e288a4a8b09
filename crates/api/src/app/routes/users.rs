use std::sync::Arc;

use axum::{
    Extension, Router,
    routing::{get, patch},
};

use profilehub_core::{Page, UserId};
use profilehub_users::{UpdatePassword, UserCreate, UserRegister, UserUpdate, UserUpdateMe};

use crate::app::dto::{Listing, Message, UserPublic};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path, Query};
use crate::app::services::AppServices;
use crate::authz::require_superuser;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/users/", get(list_users).post(create_user))
        .route("/users/me", get(read_me).patch(update_me).delete(delete_me))
        .route("/users/me/password", patch(update_password))
        .route("/users/:id", get(read_user).patch(update_user).delete(delete_user))
}

pub async fn list_users(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(page): Query<Page>,
) -> Result<Json<Listing<UserPublic>>, ApiError> {
    require_superuser(&current)?;
    let (users, count) = services.list_users(page).await?;
    Ok(Json(Listing::new(
        users.into_iter().map(UserPublic::from).collect(),
        count,
    )))
}

pub async fn create_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<UserCreate>,
) -> Result<Json<UserPublic>, ApiError> {
    require_superuser(&current)?;
    let user = services.create_user(body).await?;
    Ok(Json(user.into()))
}

/// Self-registration; never grants superuser.
pub async fn signup(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<UserRegister>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services.create_user(body.into()).await?;
    Ok(Json(user.into()))
}

pub async fn read_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<UserPublic>, ApiError> {
    Ok(Json(services.user_with_relations(current.0).await?))
}

pub async fn update_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<UserUpdateMe>,
) -> Result<Json<UserPublic>, ApiError> {
    let user = services.update_me(&current, body.into()).await?;
    Ok(Json(user.into()))
}

pub async fn update_password(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<UpdatePassword>,
) -> Result<Json<Message>, ApiError> {
    services.change_password(&current, body).await?;
    Ok(Json(Message::new("Password updated successfully")))
}

pub async fn delete_me(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Message>, ApiError> {
    let id = current.user().id;
    services.delete_user(&current, id).await?;
    Ok(Json(Message::new("User deleted successfully")))
}

pub async fn read_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<UserId>,
) -> Result<Json<UserPublic>, ApiError> {
    Ok(Json(services.get_user(&current, id).await?))
}

pub async fn update_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<UserId>,
    Json(body): Json<UserUpdate>,
) -> Result<Json<UserPublic>, ApiError> {
    require_superuser(&current)?;
    let user = services.update_user(id, body).await?;
    Ok(Json(user.into()))
}

pub async fn delete_user(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<UserId>,
) -> Result<Json<Message>, ApiError> {
    require_superuser(&current)?;
    services.delete_user(&current, id).await?;
    Ok(Json(Message::new("User deleted successfully")))
}
