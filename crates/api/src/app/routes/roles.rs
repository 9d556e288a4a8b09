use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use profilehub_core::{Page, RoleId};
use profilehub_profiles::{RoleCreate, RoleUpdate};

use crate::app::dto::{Listing, Message, RolePublic};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path, Query};
use crate::app::services::AppServices;
use crate::authz::require_superuser;
use crate::context::CurrentUser;

/// Reads are open to any authenticated user; writes need a superuser.
pub fn router() -> Router {
    Router::new()
        .route("/roles/", get(list_roles).post(create_role))
        .route("/roles/:id", get(read_role).patch(rename_role).delete(delete_role))
}

pub async fn list_roles(
    Extension(services): Extension<Arc<AppServices>>,
    Query(page): Query<Page>,
) -> Result<Json<Listing<RolePublic>>, ApiError> {
    let (roles, count) = services.list_roles(page).await?;
    Ok(Json(Listing::new(
        roles.into_iter().map(RolePublic::from).collect(),
        count,
    )))
}

pub async fn create_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<RoleCreate>,
) -> Result<Json<RolePublic>, ApiError> {
    require_superuser(&current)?;
    Ok(Json(services.create_role(body).await?.into()))
}

pub async fn read_role(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<RoleId>,
) -> Result<Json<RolePublic>, ApiError> {
    Ok(Json(services.get_role(id).await?.into()))
}

pub async fn rename_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<RoleId>,
    Json(body): Json<RoleUpdate>,
) -> Result<Json<RolePublic>, ApiError> {
    require_superuser(&current)?;
    Ok(Json(services.rename_role(id, body).await?.into()))
}

pub async fn delete_role(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<RoleId>,
) -> Result<Json<Message>, ApiError> {
    require_superuser(&current)?;
    services.delete_role(id).await?;
    Ok(Json(Message::new("Role deleted successfully")))
}
