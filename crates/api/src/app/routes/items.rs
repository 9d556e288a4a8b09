use std::sync::Arc;

use axum::{Extension, Router, routing::get};

use profilehub_core::{ItemId, Page};
use profilehub_items::{ItemCreate, ItemUpdate};

use crate::app::dto::{ItemPublic, Listing, Message};
use crate::app::errors::ApiError;
use crate::app::extract::{Json, Path, Query};
use crate::app::services::AppServices;
use crate::context::CurrentUser;

pub fn router() -> Router {
    Router::new()
        .route("/items/", get(list_items).post(create_item))
        .route("/items/:id", get(read_item).patch(update_item).delete(delete_item))
}

/// The caller's own items.
pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Query(page): Query<Page>,
) -> Result<Json<Listing<ItemPublic>>, ApiError> {
    let (items, count) = services.list_items(&current, page).await?;
    Ok(Json(Listing::new(
        items.into_iter().map(ItemPublic::from).collect(),
        count,
    )))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Json(body): Json<ItemCreate>,
) -> Result<Json<ItemPublic>, ApiError> {
    let item = services.create_item(&current, body).await?;
    Ok(Json(item.into()))
}

pub async fn read_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<ItemId>,
) -> Result<Json<ItemPublic>, ApiError> {
    let item = services.get_item(&current, id).await?;
    Ok(Json(item.into()))
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<ItemId>,
    Json(body): Json<ItemUpdate>,
) -> Result<Json<ItemPublic>, ApiError> {
    let item = services.update_item(&current, id, body).await?;
    Ok(Json(item.into()))
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<ItemId>,
) -> Result<Json<Message>, ApiError> {
    services.delete_item(&current, id).await?;
    Ok(Json(Message::new("Item deleted successfully")))
}
