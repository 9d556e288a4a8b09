use std::sync::Arc;

use axum::Extension;

use crate::app::dto::{LoginForm, Token, UserPublic};
use crate::app::errors::ApiError;
use crate::app::extract::{Form, Json};
use crate::app::services::AppServices;
use crate::context::CurrentUser;

/// OAuth2-compatible token login.
pub async fn access_token(
    Extension(services): Extension<Arc<AppServices>>,
    Form(form): Form<LoginForm>,
) -> Result<Json<Token>, ApiError> {
    let user = services.authenticate(&form.username, &form.password).await?;
    Ok(Json(services.issue_token(&user)?))
}

pub async fn test_token(Extension(current): Extension<CurrentUser>) -> Json<UserPublic> {
    Json(UserPublic::from(current.0))
}
