use std::sync::Arc;

use axum::{
    extract::State,
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use profilehub_auth::{JwtValidator, ensure_active};
use profilehub_infra::Store;

use crate::app::errors::ApiError;
use crate::context::CurrentUser;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
    pub store: Store,
}

/// Resolve the bearer token to an active user and attach it as [`CurrentUser`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(req.headers())?;

    let claims = state.jwt.validate(token, Utc::now()).map_err(|e| {
        debug!(error = %e, "rejected bearer token");
        ApiError::invalid_credentials()
    })?;

    let user = state
        .store
        .users
        .get(claims.sub)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let current = CurrentUser(user);
    ensure_active(&current.principal())?;

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

    let header = header.to_str().map_err(|_| ApiError::invalid_credentials())?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or_else(ApiError::invalid_credentials)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(ApiError::invalid_credentials());
    }

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderValue, header::AUTHORIZATION};

    fn headers(value: &'static str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_static(value));
        h
    }

    #[test]
    fn bearer_is_extracted() {
        assert_eq!(extract_bearer(&headers("Bearer abc.def")).unwrap(), "abc.def");
    }

    #[test]
    fn missing_or_malformed_header_is_unauthorized() {
        assert!(matches!(
            extract_bearer(&HeaderMap::new()),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(&headers("Basic Zm9vOmJhcg==")),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(matches!(
            extract_bearer(&headers("Bearer   ")),
            Err(ApiError::Unauthorized(_))
        ));
    }
}
