use axum::http::StatusCode;

/// Liveness probe, mounted outside the API prefix.
pub async fn health() -> StatusCode {
    StatusCode::OK
}
