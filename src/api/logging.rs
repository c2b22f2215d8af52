//! Book operation log: one structured event per `/books` request

use axum::{
    extract::{OriginalUri, Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

use crate::AppState;

use super::bearer_auth;

/// Coarse result class of a request, as reported in the operation log
pub fn outcome(status: StatusCode) -> &'static str {
    match status {
        s if s.is_success() => "ok",
        StatusCode::UNAUTHORIZED => "unauthorized",
        StatusCode::FORBIDDEN => "forbidden",
        StatusCode::NOT_FOUND => "not_found",
        s if s.is_client_error() => "rejected",
        _ => "error",
    }
}

pub async fn log_book_operation(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let actor = bearer_auth(request.headers())
        .and_then(|auth| state.services.auth.current_user(auth.token()).ok())
        .map(|actor| actor.id.to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    let response = next.run(request).await;
    let status = response.status();

    tracing::info!(
        method = %method,
        path = %path,
        actor = %actor,
        status = status.as_u16(),
        outcome = outcome(status),
        "book operation"
    );

    response
}
