//! API handlers and router for the library REST endpoints

pub mod auth;
pub mod books;
pub mod health;
pub mod logging;
pub mod openapi;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
    middleware,
    routing::{get, post},
    Router,
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::Actor, AppState};

/// Parse `Authorization: Bearer <token>` the same way for every caller
pub(crate) fn bearer_auth(headers: &HeaderMap) -> Option<Authorization<Bearer>> {
    headers.typed_get::<Authorization<Bearer>>()
}

/// Extractor for the authenticated actor behind a bearer token
pub struct AuthenticatedUser(pub Actor);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Authorization(bearer) = bearer_auth(&parts.headers)
            .ok_or_else(|| AppError::Authentication("Missing or invalid authorization header".to_string()))?;

        let actor = state.services.auth.current_user(bearer.token())?;

        Ok(AuthenticatedUser(actor))
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let books = Router::new()
        .route("/books", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id",
            get(books::get_book)
                .put(books::update_book)
                .patch(books::patch_book)
                .delete(books::delete_book),
        )
        .route("/books/:id/borrow", post(books::borrow_book))
        .route("/books/:id/return_book", post(books::return_book))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            logging::log_book_operation,
        ));

    let api_v1 = Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .merge(books)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
