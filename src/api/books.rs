//! Book catalogue and lending endpoints.
//!
//! Every handler asks the policy first and only then touches the store, so a
//! denied caller never learns whether a book exists.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use validator::{ValidationError, ValidationErrors};

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookInput, BookPatch, BookQuery},
    services::{
        lending::LendingOutcome,
        policy::{self, Action},
    },
    AppState,
};

use super::AuthenticatedUser;

/// Paginated book listing
#[derive(Serialize, ToSchema)]
pub struct BookPage {
    pub items: Vec<Book>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Well-formed JSON of the wrong shape is reported in the field list;
/// anything unparseable stays a plain bad request.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(JsonRejection::JsonDataError(rejection)) => {
            let mut error = ValidationError::new("invalid");
            error.message = Some(rejection.body_text().into());
            let mut errors = ValidationErrors::new();
            errors.add("non_field_errors", error);
            Err(AppError::Validation(errors))
        }
        Err(rejection) => Err(AppError::BadRequest(rejection.body_text())),
    }
}

fn book_id(id: Result<Path<i32>, PathRejection>) -> AppResult<i32> {
    id.map(|Path(id)| id)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

fn lending_response(outcome: LendingOutcome) -> (StatusCode, Json<LendingOutcome>) {
    let status = if outcome.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(outcome))
}

/// List books, optionally filtered by title/author
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books", body = BookPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    query: Result<Query<BookQuery>, QueryRejection>,
) -> AppResult<Json<BookPage>> {
    let action = match &query {
        Ok(Query(query)) if query.search.is_some() => Action::Search,
        _ => Action::List,
    };
    policy::require(&actor, action)?;
    let Query(query) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let (items, total) = state.services.catalog.search_books(&query, &actor).await?;

    Ok(Json(BookPage {
        items,
        total,
        page: query.page(),
        per_page: query.per_page(),
    }))
}

/// Get a book by ID
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<Json<Book>> {
    policy::require(&actor, Action::Retrieve)?;
    let id = book_id(id)?;

    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Create a book (admin only)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not an admin"),
        (status = 409, description = "ISBN already used")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Book>)> {
    policy::require(&actor, Action::Create)?;

    let book = state.services.catalog.create_book(body(payload)?).await?;
    Ok((StatusCode::CREATED, Json(book)))
}

/// Replace a book's catalogue fields (admin only)
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<BookInput>, JsonRejection>,
) -> AppResult<Json<Book>> {
    policy::require(&actor, Action::Update)?;
    let id = book_id(id)?;

    let book = state.services.catalog.update_book(id, body(payload)?).await?;
    Ok(Json(book))
}

/// Update some of a book's fields (admin only)
#[utoipa::path(
    patch,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = BookPatch,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid input", body = crate::error::ErrorResponse),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn patch_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    id: Result<Path<i32>, PathRejection>,
    payload: Result<Json<BookPatch>, JsonRejection>,
) -> AppResult<Json<Book>> {
    policy::require(&actor, Action::Update)?;
    let id = book_id(id)?;

    let book = state.services.catalog.patch_book(id, body(payload)?).await?;
    Ok(Json(book))
}

/// Delete a book (admin only)
#[utoipa::path(
    delete,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<StatusCode> {
    policy::require(&actor, Action::Delete)?;
    let id = book_id(id)?;

    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/books/{id}/borrow",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book borrowed", body = LendingOutcome),
        (status = 400, description = "Book is not available", body = LendingOutcome),
        (status = 404, description = "Book not found")
    )
)]
pub async fn borrow_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<(StatusCode, Json<LendingOutcome>)> {
    policy::require(&actor, Action::Borrow)?;
    let id = book_id(id)?;

    let outcome = state.services.lending.borrow(id, &actor).await?;
    Ok(lending_response(outcome))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/books/{id}/return_book",
    tag = "lending",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book returned", body = LendingOutcome),
        (status = 400, description = "Book cannot be returned by the caller", body = LendingOutcome),
        (status = 404, description = "Book not found")
    )
)]
pub async fn return_book(
    State(state): State<AppState>,
    AuthenticatedUser(actor): AuthenticatedUser,
    id: Result<Path<i32>, PathRejection>,
) -> AppResult<(StatusCode, Json<LendingOutcome>)> {
    policy::require(&actor, Action::Return)?;
    let id = book_id(id)?;

    let outcome = state.services.lending.return_book(id, &actor).await?;
    Ok(lending_response(outcome))
}
