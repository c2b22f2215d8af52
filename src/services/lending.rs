//! Lending engine: borrow and return transitions on a single book.
//!
//! Each transition is one conditional write in the store, so two concurrent
//! borrows of the same book cannot both succeed. A failed precondition is a
//! normal [`LendingOutcome`] with `success == false`; only a missing book or
//! a store failure is an error.

use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::{Actor, Book},
    repository::Repository,
};

pub const BORROWED: &str = "Book borrowed successfully.";
pub const RETURNED: &str = "Book returned successfully.";
pub const NOT_AVAILABLE: &str = "Book is not available for borrowing.";
pub const CANNOT_BE_RETURNED: &str = "Book cannot be returned.";

/// Result of a borrow or return request
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LendingOutcome {
    pub success: bool,
    /// Human-readable reason
    pub detail: String,
    /// State of the book after the request
    pub book: Book,
}

impl LendingOutcome {
    fn accepted(detail: &str, book: Book) -> Self {
        Self {
            success: true,
            detail: detail.to_string(),
            book,
        }
    }

    fn rejected(detail: &str, book: Book) -> Self {
        Self {
            success: false,
            detail: detail.to_string(),
            book,
        }
    }
}

#[derive(Clone)]
pub struct LendingService {
    repository: Repository,
}

impl LendingService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lend an available book to `actor`.
    pub async fn borrow(&self, book_id: i32, actor: &Actor) -> AppResult<LendingOutcome> {
        if let Some(book) = self.repository.books.try_borrow(book_id, actor.id).await? {
            tracing::info!(book_id, user_id = actor.id, "book borrowed");
            return Ok(LendingOutcome::accepted(BORROWED, book));
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        tracing::debug!(book_id, user_id = actor.id, "borrow rejected: book not available");
        Ok(LendingOutcome::rejected(NOT_AVAILABLE, book))
    }

    /// Take a book back from its current borrower.
    ///
    /// A book that was never lent and a book held by someone else are
    /// rejected with the same reason.
    pub async fn return_book(&self, book_id: i32, actor: &Actor) -> AppResult<LendingOutcome> {
        if let Some(book) = self.repository.books.try_return(book_id, actor.id).await? {
            tracing::info!(book_id, user_id = actor.id, "book returned");
            return Ok(LendingOutcome::accepted(RETURNED, book));
        }

        let book = self.repository.books.get_by_id(book_id).await?;
        tracing::debug!(book_id, user_id = actor.id, "return rejected: not held by caller");
        Ok(LendingOutcome::rejected(CANNOT_BE_RETURNED, book))
    }
}
