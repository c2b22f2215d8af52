//! Catalog management service

use crate::{
    error::{AppError, AppResult},
    models::{Actor, Book, BookFilter, BookInput, BookPatch, BookQuery},
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Search books with filters and pagination
    pub async fn search_books(&self, query: &BookQuery, actor: &Actor) -> AppResult<(Vec<Book>, i64)> {
        let filter = BookFilter {
            search: query
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
            borrowed_by: query.mine.unwrap_or(false).then_some(actor.id),
            limit: query.per_page(),
            offset: query.offset(),
        };

        self.repository.books.search(&filter).await
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await
    }

    /// Validate, normalize and insert a new book
    pub async fn create_book(&self, input: BookInput) -> AppResult<Book> {
        let fields = input.into_fields()?;

        if self.repository.books.isbn_exists(&fields.isbn, None).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                fields.isbn
            )));
        }

        let book = self.repository.books.create(&fields).await?;
        tracing::info!(book_id = book.id, book_type = %book.book_type, "book created");
        Ok(book)
    }

    /// Replace all catalogue fields of a book
    pub async fn update_book(&self, id: i32, input: BookInput) -> AppResult<Book> {
        self.repository.books.get_by_id(id).await?;
        self.save(id, input).await
    }

    /// Apply the supplied fields on top of the stored book, then validate the result
    pub async fn patch_book(&self, id: i32, patch: BookPatch) -> AppResult<Book> {
        let book = self.repository.books.get_by_id(id).await?;
        self.save(id, patch.merge_onto(&book)).await
    }

    async fn save(&self, id: i32, input: BookInput) -> AppResult<Book> {
        let fields = input.into_fields()?;

        if self.repository.books.isbn_exists(&fields.isbn, Some(id)).await? {
            return Err(AppError::Conflict(format!(
                "A book with ISBN {} already exists",
                fields.isbn
            )));
        }

        let book = self.repository.books.update(id, &fields).await?;
        tracing::info!(book_id = id, book_type = %book.book_type, "book updated");
        Ok(book)
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.repository.books.delete(id).await?;
        tracing::info!(book_id = id, "book deleted");
        Ok(())
    }
}
