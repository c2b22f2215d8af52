//! Books repository for PostgreSQL

use async_trait::async_trait;
use sqlx::{Pool, Postgres, QueryBuilder, Row};

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookFields, BookFilter},
};

use super::BooksStore;

const BOOK_COLUMNS: &str = "id, title, author, isbn, published_date, available, borrowed_by, \
     book_type, pages, file_format, duration, created_at, updated_at";

/// Escape LIKE wildcards so the search term matches literally
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &BookFilter) {
    builder.push(" WHERE TRUE");

    if let Some(user_id) = filter.borrowed_by {
        builder.push(" AND borrowed_by = ").push_bind(user_id);
    }

    if let Some(ref term) = filter.search {
        let pattern = like_pattern(term);
        builder
            .push(" AND (title ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR author ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

fn map_unique_violation(e: sqlx::Error, isbn: &str) -> AppError {
    match e {
        sqlx::Error::Database(ref db) if db.is_unique_violation() => {
            AppError::Conflict(format!("A book with ISBN {} already exists", isbn))
        }
        other => AppError::Database(other),
    }
}

#[derive(Clone)]
pub struct BooksRepository {
    pool: Pool<Postgres>,
}

impl BooksRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BooksStore for BooksRepository {
    async fn search(&self, filter: &BookFilter) -> AppResult<(Vec<Book>, i64)> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM books");
        push_filters(&mut count, filter);
        let total: i64 = count.build().fetch_one(&self.pool).await?.get(0);

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM books", BOOK_COLUMNS));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY id LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let books = select.build_query_as::<Book>().fetch_all(&self.pool).await?;

        Ok((books, total))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!("SELECT {} FROM books WHERE id = $1", BOOK_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE isbn = $1 AND ($2::INTEGER IS NULL OR id <> $2))",
        )
        .bind(isbn)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn create(&self, fields: &BookFields) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            INSERT INTO books (title, author, isbn, published_date, available, borrowed_by,
                               book_type, pages, file_format, duration)
            VALUES ($1, $2, $3, $4, TRUE, NULL, $5, $6, $7, $8)
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.published_date)
        .bind(fields.book_type)
        .bind(fields.payload.pages)
        .bind(&fields.payload.file_format)
        .bind(fields.payload.duration)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &fields.isbn))
    }

    async fn update(&self, id: i32, fields: &BookFields) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET title = $2, author = $3, isbn = $4, published_date = $5,
                book_type = $6, pages = $7, file_format = $8, duration = $9,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(&fields.title)
        .bind(&fields.author)
        .bind(&fields.isbn)
        .bind(fields.published_date)
        .bind(fields.book_type)
        .bind(fields.payload.pages)
        .bind(&fields.payload.file_format)
        .bind(fields.payload.duration)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_unique_violation(e, &fields.isbn))?
        .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }

        Ok(())
    }

    async fn try_borrow(&self, id: i32, user_id: i32) -> AppResult<Option<Book>> {
        // Check and write in one statement so concurrent borrows serialize on the row
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET available = FALSE, borrowed_by = $2, updated_at = NOW()
            WHERE id = $1 AND available = TRUE
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }

    async fn try_return(&self, id: i32, user_id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(&format!(
            r#"
            UPDATE books
            SET available = TRUE, borrowed_by = NULL, updated_at = NOW()
            WHERE id = $1 AND available = FALSE AND borrowed_by = $2
            RETURNING {}
            "#,
            BOOK_COLUMNS
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(book)
    }
}
