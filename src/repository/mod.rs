//! Repository layer for book and user persistence

pub mod books;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{Book, BookFields, BookFilter, User},
};

/// Book persistence
#[async_trait]
pub trait BooksStore: Send + Sync {
    /// Matching books ordered by id, plus the total match count
    async fn search(&self, filter: &BookFilter) -> AppResult<(Vec<Book>, i64)>;

    async fn get_by_id(&self, id: i32) -> AppResult<Book>;

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool>;

    async fn create(&self, fields: &BookFields) -> AppResult<Book>;

    /// Replace the catalogue fields; availability is left untouched
    async fn update(&self, id: i32, fields: &BookFields) -> AppResult<Book>;

    async fn delete(&self, id: i32) -> AppResult<()>;

    /// Atomically lend an available book. `None` when the book is missing or
    /// already lent.
    async fn try_borrow(&self, id: i32, user_id: i32) -> AppResult<Option<Book>>;

    /// Atomically take a book back from `user_id`. `None` when the book is
    /// missing or not held by that user.
    async fn try_return(&self, id: i32, user_id: i32) -> AppResult<Option<Book>>;
}

/// User persistence
#[async_trait]
pub trait UsersStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<User>;

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Insert a user; a taken username is a conflict
    async fn create(&self, username: &str, password_hash: &str, is_admin: bool) -> AppResult<User>;
}

/// Main repository struct holding the stores
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BooksStore>,
    pub users: Arc<dyn UsersStore>,
}

impl Repository {
    /// Create a repository backed by the given database pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// Create a repository that keeps everything in process memory
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::new());
        Self {
            books: store.clone(),
            users: store,
        }
    }
}
