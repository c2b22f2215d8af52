//! In-process store used for local runs and the test suite.
//!
//! Every operation takes the single state lock once, so the check and the
//! write of a borrow or return can never interleave with another request.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookFields, BookFilter, User},
};

use super::{BooksStore, UsersStore};

#[derive(Default)]
struct State {
    books: BTreeMap<i32, Book>,
    users: BTreeMap<i32, User>,
    last_book_id: i32,
    last_user_id: i32,
}

impl State {
    fn isbn_taken(&self, isbn: &str, exclude_id: Option<i32>) -> bool {
        self.books
            .values()
            .any(|b| b.isbn == isbn && Some(b.id) != exclude_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| AppError::Internal("memory store lock poisoned".to_string()))
    }
}

fn not_found(id: i32) -> AppError {
    AppError::NotFound(format!("Book with id {} not found", id))
}

fn duplicate_isbn(isbn: &str) -> AppError {
    AppError::Conflict(format!("A book with ISBN {} already exists", isbn))
}

#[async_trait]
impl BooksStore for MemoryStore {
    async fn search(&self, filter: &BookFilter) -> AppResult<(Vec<Book>, i64)> {
        let state = self.lock()?;
        let matching: Vec<&Book> = state.books.values().filter(|b| filter.matches(b)).collect();
        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset.max(0) as usize)
            .take(filter.limit.max(0) as usize)
            .cloned()
            .collect();

        Ok((page, total))
    }

    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        self.lock()?.books.get(&id).cloned().ok_or_else(|| not_found(id))
    }

    async fn isbn_exists(&self, isbn: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        Ok(self.lock()?.isbn_taken(isbn, exclude_id))
    }

    async fn create(&self, fields: &BookFields) -> AppResult<Book> {
        let mut state = self.lock()?;
        if state.isbn_taken(&fields.isbn, None) {
            return Err(duplicate_isbn(&fields.isbn));
        }

        state.last_book_id += 1;
        let now = Utc::now();
        let book = Book {
            id: state.last_book_id,
            title: fields.title.clone(),
            author: fields.author.clone(),
            isbn: fields.isbn.clone(),
            published_date: fields.published_date,
            available: true,
            borrowed_by: None,
            book_type: fields.book_type,
            pages: fields.payload.pages,
            file_format: fields.payload.file_format.clone(),
            duration: fields.payload.duration,
            created_at: now,
            updated_at: now,
        };
        state.books.insert(book.id, book.clone());

        Ok(book)
    }

    async fn update(&self, id: i32, fields: &BookFields) -> AppResult<Book> {
        let mut state = self.lock()?;
        if !state.books.contains_key(&id) {
            return Err(not_found(id));
        }
        if state.isbn_taken(&fields.isbn, Some(id)) {
            return Err(duplicate_isbn(&fields.isbn));
        }

        let book = state.books.get_mut(&id).ok_or_else(|| not_found(id))?;
        book.title = fields.title.clone();
        book.author = fields.author.clone();
        book.isbn = fields.isbn.clone();
        book.published_date = fields.published_date;
        book.book_type = fields.book_type;
        book.pages = fields.payload.pages;
        book.file_format = fields.payload.file_format.clone();
        book.duration = fields.payload.duration;
        book.updated_at = Utc::now();

        Ok(book.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        self.lock()?
            .books
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found(id))
    }

    async fn try_borrow(&self, id: i32, user_id: i32) -> AppResult<Option<Book>> {
        let mut state = self.lock()?;
        match state.books.get_mut(&id) {
            Some(book) if book.can_be_borrowed() => {
                book.lend_to(user_id);
                Ok(Some(book.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn try_return(&self, id: i32, user_id: i32) -> AppResult<Option<Book>> {
        let mut state = self.lock()?;
        match state.books.get_mut(&id) {
            Some(book) if book.can_be_returned_by(user_id) => {
                book.give_back();
                Ok(Some(book.clone()))
            }
            _ => Ok(None),
        }
    }
}

#[async_trait]
impl UsersStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.lock()?
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn create(&self, username: &str, password_hash: &str, is_admin: bool) -> AppResult<User> {
        let mut state = self.lock()?;
        if state.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict("Username already exists".to_string()));
        }

        state.last_user_id += 1;
        let user = User {
            id: state.last_user_id,
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            is_admin,
            created_at: Utc::now(),
        };
        state.users.insert(user.id, user.clone());

        Ok(user)
    }
}
