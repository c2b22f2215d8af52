//! Book (catalogue entry) model and related types.
//!
//! A book carries exactly one type-specific payload field: `pages` for printed
//! books, `file_format` for ebooks and `duration` (minutes) for audiobooks.
//! [`validate`] checks that the payload matches the declared type and
//! [`normalize`] clears whatever the type does not own.

use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Decode, Encode, FromRow, Postgres};
use utoipa::{IntoParams, ToSchema};
use validator::{Validate, ValidationError, ValidationErrors};

/// Maximum length of an ebook file format tag
pub const FILE_FORMAT_MAX_LEN: usize = 10;

/// Default and maximum page sizes for listings
pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// Book type slug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookType {
    Printed,
    Ebook,
    Audiobook,
}

impl BookType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookType::Printed => "printed",
            BookType::Ebook => "ebook",
            BookType::Audiobook => "audiobook",
        }
    }
}

impl std::fmt::Display for BookType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for BookType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "printed" => Ok(BookType::Printed),
            "ebook" => Ok(BookType::Ebook),
            "audiobook" => Ok(BookType::Audiobook),
            _ => Err(format!("Invalid book type: {}", s)),
        }
    }
}

// SQLx conversion for BookType (stored as text)
impl sqlx::Type<Postgres> for BookType {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<Postgres>>::compatible(ty)
    }
}

impl<'r> Decode<'r, Postgres> for BookType {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s: String = Decode::<Postgres>::decode(value)?;
        s.parse().map_err(|e: String| e.into())
    }
}

impl Encode<'_, Postgres> for BookType {
    fn encode_by_ref(&self, buf: &mut sqlx::postgres::PgArgumentBuffer) -> sqlx::encode::IsNull {
        <&str as Encode<Postgres>>::encode(self.as_str(), buf)
    }
}

/// The type-dependent part of a book
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TypePayload {
    pub pages: Option<i32>,
    pub file_format: Option<String>,
    pub duration: Option<i32>,
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

fn check_payload(
    book_type: Option<&str>,
    payload: &TypePayload,
    errors: &mut ValidationErrors,
) -> Option<BookType> {
    let book_type = match book_type.map(str::parse::<BookType>) {
        Some(Ok(book_type)) => book_type,
        _ => {
            errors.add("book_type", field_error("invalid_book_type", "invalid book_type"));
            return None;
        }
    };

    match book_type {
        BookType::Printed => match payload.pages {
            None => errors.add(
                "pages",
                field_error("required", "Pages is required for printed books."),
            ),
            Some(pages) if pages <= 0 => errors.add(
                "pages",
                field_error("positive", "Pages must be a positive integer."),
            ),
            Some(_) => {}
        },
        BookType::Ebook => match payload.file_format.as_deref().map(str::trim) {
            None | Some("") => errors.add(
                "file_format",
                field_error("required", "File format is required for ebooks."),
            ),
            Some(format) if format.chars().count() > FILE_FORMAT_MAX_LEN => errors.add(
                "file_format",
                field_error("length", "File format must be at most 10 characters."),
            ),
            Some(_) => {}
        },
        BookType::Audiobook => match payload.duration {
            None => errors.add(
                "duration",
                field_error("required", "Duration is required for audiobooks."),
            ),
            Some(duration) if duration <= 0 => errors.add(
                "duration",
                field_error("positive", "Duration must be a positive integer."),
            ),
            Some(_) => {}
        },
    }

    Some(book_type)
}

/// Check that `payload` is a valid shape for `book_type`.
///
/// A missing or unknown type is reported on the `book_type` field.
pub fn validate(book_type: Option<&str>, payload: &TypePayload) -> Result<BookType, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    match check_payload(book_type, payload, &mut errors) {
        Some(book_type) if errors.is_empty() => Ok(book_type),
        _ => Err(errors),
    }
}

/// Keep only the payload field owned by `book_type`.
pub fn normalize(book_type: BookType, payload: TypePayload) -> TypePayload {
    match book_type {
        BookType::Printed => TypePayload {
            pages: payload.pages,
            ..TypePayload::default()
        },
        BookType::Ebook => TypePayload {
            file_format: payload.file_format.map(|f| f.trim().to_string()),
            ..TypePayload::default()
        },
        BookType::Audiobook => TypePayload {
            duration: payload.duration,
            ..TypePayload::default()
        },
    }
}

/// Full book model (DB + API)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDate,
    pub available: bool,
    /// Id of the user currently holding the book
    pub borrowed_by: Option<i32>,
    pub book_type: BookType,
    pub pages: Option<i32>,
    pub file_format: Option<String>,
    /// Audiobook length in minutes
    pub duration: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Book {
    pub fn payload(&self) -> TypePayload {
        TypePayload {
            pages: self.pages,
            file_format: self.file_format.clone(),
            duration: self.duration,
        }
    }

    pub fn can_be_borrowed(&self) -> bool {
        self.available
    }

    /// Only the current borrower may hand a book back.
    pub fn can_be_returned_by(&self, user_id: i32) -> bool {
        !self.available && self.borrowed_by == Some(user_id)
    }

    /// `available` is false exactly when a borrower is recorded.
    pub fn is_consistent(&self) -> bool {
        self.available == self.borrowed_by.is_none()
    }

    pub fn lend_to(&mut self, user_id: i32) {
        self.available = false;
        self.borrowed_by = Some(user_id);
        self.updated_at = Utc::now();
    }

    pub fn give_back(&mut self) {
        self.available = true;
        self.borrowed_by = None;
        self.updated_at = Utc::now();
    }
}

/// Validated and normalized catalogue fields, ready to persist
#[derive(Debug, Clone, PartialEq)]
pub struct BookFields {
    pub title: String,
    pub author: String,
    pub isbn: String,
    pub published_date: NaiveDate,
    pub book_type: BookType,
    pub payload: TypePayload,
}

/// Create or full-update request
///
/// Every field is optional at the serde level so a missing one is reported
/// per field alongside the other validation errors.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct BookInput {
    #[validate(length(min = 1, max = 255, message = "Title must be between 1 and 255 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 255, message = "Author must be between 1 and 255 characters"))]
    pub author: Option<String>,
    #[validate(length(min = 1, max = 13, message = "ISBN must be between 1 and 13 characters"))]
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    /// One of `printed`, `ebook`, `audiobook`
    pub book_type: Option<String>,
    pub pages: Option<i32>,
    pub file_format: Option<String>,
    pub duration: Option<i32>,
}

fn required<T>(value: Option<T>, field: &'static str, errors: &mut ValidationErrors) -> Option<T> {
    if value.is_none() {
        errors.add(field, field_error("required", "This field is required."));
    }
    value
}

impl BookInput {
    pub fn payload(&self) -> TypePayload {
        TypePayload {
            pages: self.pages,
            file_format: self.file_format.clone(),
            duration: self.duration,
        }
    }

    /// Run field and type checks together, then normalize the payload.
    pub fn into_fields(self) -> Result<BookFields, ValidationErrors> {
        let mut errors = match Validate::validate(&self) {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        let payload = self.payload();
        let book_type = check_payload(self.book_type.as_deref(), &payload, &mut errors);

        let title = required(self.title, "title", &mut errors);
        let author = required(self.author, "author", &mut errors);
        let isbn = required(self.isbn, "isbn", &mut errors);
        let published_date = required(self.published_date, "published_date", &mut errors);

        match (title, author, isbn, published_date, book_type) {
            (Some(title), Some(author), Some(isbn), Some(published_date), Some(book_type))
                if errors.is_empty() =>
            {
                Ok(BookFields {
                    title,
                    author,
                    isbn,
                    published_date,
                    book_type,
                    payload: normalize(book_type, payload),
                })
            }
            _ => Err(errors),
        }
    }
}

/// Partial update request
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub isbn: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub book_type: Option<String>,
    pub pages: Option<i32>,
    pub file_format: Option<String>,
    pub duration: Option<i32>,
}

impl BookPatch {
    /// Overlay the supplied fields on the stored book
    pub fn merge_onto(self, book: &Book) -> BookInput {
        BookInput {
            title: Some(self.title.unwrap_or_else(|| book.title.clone())),
            author: Some(self.author.unwrap_or_else(|| book.author.clone())),
            isbn: Some(self.isbn.unwrap_or_else(|| book.isbn.clone())),
            published_date: Some(self.published_date.unwrap_or(book.published_date)),
            book_type: Some(self.book_type.unwrap_or_else(|| book.book_type.to_string())),
            pages: self.pages.or(book.pages),
            file_format: self.file_format.or_else(|| book.file_format.clone()),
            duration: self.duration.or(book.duration),
        }
    }
}

/// Book listing query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BookQuery {
    /// Case-insensitive match on title or author
    pub search: Option<String>,
    /// Only books borrowed by the caller
    pub mine: Option<bool>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

impl BookQuery {
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Rows to skip; saturates instead of overflowing on absurd page numbers
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.per_page())
    }

    pub fn per_page(&self) -> i64 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }
}

/// Store-level filter built from a [`BookQuery`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub search: Option<String>,
    pub borrowed_by: Option<i32>,
    pub limit: i64,
    pub offset: i64,
}

impl BookFilter {
    pub fn matches(&self, book: &Book) -> bool {
        if let Some(user_id) = self.borrowed_by {
            if book.borrowed_by != Some(user_id) {
                return false;
            }
        }
        match self.search.as_deref() {
            Some(term) => {
                let term = term.to_lowercase();
                book.title.to_lowercase().contains(&term) || book.author.to_lowercase().contains(&term)
            }
            None => true,
        }
    }
}
