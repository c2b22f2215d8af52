//! Data models for the library server

pub mod book;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookFields, BookFilter, BookInput, BookPatch, BookQuery, BookType, TypePayload};
pub use user::{Actor, RegisterUser, User, UserClaims};
