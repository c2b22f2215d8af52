//! In-process test harness: the full router over the in-memory store.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_server::{
    api,
    config::{AppConfig, StorageBackend},
    repository::Repository,
    services::Services,
    AppState,
};

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "admin-password";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let mut config = AppConfig::default();
        config.database.backend = StorageBackend::Memory;
        config.auth.jwt_secret = "integration-test-secret".to_string();
        config.auth.admin_username = Some(ADMIN_USERNAME.to_string());
        config.auth.admin_password = Some(ADMIN_PASSWORD.to_string());

        let services = Services::new(Repository::in_memory(), config.auth.clone());
        services.auth.ensure_admin().await.expect("seed admin");

        let state = AppState::new(config, services);
        let router = api::create_router(state.clone());
        Self { router, state }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("router is infallible");

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("read body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, value)
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().expect("access_token").to_string()
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_USERNAME, ADMIN_PASSWORD).await
    }

    /// Register a regular user and return `(id, token)`
    pub async fn user(&self, username: &str) -> (i64, String) {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/v1/auth/register",
                None,
                Some(json!({ "username": username, "password": "secret-pass" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["id"].as_i64().expect("id");
        (id, self.login(username, "secret-pass").await)
    }

    /// Create a book as admin and return its id
    pub async fn create_book(&self, admin: &str, book: Value) -> i64 {
        let (status, body) = self
            .request(Method::POST, "/api/v1/books", Some(admin), Some(book))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {body}");
        body["id"].as_i64().expect("id")
    }
}

pub fn printed(isbn: &str) -> Value {
    json!({
        "title": "Dune",
        "author": "Frank Herbert",
        "isbn": isbn,
        "published_date": "1965-08-01",
        "book_type": "printed",
        "pages": 412
    })
}

pub fn ebook(isbn: &str) -> Value {
    json!({
        "title": "Neuromancer",
        "author": "William Gibson",
        "isbn": isbn,
        "published_date": "1984-07-01",
        "book_type": "ebook",
        "file_format": "epub"
    })
}

pub fn audiobook(isbn: &str) -> Value {
    json!({
        "title": "The Hobbit",
        "author": "J. R. R. Tolkien",
        "isbn": isbn,
        "published_date": "1937-09-21",
        "book_type": "audiobook",
        "duration": 660
    })
}
