//! API integration tests against the in-memory store

mod common;

use axum::http::{Method, StatusCode};
use serde_json::json;

use common::{audiobook, ebook, printed, TestApp};

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_login_and_me() {
    let app = TestApp::new().await;
    let token = app.admin_token().await;

    let (status, body) = app.request(Method::GET, "/api/v1/auth/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "admin");
    assert_eq!(body["is_admin"], true);
    assert!(body.get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_with_wrong_password() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "nope" })),
        )
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "NotAuthenticated");
}

#[tokio::test]
async fn test_register_rejects_duplicate_username() {
    let app = TestApp::new().await;
    app.user("reader").await;

    let (status, _) = app
        .request(
            Method::POST,
            "/api/v1/auth/register",
            None,
            Some(json!({ "username": "reader", "password": "other-pass" })),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_books_require_authentication() {
    let app = TestApp::new().await;

    let (status, _) = app.request(Method::GET, "/api/v1/books", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/api/v1/books", Some("garbage"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_create_each_book_type() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    for (book, field) in [
        (printed("1000000000001"), "pages"),
        (ebook("1000000000002"), "file_format"),
        (audiobook("1000000000003"), "duration"),
    ] {
        let (status, body) = app
            .request(Method::POST, "/api/v1/books", Some(&admin), Some(book))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        assert_eq!(body["available"], true);
        assert!(body["borrowed_by"].is_null());
        assert!(!body[field].is_null());
    }
}

#[tokio::test]
async fn test_create_normalizes_foreign_payload_fields() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let mut book = printed("1000000000010");
    book["file_format"] = json!("pdf");
    book["duration"] = json!(30);

    let (status, body) = app
        .request(Method::POST, "/api/v1/books", Some(&admin), Some(book))
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["pages"], 412);
    assert!(body["file_format"].is_null());
    assert!(body["duration"].is_null());
}

#[tokio::test]
async fn test_create_reports_payload_errors_per_field() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let mut book = printed("1000000000020");
    book["pages"] = json!(0);
    let (status, body) = app
        .request(Method::POST, "/api/v1/books", Some(&admin), Some(book))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["pages"][0], "Pages must be a positive integer.");

    let mut book = ebook("1000000000021");
    book["file_format"] = json!("application/epub");
    let (status, body) = app
        .request(Method::POST, "/api/v1/books", Some(&admin), Some(book))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["file_format"].is_array());

    let mut book = audiobook("1000000000022");
    book["book_type"] = json!("vinyl");
    let (status, body) = app
        .request(Method::POST, "/api/v1/books", Some(&admin), Some(book))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"]["book_type"][0], "invalid book_type");
}

#[tokio::test]
async fn test_create_rejects_duplicate_isbn() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_book(&admin, printed("1000000000030")).await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/books",
            Some(&admin),
            Some(ebook("1000000000030")),
        )
        .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Duplicate");
}

#[tokio::test]
async fn test_non_admin_cannot_write_even_with_bad_body() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, reader) = app.user("reader").await;
    let id = app.create_book(&admin, printed("1000000000040")).await;

    // Denied before the body is looked at.
    let (status, _) = app
        .request(Method::POST, "/api/v1/books", Some(&reader), Some(json!({ "bogus": 1 })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // A valid body is denied too, and nothing is created.
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/books",
            Some(&reader),
            Some(printed("1000000000041")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotAuthorized");

    let (_, body) = app.request(Method::GET, "/api/v1/books", Some(&admin), None).await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], id);

    let (status, _) = app
        .request(
            Method::PUT,
            &format!("/api/v1/books/{id}"),
            Some(&reader),
            Some(printed("1000000000040")),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::DELETE, &format!("/api/v1/books/{id}"), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Denied before existence is checked.
    let (status, _) = app
        .request(Method::DELETE, "/api/v1/books/9999", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_reader_can_list_and_retrieve() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, reader) = app.user("reader").await;
    let id = app.create_book(&admin, printed("1000000000050")).await;

    let (status, body) = app
        .request(Method::GET, &format!("/api/v1/books/{id}"), Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune");

    let (status, body) = app.request(Method::GET, "/api/v1/books", Some(&reader), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["id"], id);
}

#[tokio::test]
async fn test_get_missing_book() {
    let app = TestApp::new().await;
    let (_, reader) = app.user("reader").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/books/42", Some(&reader), None)
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchBook");
}

#[tokio::test]
async fn test_search_and_pagination() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_book(&admin, printed("1000000000060")).await;
    app.create_book(&admin, ebook("1000000000061")).await;
    app.create_book(&admin, audiobook("1000000000062")).await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/books?search=gibson", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Neuromancer");

    let (_, body) = app
        .request(Method::GET, "/api/v1/books?search=HOBBIT", Some(&admin), None)
        .await;
    assert_eq!(body["total"], 1);

    let (_, body) = app
        .request(Method::GET, "/api/v1/books?page=2&per_page=2", Some(&admin), None)
        .await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["page"], 2);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn test_update_and_patch() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let id = app.create_book(&admin, printed("1000000000070")).await;
    let uri = format!("/api/v1/books/{id}");

    let mut replacement = printed("1000000000070");
    replacement["title"] = json!("Dune Messiah");
    let (status, body) = app
        .request(Method::PUT, &uri, Some(&admin), Some(replacement))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Dune Messiah");

    // Switching type drops the old payload field.
    let (status, body) = app
        .request(
            Method::PATCH,
            &uri,
            Some(&admin),
            Some(json!({ "book_type": "audiobook", "duration": 1200 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["book_type"], "audiobook");
    assert_eq!(body["duration"], 1200);
    assert!(body["pages"].is_null());
    assert_eq!(body["title"], "Dune Messiah");

    // Switching without the new payload field fails.
    let (status, body) = app
        .request(Method::PATCH, &uri, Some(&admin), Some(json!({ "book_type": "ebook" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["fields"]["file_format"].is_array());
}

#[tokio::test]
async fn test_update_missing_book() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, _) = app
        .request(
            Method::PUT,
            "/api/v1/books/77",
            Some(&admin),
            Some(printed("1000000000080")),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_book() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let id = app.create_book(&admin, ebook("1000000000090")).await;
    let uri = format!("/api/v1/books/{id}");

    let (status, body) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_null());

    let (status, _) = app.request(Method::GET, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = app.request(Method::DELETE, &uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_missing_fields_are_listed() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let (status, body) = app
        .request(Method::POST, "/api/v1/books", Some(&admin), Some(json!({ "title": "x" })))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    for field in ["author", "isbn", "published_date"] {
        assert_eq!(body["fields"][field][0], "This field is required.", "{body}");
    }
    assert_eq!(body["fields"]["book_type"][0], "invalid book_type");
    assert!(body["fields"].get("title").is_none());
}

#[tokio::test]
async fn test_wrongly_typed_field_is_listed() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;

    let mut book = printed("1000000000100");
    book["pages"] = json!("many");
    let (status, body) = app
        .request(Method::POST, "/api/v1/books", Some(&admin), Some(book))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
    assert!(body["fields"]["non_field_errors"][0].is_string(), "{body}");

    let (_, body) = app.request(Method::GET, "/api/v1/books", Some(&admin), None).await;
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn test_non_numeric_id_is_json_bad_request() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    let (_, reader) = app.user("reader").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/books/abc", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    let (status, body) = app
        .request(Method::POST, "/api/v1/books/abc/borrow", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");

    // The policy still answers first.
    let (status, body) = app
        .request(Method::DELETE, "/api/v1/books/abc", Some(&reader), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "NotAuthorized");
}

#[tokio::test]
async fn test_bad_query_is_json_bad_request() {
    let app = TestApp::new().await;
    let (_, reader) = app.user("reader").await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/books?page=first", Some(&reader), None)
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_huge_page_returns_empty_page() {
    let app = TestApp::new().await;
    let admin = app.admin_token().await;
    app.create_book(&admin, printed("1000000000110")).await;

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/books?page={}", i64::MAX),
            Some(&admin),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["total"], 1);
    assert_eq!(body["page"], i64::MAX);
    assert_eq!(body["items"].as_array().map(Vec::len), Some(0));
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = TestApp::new().await;

    let (status, body) = app.request(Method::GET, "/api-docs/openapi.json", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/books/{id}/borrow"].is_object());
}
