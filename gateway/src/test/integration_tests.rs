use axum::http::StatusCode;
use axum_test::TestServer;
use axum_test::multipart::{MultipartForm, Part};
use serde_json::{Value, json};

use crate::routes::create_app;
use crate::test::{PNG_1X1, build_state, token_for};

fn png_part() -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(PNG_1X1.to_vec()).file_name("a.png").mime_type("image/png"),
    )
}

#[tokio::test]
async fn health_check_requires_no_auth() {
    let state = build_state();
    let server = TestServer::new(create_app(state)).unwrap();

    let response = server.get("/health").await;
    response.assert_status_ok();
    response.assert_json_contains(&json!({ "status": "ok" }));
}

#[tokio::test]
async fn upload_without_a_token_is_unauthenticated() {
    let state = build_state();
    let server = TestServer::new(create_app(state)).unwrap();

    let response = server.post("/api/v1/images/upload").multipart(png_part()).await;
    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn happy_path_upload_then_status_then_get() {
    let state = build_state();
    let token = token_for(&state, "owner-1");
    let server = TestServer::new(create_app(state)).unwrap();

    let upload_response = server
        .post("/api/v1/images/upload")
        .authorization_bearer(&token)
        .multipart(png_part())
        .await;
    upload_response.assert_status(StatusCode::CREATED);
    let body: Value = upload_response.json();
    assert_eq!(body["status"], "pending");
    let image_id = body["image_id"].as_str().unwrap().to_string();

    let status_response = server
        .get(&format!("/api/v1/tasks/{image_id}/status"))
        .authorization_bearer(&token)
        .await;
    status_response.assert_status_ok();
    let status_body: Value = status_response.json();
    assert_eq!(status_body["status"], "pending");

    let get_response = server
        .get(&format!("/api/v1/images/{image_id}"))
        .authorization_bearer(&token)
        .await;
    get_response.assert_status_ok();
    let get_body: Value = get_response.json();
    assert_eq!(get_body["image_id"], image_id);
    assert!(get_body["protected_url"].is_null());
}

#[tokio::test]
async fn content_mismatch_is_rejected() {
    let state = build_state();
    let token = token_for(&state, "owner-1");
    let server = TestServer::new(create_app(state)).unwrap();

    let bad_part = MultipartForm::new().add_part(
        "file",
        Part::bytes(b"hello world".to_vec()).file_name("a.png").mime_type("image/png"),
    );
    let response = server
        .post("/api/v1/images/upload")
        .authorization_bearer(&token)
        .multipart(bad_part)
        .await;
    response.assert_status(StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn cross_owner_get_is_forbidden() {
    let state = build_state();
    let owner_token = token_for(&state, "owner-1");
    let other_token = token_for(&state, "owner-2");
    let server = TestServer::new(create_app(state)).unwrap();

    let upload_response = server
        .post("/api/v1/images/upload")
        .authorization_bearer(&owner_token)
        .multipart(png_part())
        .await;
    upload_response.assert_status(StatusCode::CREATED);
    let image_id = upload_response.json::<Value>()["image_id"].as_str().unwrap().to_string();

    let response = server
        .get(&format!("/api/v1/images/{image_id}"))
        .authorization_bearer(&other_token)
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn sixth_free_tier_upload_in_a_month_is_quota_exceeded() {
    let state = build_state();
    let token = token_for(&state, "owner-quota");
    let server = TestServer::new(create_app(state)).unwrap();

    for _ in 0..5 {
        let response = server
            .post("/api/v1/images/upload")
            .authorization_bearer(&token)
            .multipart(png_part())
            .await;
        response.assert_status(StatusCode::CREATED);
    }

    let sixth = server
        .post("/api/v1/images/upload")
        .authorization_bearer(&token)
        .multipart(png_part())
        .await;
    sixth.assert_status(StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn list_clamps_page_size_and_excludes_deleted() {
    let state = build_state();
    let token = token_for(&state, "owner-list");
    let server = TestServer::new(create_app(state)).unwrap();

    let upload_response = server
        .post("/api/v1/images/upload")
        .authorization_bearer(&token)
        .multipart(png_part())
        .await;
    let image_id = upload_response.json::<Value>()["image_id"].as_str().unwrap().to_string();

    server
        .delete(&format!("/api/v1/images/{image_id}"))
        .authorization_bearer(&token)
        .await
        .assert_status_ok();

    let list_response = server
        .get("/api/v1/images/?page=0&page_size=200")
        .authorization_bearer(&token)
        .await;
    list_response.assert_status_ok();
    let body: Value = list_response.json();
    assert_eq!(body["page"], 1);
    assert_eq!(body["page_size"], 100);
    assert_eq!(body["total"], 0);
}

#[tokio::test]
async fn retry_is_only_legal_from_failed() {
    let state = build_state();
    let token = token_for(&state, "owner-retry");
    let server = TestServer::new(create_app(state)).unwrap();

    let upload_response = server
        .post("/api/v1/images/upload")
        .authorization_bearer(&token)
        .multipart(png_part())
        .await;
    let image_id = upload_response.json::<Value>()["image_id"].as_str().unwrap().to_string();

    // Freshly uploaded image is `pending`, not `failed` — retry must conflict.
    let response = server
        .post(&format!("/api/v1/tasks/{image_id}/retry"))
        .authorization_bearer(&token)
        .await;
    response.assert_status(StatusCode::CONFLICT);
}
