mod common;

use axum::http::{header, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn complaints_path_answers_405_for_unserved_methods() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let user = app.register("Ada", "ada@example.com", "secret").await;

    for token in [user.as_str(), admin.as_str()] {
        let res = app.delete("/api/complaints", Some(token)).await;
        assert_eq!(res.status, StatusCode::METHOD_NOT_ALLOWED);
    }

    // Each served method keeps its own role
    assert_eq!(
        app.get("/api/complaints", Some(user.as_str())).await.status,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        app.get("/api/complaints", Some(admin.as_str())).await.status,
        StatusCode::OK
    );
}

#[tokio::test]
async fn only_plain_users_file_complaints() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let user = app.register("Ada", "ada@example.com", "secret").await;

    let filed = app
        .post(
            "/api/complaints",
            Some(user.as_str()),
            json!({ "message": "Ticket machine swallowed my card" }),
        )
        .await;
    assert_eq!(filed.status, StatusCode::CREATED);
    assert_eq!(filed.body["data"]["user"]["email"], "ada@example.com");

    // Exact role match: admins are not users
    let by_admin = app
        .post("/api/complaints", Some(admin.as_str()), json!({ "message": "Hi" }))
        .await;
    assert_eq!(by_admin.status, StatusCode::FORBIDDEN);

    let blank = app
        .post("/api/complaints", Some(user.as_str()), json!({ "message": "   " }))
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);

    let anonymous = app
        .post("/api/complaints", None, json!({ "message": "Hi" }))
        .await;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admins_review_complaints() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    let user = app.register("Ada", "ada@example.com", "secret").await;

    let filed = app
        .post(
            "/api/complaints",
            Some(user.as_str()),
            json!({ "message": "Platform lights are out" }),
        )
        .await;
    let id = filed.body["data"]["id"].as_str().unwrap().to_string();

    assert_eq!(
        app.get("/api/complaints", Some(user.as_str())).await.status,
        StatusCode::FORBIDDEN
    );

    let list = app.get("/api/complaints", Some(admin.as_str())).await;
    assert_eq!(list.status, StatusCode::OK);
    assert_eq!(list.body["count"], 1);
    assert_eq!(list.body["data"][0]["user"]["name"], "Ada");

    let one = app
        .get(&format!("/api/complaints/{}", id), Some(admin.as_str()))
        .await;
    assert_eq!(one.body["data"]["message"], "Platform lights are out");

    let missing = app
        .get(
            "/api/complaints/00000000-0000-4000-8000-000000000000",
            Some(admin.as_str()),
        )
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "Complaint not found");
}

#[tokio::test]
async fn admin_user_listing_paginates_and_filters() {
    let app = TestApp::new();
    let admin = app.admin_token().await;
    for i in 0..3 {
        app.register(&format!("Rider {}", i), &format!("rider{}@example.com", i), "secret")
            .await;
    }
    let user = app.register("Ada", "ada@example.com", "secret").await;

    assert_eq!(
        app.get("/api/users", Some(user.as_str())).await.status,
        StatusCode::FORBIDDEN
    );

    let page = app
        .get("/api/users?role=user&limit=2&page=2&sort=email", Some(admin.as_str()))
        .await;
    assert_eq!(page.status, StatusCode::OK);
    assert_eq!(page.body["total"], 4);
    assert_eq!(page.body["count"], 2);
    assert_eq!(
        page.body["pagination"],
        json!({ "page": 2, "limit": 2, "pages": 2 })
    );
    assert_eq!(page.body["data"][0]["email"], "rider1@example.com");

    let search = app.get("/api/users?search=ADA", Some(admin.as_str())).await;
    assert_eq!(search.body["total"], 1);

    let bad_sort = app.get("/api/users?sort=password", Some(admin.as_str())).await;
    assert_eq!(bad_sort.status, StatusCode::BAD_REQUEST);

    let id = search.body["data"][0]["id"].as_str().unwrap();
    let one = app.get(&format!("/api/users/{}", id), Some(admin.as_str())).await;
    assert_eq!(one.body["data"]["email"], "ada@example.com");

    let missing = app
        .get("/api/users/00000000-0000-4000-8000-000000000000", Some(admin.as_str()))
        .await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["error"], "User not found");
}

#[tokio::test]
async fn health_unknown_routes_and_headers() {
    let app = TestApp::new();

    let health = app.get("/api/health", None).await;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(health.body["status"], "ok");
    assert_eq!(health.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(health.headers[header::X_FRAME_OPTIONS], "DENY");

    for uri in ["/api/nowhere", "/elsewhere"] {
        let res = app.get(uri, None).await;
        assert_eq!(res.status, StatusCode::NOT_FOUND);
        assert_eq!(res.body["error"], "Route not found");
    }
}

#[tokio::test]
async fn error_stack_depends_on_environment() {
    let dev = TestApp::new();
    let res = dev.get("/api/auth/me", None).await;
    assert!(res.body["stack"].is_string());

    let prod = TestApp::with_args(&["--environment", "production"]);
    let res = prod.get("/api/auth/me", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert!(res.body.get("stack").is_none());
}

#[tokio::test]
async fn rate_limit_rejects_after_budget() {
    let app = TestApp::with_args(&["--rate-limit-max-requests", "2"]);

    assert_eq!(app.get("/api/health", None).await.status, StatusCode::OK);
    let second = app.get("/api/health", None).await;
    assert_eq!(second.status, StatusCode::OK);
    assert_eq!(second.headers["ratelimit-remaining"], "0");

    let third = app.get("/api/health", None).await;
    assert_eq!(third.status, StatusCode::TOO_MANY_REQUESTS);
    assert!(third.headers.contains_key(header::RETRY_AFTER));
    assert_eq!(third.body["success"], false);
}
