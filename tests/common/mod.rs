//! Shared harness: a full router over a throwaway SQLite file and an in-memory mailer.

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use clap::Parser;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;
use train_station_api::{
    auth::{mailer::MemoryMailer, models::UserRole},
    build_router, AppConfig, AppState,
};

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<MemoryMailer>,
    _db: NamedTempFile,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(MemoryMailer::new(), &[])
    }

    pub fn with_failing_mailer() -> Self {
        Self::build(MemoryMailer::failing(), &[])
    }

    /// Extra CLI-style flags, e.g. `["--environment", "production"]`
    pub fn with_args(args: &[&str]) -> Self {
        Self::build(MemoryMailer::new(), args)
    }

    fn build(mailer: MemoryMailer, extra: &[&str]) -> Self {
        let db = NamedTempFile::new().unwrap();
        let db_path = db.path().to_str().unwrap().to_string();

        let mut args = vec![
            "train-station",
            "--jwt-secret",
            JWT_SECRET,
            "--database-path",
            db_path.as_str(),
            "--bcrypt-cost",
            "4",
        ];
        args.extend_from_slice(extra);
        let config = AppConfig::try_parse_from(args).unwrap();

        let mailer = Arc::new(mailer);
        let state = AppState::new(config, mailer.clone()).unwrap();
        let router = build_router(state.clone());

        Self {
            router,
            state,
            mailer,
            _db: db,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Register a regular user and return their session token
    pub async fn register(&self, name: &str, email: &str, password: &str) -> String {
        let res = self
            .post(
                "/api/auth/register",
                None,
                json!({ "name": name, "email": email, "password": password }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.body["token"].as_str().unwrap().to_string()
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.post(
            "/api/auth/login",
            None,
            json!({ "email": email, "password": password }),
        )
        .await
    }

    /// Create an admin directly in the store and log in as them
    pub async fn admin_token(&self) -> String {
        self.state
            .users
            .create_user("Root", "root@example.com", "admin-pass", UserRole::Admin)
            .unwrap();
        let res = self.login("root@example.com", "admin-pass").await;
        assert_eq!(res.status, StatusCode::OK, "{}", res.body);
        res.body["token"].as_str().unwrap().to_string()
    }

    pub async fn create_station(
        &self,
        admin_token: &str,
        name: &str,
        lng: f64,
        lat: f64,
        active: bool,
    ) -> Value {
        let res = self
            .post(
                "/api/stations",
                Some(admin_token),
                json!({
                    "name": name,
                    "location": { "type": "Point", "coordinates": [lng, lat] },
                    "address": format!("{} square", name),
                    "city": "Cairo",
                    "isActive": active,
                }),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
        res.body["data"].clone()
    }
}
