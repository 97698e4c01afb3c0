//! Shared setup for session-service integration tests.

#![allow(dead_code)]

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use service_core::config::Config;
use session_service::{
    build_router,
    config::ServiceConfig,
    services::{MockSessionCache, TokenPair},
    AppState,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const TEST_SECRET: &str = "integration_test_signing_secret";
pub const TEST_ISSUER: &str = "session-service-test";
pub const AUTO_LOGOUT_SECONDS: u64 = 300;

pub fn test_config() -> ServiceConfig {
    let vars: HashMap<&str, String> = HashMap::from([
        ("ENVIRONMENT", "dev".to_string()),
        ("SERVICE_NAME", "session-service-test".to_string()),
        ("JWT_SECRET", TEST_SECRET.to_string()),
        ("JWT_ISSUER", TEST_ISSUER.to_string()),
        ("JWT_ACCESS_TOKEN_EXPIRY_SECONDS", "900".to_string()),
        ("JWT_REFRESH_TOKEN_EXPIRY_SECONDS", "3600".to_string()),
        (
            "SESSION_AUTO_LOGOUT_SECONDS",
            AUTO_LOGOUT_SECONDS.to_string(),
        ),
        ("ALLOWED_ORIGINS", "http://localhost:3000".to_string()),
    ]);

    ServiceConfig::from_lookup(Config::default(), |key| vars.get(key).cloned())
        .expect("test configuration is valid")
}

/// Router over an in-memory session cache.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub cache: Arc<MockSessionCache>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("response body is JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8(self.body.to_vec()).expect("response body is UTF-8")
    }
}

impl TestApp {
    pub fn new() -> Self {
        let cache = Arc::new(MockSessionCache::new());
        let state = AppState::new(test_config(), cache.clone()).expect("state builds");
        let router = build_router(state.clone());

        Self {
            router,
            state,
            cache,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");

        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body is readable");

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> TestResponse {
        self.send(
            Request::builder()
                .method(Method::POST)
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn with_bearer(&self, method: Method, uri: &str, token: &str) -> TestResponse {
        self.send(
            Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    pub async fn login(&self, user_id: u64) -> TokenPair {
        let response = self
            .post_json("/auth/login", serde_json::json!({ "user_id": user_id }))
            .await;
        assert_eq!(response.status, StatusCode::OK, "login failed: {}", response.text());
        serde_json::from_slice(&response.body).expect("login returns a token pair")
    }

    pub async fn refresh(&self, refresh: &str) -> TestResponse {
        self.post_json("/auth/refresh", serde_json::json!({ "refresh": refresh }))
            .await
    }

    pub async fn authenticate(&self, access: &str) -> TestResponse {
        self.with_bearer(Method::GET, "/auth/authenticate", access)
            .await
    }

    pub async fn logout(&self, token: &str) -> TestResponse {
        self.with_bearer(Method::POST, "/auth/logout", token).await
    }
}
