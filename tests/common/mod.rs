//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use resource_gateway::config::AppConfig;
use resource_gateway::data::{NewUser, PasswordHash, Scope, Token, User, MIN_PASSWORD_COST};
use resource_gateway::http::{AppState, HttpServer};
use resource_gateway::lifecycle::{ServerError, Shutdown, ShutdownOutcome};
use resource_gateway::mailer::{Mailer, MailerError};
use resource_gateway::net::Listener;
use resource_gateway::store::Store;
use serde_json::Value;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Config for tests: loopback, ephemeral port, limiter off.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.rate_limit.enabled = false;
    config.shutdown.grace_secs = 5;
    config.security.password_cost = MIN_PASSWORD_COST;
    config
}

/// Captures activation mail instead of sending it.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<(String, String)>>,
    delay: Duration,
}

impl RecordingMailer {
    /// A mailer that takes `delay` to deliver each message.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Whether mail to `email` has been delivered, without waiting.
    pub fn delivered_to(&self, email: &str) -> bool {
        self.sent.lock().unwrap().iter().any(|(to, _)| to == email)
    }

    /// Wait for an activation token addressed to `email`.
    pub async fn token_for(&self, email: &str) -> String {
        for _ in 0..50 {
            let found = self
                .sent
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(to, _)| to == email)
                .map(|(_, token)| token.clone());
            if let Some(token) = found {
                return token;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no activation mail for {email}");
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_activation(&self, user: &User, token: &Token) -> Result<(), MailerError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((user.email.clone(), token.plaintext.clone()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub fn new(config: AppConfig) -> Self {
        Self::with_mailer(config, RecordingMailer::default())
    }

    pub fn with_mailer(config: AppConfig, mailer: RecordingMailer) -> Self {
        let mailer = Arc::new(mailer);
        let store = Store::in_memory(config.store.timeout());
        let state = AppState::new(config, store, mailer.clone());
        let router = HttpServer::build_router(state.clone());
        Self { state, router, mailer }
    }

    /// Create a user holding `permissions` and return it with a live
    /// authentication token.
    pub async fn seed_user(
        &self,
        email: &str,
        activated: bool,
        permissions: &[&str],
    ) -> (User, String) {
        let store = &self.state.store;
        let user = store
            .users
            .insert(NewUser {
                name: "Test User".into(),
                email: email.into(),
                password: PasswordHash::new("pa55word!", MIN_PASSWORD_COST).unwrap(),
                activated,
            })
            .await
            .unwrap();
        store.permissions.grant(user.id, permissions).await.unwrap();
        let token = store
            .tokens
            .issue(user.id, Duration::from_secs(3600), Scope::Authentication)
            .await
            .unwrap();
        (user, token.plaintext)
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        send(&self.router, request).await
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(router: &Router, request: Request<Body>) -> TestResponse {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse { status, headers, body }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_auth(Request::get(uri), token).body(Body::empty()).unwrap()
}

pub fn json(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    with_auth(Request::builder().method(method).uri(uri), token)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_auth(builder: axum::http::request::Builder, token: Option<&str>) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header("authorization", format!("Bearer {token}")),
        None => builder,
    }
}

/// Run a full server on an ephemeral port.
pub async fn spawn_server(
    config: AppConfig,
) -> (
    SocketAddr,
    Shutdown,
    JoinHandle<Result<ShutdownOutcome, ServerError>>,
) {
    let listener = Listener::bind(&config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(config, shutdown.clone());
    let handle = tokio::spawn(server.run(listener));
    (addr, shutdown, handle)
}

/// HTTP client that ignores proxy settings from the environment.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
