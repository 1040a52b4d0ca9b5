//! Graceful shutdown against real sockets.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::routing::get;
use axum::Router;
use resource_gateway::lifecycle::{serve_with_grace, ServerError, Shutdown, ShutdownOutcome};
use resource_gateway::net::Listener;
use resource_gateway::HttpServer;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

mod common;

use common::{client, spawn_server, test_config, RecordingMailer, TestApp};

/// Router whose `/slow` takes 300ms and whose `/hang` never finishes.
/// `started` is notified once a handler is running.
fn stall_router(started: Arc<Notify>) -> Router {
    let slow_started = started.clone();
    Router::new()
        .route(
            "/slow",
            get(move || {
                let started = slow_started.clone();
                async move {
                    started.notify_one();
                    tokio::time::sleep(Duration::from_millis(300)).await;
                    "done"
                }
            }),
        )
        .route(
            "/hang",
            get(move || {
                let started = started.clone();
                async move {
                    started.notify_one();
                    std::future::pending::<()>().await;
                    "unreachable"
                }
            }),
        )
}

async fn serve(
    router: Router,
    grace: Duration,
) -> (
    SocketAddr,
    Shutdown,
    JoinHandle<Result<ShutdownOutcome, ServerError>>,
) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(tcp, 64);
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.clone();
    let handle = tokio::spawn(async move {
        serve_with_grace(listener, router, &server_shutdown, grace).await
    });
    (addr, shutdown, handle)
}

#[tokio::test]
async fn test_in_flight_request_finishes_before_exit() {
    let started = Arc::new(Notify::new());
    let (addr, shutdown, handle) = serve(stall_router(started.clone()), Duration::from_secs(5)).await;

    let request = tokio::spawn(async move {
        client()
            .get(format!("http://{addr}/slow"))
            .send()
            .await?
            .text()
            .await
    });

    started.notified().await;
    shutdown.trigger();

    let body = request.await.unwrap().expect("in-flight request completes");
    assert_eq!(body, "done");

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);

    // No new connections once shutdown has completed.
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_stuck_request_is_aborted_after_grace() {
    let started = Arc::new(Notify::new());
    let grace = Duration::from_millis(200);
    let (addr, shutdown, handle) = serve(stall_router(started.clone()), grace).await;

    let request = tokio::spawn(async move {
        client().get(format!("http://{addr}/hang")).send().await
    });

    started.notified().await;
    let triggered_at = Instant::now();
    shutdown.trigger();

    let outcome = handle.await.unwrap().unwrap();
    assert_eq!(outcome, ShutdownOutcome::TimedOut);
    assert!(triggered_at.elapsed() >= grace);
    assert!(triggered_at.elapsed() < Duration::from_secs(3));

    // The aborted connection is closed without a response.
    let result = tokio::time::timeout(Duration::from_secs(3), request)
        .await
        .expect("client observes the closed connection")
        .unwrap();
    assert!(result.is_err());
}

#[tokio::test]
async fn test_idle_server_stops_immediately() {
    let started = Arc::new(Notify::new());
    let (_addr, shutdown, handle) = serve(stall_router(started), Duration::from_secs(5)).await;

    shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("idle server exits without waiting for grace")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
}

#[tokio::test]
async fn test_signal_before_serving_exits_cleanly() {
    let config = test_config();
    let listener = Listener::bind(&config.listener).await.unwrap();
    let shutdown = Shutdown::new();
    shutdown.trigger();

    let server = HttpServer::new(config, shutdown);
    let outcome = tokio::time::timeout(Duration::from_secs(1), server.run(listener))
        .await
        .expect("server honours an early shutdown")
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert_eq!(outcome.exit_code(), 0);
}

#[tokio::test]
async fn test_full_server_serves_then_drains() {
    let mut config = test_config();
    config.rate_limit.enabled = true;
    let (addr, shutdown, handle) = spawn_server(config).await;

    let res = client()
        .get(format!("http://{addr}/v1/healthcheck"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert!(res.headers().contains_key("x-request-id"));
    let body: serde_json::Value = res.json().await.unwrap();
    assert_eq!(body["status"], "available");

    shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server drains within the grace period")
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert!(TcpStream::connect(addr).await.is_err());
}

#[tokio::test]
async fn test_pending_activation_mail_is_delivered_before_exit() {
    let app = TestApp::with_mailer(
        test_config(),
        RecordingMailer::with_delay(Duration::from_millis(300)),
    );
    let listener = Listener::bind(&app.state.config.listener).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::from_state(app.state.clone(), shutdown.clone());
    let handle = tokio::spawn(server.run(listener));

    let res = client()
        .post(format!("http://{addr}/v1/users"))
        .json(&serde_json::json!({
            "name": "Late Mail",
            "email": "late@example.com",
            "password": "pa55word!"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 202);
    assert!(!app.mailer.delivered_to("late@example.com"));

    shutdown.trigger();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(outcome, ShutdownOutcome::Graceful);
    assert!(app.mailer.delivered_to("late@example.com"));
}
