//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware in request order
//! - Start the limiter reaper and serve until shutdown
//! - Wait for background tasks once connections have drained
//!
//! # Data Flow
//! ```text
//! Request
//!     → catch panic → metrics → request id → trace → timeout → body limit
//!     → CORS → rate limit → authenticate → [route guard] → handler
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, patch, post, put, MethodRouter},
    Extension, Router,
};
use tokio_util::task::TaskTracker;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::data::permissions::{RESOURCES_READ, RESOURCES_WRITE};
use crate::http::handlers::{self, debug, health, resources, tokens, users};
use crate::http::json::BodyLimit;
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};
use crate::http::response::recover_panic;
use crate::lifecycle::{serve_with_grace, ServerError, Shutdown, ShutdownOutcome};
use crate::mailer::{LogMailer, Mailer};
use crate::net::Listener;
use crate::observability::metrics::{track_metrics, HttpMetrics};
use crate::observability::RequestSpan;
use crate::security::auth::{authenticate, require, AuthChain, Requirement};
use crate::security::cors::cors_layer;
use crate::security::rate_limit::{rate_limit_middleware, ClientLimiterRegistry};
use crate::store::Store;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Store,
    pub auth: AuthChain,
    pub limiter: Arc<ClientLimiterRegistry>,
    pub metrics: Arc<HttpMetrics>,
    pub mailer: Arc<dyn Mailer>,
    /// Work that outlives its request, such as activation mail. Awaited
    /// after the connection drain.
    pub background: TaskTracker,
}

impl AppState {
    pub fn new(config: AppConfig, store: Store, mailer: Arc<dyn Mailer>) -> Self {
        let auth = AuthChain::new(store.users.clone(), store.permissions.clone());
        let limiter = Arc::new(ClientLimiterRegistry::from_config(&config.rate_limit));

        Self {
            config: Arc::new(config),
            store,
            auth,
            limiter,
            metrics: Arc::new(HttpMetrics::new()),
            mailer,
            background: TaskTracker::new(),
        }
    }
}

/// HTTP server for the resource service.
pub struct HttpServer {
    state: AppState,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Build a server over the bundled in-memory store.
    pub fn new(config: AppConfig, shutdown: Shutdown) -> Self {
        let store = Store::in_memory(config.store.timeout());
        let state = AppState::new(config, store, Arc::new(LogMailer));
        Self::from_state(state, shutdown)
    }

    pub fn from_state(state: AppState, shutdown: Shutdown) -> Self {
        Self { state, shutdown }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        Self::build_router(self.state.clone())
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let config = Arc::clone(&state.config);
        let max_body = config.security.max_body_size;

        Router::new()
            .route("/v1/healthcheck", get(health::healthcheck))
            .route(
                "/v1/resources",
                gated(RESOURCES_READ, get(resources::list))
                    .merge(gated(RESOURCES_WRITE, post(resources::create))),
            )
            .route(
                "/v1/resources/{id}",
                gated(RESOURCES_READ, get(resources::show)).merge(gated(
                    RESOURCES_WRITE,
                    patch(resources::update).delete(resources::delete),
                )),
            )
            .route("/v1/users", post(users::register))
            .route("/v1/users/activated", put(users::activate))
            .route(
                "/v1/tokens/authentication",
                post(tokens::create_authentication_token),
            )
            .route("/debug/vars", get(debug::vars))
            .fallback(handlers::not_found)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .layer(middleware::from_fn_with_state(state.auth.clone(), authenticate))
            .layer(middleware::from_fn_with_state(
                state.limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(cors_layer(&config.cors))
            .layer(Extension(BodyLimit(max_body)))
            .layer(DefaultBodyLimit::max(max_body))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
            .layer(middleware::from_fn_with_state(
                state.metrics.clone(),
                track_metrics,
            ))
            .layer(CatchPanicLayer::custom(recover_panic))
            .with_state(state)
    }

    /// Serve on `listener` until shutdown is triggered and drained.
    pub async fn run(self, listener: Listener) -> Result<ShutdownOutcome, ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = self.state.config.environment.as_str(),
            "HTTP server starting"
        );

        let reaper = self.state.limiter.spawn_reaper(self.shutdown.token());
        let grace = self.state.config.shutdown.grace();
        let router = self.router();

        let outcome = serve_with_grace(listener, router, &self.shutdown, grace).await?;

        let background = &self.state.background;
        background.close();
        if tokio::time::timeout(grace, background.wait()).await.is_err() {
            tracing::warn!(
                remaining = background.len(),
                "Background tasks still running after grace period"
            );
        }

        if let Some(reaper) = reaper {
            if let Err(e) = reaper.await {
                tracing::warn!(error = %e, "Client reaper ended abnormally");
            }
        }

        tracing::info!(outcome = ?outcome, "HTTP server stopped");
        Ok(outcome)
    }
}

/// Attach the permission guard for `code` to every method in `route`.
fn gated(code: &'static str, route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.route_layer(middleware::from_fn_with_state(
        Requirement::Permission(code),
        require,
    ))
}
