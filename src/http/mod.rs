//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Connection (net)
//!     → server.rs (Axum router, middleware stack)
//!     → request.rs (request ID)
//!     → handlers/ (decode with json.rs, call the store)
//!     → response.rs (error envelope)
//! ```

pub mod handlers;
pub mod json;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{AppState, HttpServer};
