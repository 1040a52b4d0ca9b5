//! Per-request spans.
//!
//! Every request runs inside an `http_request` span carrying the method,
//! path and request ID. `user_id` starts empty and is filled in once the
//! caller is authenticated.

use axum::{body::Body, http::Request};
use tower_http::trace::MakeSpan;
use tracing::Span;

use crate::http::request::request_id;

#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl MakeSpan<Body> for RequestSpan {
    fn make_span(&mut self, request: &Request<Body>) -> Span {
        tracing::info_span!(
            "http_request",
            method = %request.method(),
            path = %request.uri().path(),
            request_id = %request_id(request.headers()).unwrap_or("-"),
            user_id = tracing::field::Empty,
        )
    }
}
