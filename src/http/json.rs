//! JSON request bodies.
//!
//! `JsonBody<T>` replaces axum's `Json` extractor so that every decoding
//! failure becomes a 400 envelope with a readable message. Input types are
//! expected to carry `#[serde(deny_unknown_fields)]`.

use axum::{
    body::Bytes,
    extract::{FromRequest, Request},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::error::Category;

use crate::http::response::ApiError;

/// Body size cap, inserted as a request extension next to `DefaultBodyLimit`
/// so the rejection can name it.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let limit = req.extensions().get::<BodyLimit>().copied();

        let bytes = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge(limit.map_or(0, |BodyLimit(n)| n))
            } else {
                ApiError::BadRequest(rejection.body_text())
            }
        })?;

        decode(&bytes).map(JsonBody)
    }
}

/// Decode exactly one JSON value of type `T` from `bytes`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ApiError::BadRequest("body must not be empty".into()));
    }

    let mut de = serde_json::Deserializer::from_slice(bytes);
    let value = T::deserialize(&mut de).map_err(describe)?;
    de.end().map_err(|_| {
        ApiError::BadRequest("body must only contain a single JSON value".into())
    })?;
    Ok(value)
}

fn describe(e: serde_json::Error) -> ApiError {
    let position = format!("line {}, column {}", e.line(), e.column());
    let message = e.to_string();
    let message = message
        .rfind(" at line ")
        .map_or(message.as_str(), |idx| &message[..idx]);

    let text = match e.classify() {
        Category::Eof => "body contains badly-formed JSON".to_string(),
        Category::Syntax => format!("body contains badly-formed JSON (at {position})"),
        Category::Data => {
            if let Some(rest) = message.strip_prefix("unknown field ") {
                let key = rest.split(',').next().unwrap_or(rest).trim_matches('`');
                format!("body contains unknown key \"{key}\"")
            } else if message.starts_with("invalid type") {
                format!("body contains incorrect JSON type (at {position})")
            } else {
                message.to_string()
            }
        }
        Category::Io => "body could not be read".to_string(),
    };

    ApiError::BadRequest(text)
}
