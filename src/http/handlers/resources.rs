//! `/v1/resources` handlers.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::data::{Filters, Metadata, ResourceDraft, ResourceQuery, Runtime, Validator};
use crate::http::handlers::{ensure_valid, read_id_param};
use crate::http::json::JsonBody;
use crate::http::response::ApiError;
use crate::http::server::AppState;

pub const X_EXPECTED_VERSION: &str = "x-expected-version";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateResourceInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub runtime: Runtime,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateResourceInput {
    pub title: Option<String>,
    pub year: Option<i32>,
    pub runtime: Option<Runtime>,
    pub genres: Option<Vec<String>>,
}

pub async fn create(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateResourceInput>,
) -> Result<Response, ApiError> {
    let draft = ResourceDraft {
        title: input.title,
        year: input.year,
        runtime: input.runtime,
        genres: input.genres,
    };

    let mut v = Validator::new();
    draft.validate(&mut v);
    ensure_valid(v)?;

    let resource = state.store.resources.insert(draft).await?;
    let location = format!("/v1/resources/{}", resource.id);

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, location)],
        Json(json!({ "resource": resource })),
    )
        .into_response())
}

pub async fn show(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = read_id_param(&raw_id)?;
    let resource = state.store.resources.get(id).await?;
    Ok(Json(json!({ "resource": resource })).into_response())
}

pub async fn update(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
    headers: HeaderMap,
    JsonBody(input): JsonBody<UpdateResourceInput>,
) -> Result<Response, ApiError> {
    let id = read_id_param(&raw_id)?;
    let mut resource = state.store.resources.get(id).await?;

    if let Some(expected) = headers.get(X_EXPECTED_VERSION) {
        let expected = expected
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .ok_or_else(|| {
                ApiError::BadRequest("X-Expected-Version must be an integer".into())
            })?;
        if expected != resource.version {
            return Err(ApiError::EditConflict);
        }
    }

    if let Some(title) = input.title {
        resource.title = title;
    }
    if let Some(year) = input.year {
        resource.year = year;
    }
    if let Some(runtime) = input.runtime {
        resource.runtime = runtime;
    }
    if let Some(genres) = input.genres {
        resource.genres = genres;
    }

    let mut v = Validator::new();
    resource.validate(&mut v);
    ensure_valid(v)?;

    state.store.resources.update(&mut resource).await?;
    Ok(Json(json!({ "resource": resource })).into_response())
}

pub async fn delete(
    State(state): State<AppState>,
    Path(raw_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = read_id_param(&raw_id)?;
    state.store.resources.delete(id).await?;
    Ok(Json(json!({ "message": "resource successfully deleted" })).into_response())
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    let query = parse_list_query(&params, &mut v);
    query.filters.validate(&mut v);
    ensure_valid(v)?;

    let (resources, total) = state.store.resources.list(&query).await?;
    let metadata = Metadata::calculate(total, query.filters.page, query.filters.page_size);

    Ok(Json(json!({ "resources": resources, "metadata": metadata })).into_response())
}

fn parse_list_query(params: &HashMap<String, String>, v: &mut Validator) -> ResourceQuery {
    let defaults = Filters::default();

    let title = params.get("title").cloned().unwrap_or_default();
    let genres = params
        .get("genres")
        .map(|csv| {
            csv.split(',')
                .map(str::trim)
                .filter(|g| !g.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let page = read_int(params, "page", defaults.page, v);
    let page_size = read_int(params, "page_size", defaults.page_size, v);
    let sort = params.get("sort").cloned().unwrap_or(defaults.sort);

    ResourceQuery {
        title,
        genres,
        filters: Filters {
            page,
            page_size,
            sort,
            sort_safelist: defaults.sort_safelist,
        },
    }
}

fn read_int(params: &HashMap<String, String>, key: &str, default: u64, v: &mut Validator) -> u64 {
    match params.get(key).map(String::as_str) {
        None | Some("") => default,
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) => u64::try_from(n).unwrap_or(0),
            Err(_) => {
                v.add_error(key, "must be an integer value");
                default
            }
        },
    }
}
