use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use std::sync::Arc;
use tracing::debug;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::command::{Command, Reply};
use crate::error::FilterError;
use crate::filter::{BucketInfo, FilterInfo};
use crate::registry::lock_filter;
use crate::types::{
    AdvanceTimeRequest, AppState, CommandResponse, ErrorResponse, InsertRequest,
    QueryResponse, SetTimeRequest,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        insert_item,
        query_item,
        advance_time,
        set_time,
        clear_bucket,
        filter_info,
    ),
    components(
        schemas(
            InsertRequest, AdvanceTimeRequest, SetTimeRequest, QueryResponse,
            CommandResponse, ErrorResponse, FilterInfo, BucketInfo
        )
    ),
    tags(
        (name = "bucket-bloom", description = "Time-Bucketed Bloom Filter API")
    )
)]
struct ApiDoc;

fn error_response(e: FilterError) -> Response {
    let status = if e.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (
        status,
        Json(ErrorResponse {
            message: e.to_string(),
        }),
    )
        .into_response()
}

/// Runs a command and maps its integer reply to a JSON body.
fn run_command(state: &AppState, command: Command) -> Response {
    match state.adapter.apply(&command) {
        Ok(Reply::Integer(result)) => {
            (StatusCode::OK, Json(CommandResponse { result })).into_response()
        }
        Ok(other) => error_response(FilterError::Protocol(format!(
            "unexpected reply to {}: {other}",
            command.name()
        ))),
        Err(e) => error_response(e),
    }
}

/// Check API health
#[utoipa::path(
    get,
    path = "/health",
    tag = "bucket-bloom",
    responses(
        (status = 200, description = "API is healthy")
    )
)]
async fn health_check() -> impl IntoResponse {
    debug!("Health check");
    StatusCode::OK
}

/// Insert an item into the current bucket of a key's filter
#[utoipa::path(
    post,
    path = "/filters/{key}/items",
    tag = "bucket-bloom",
    params(
        ("key" = String, Path, description = "Filter key")
    ),
    request_body = InsertRequest,
    responses(
        (status = 200, description = "Item inserted", body = CommandResponse),
        (status = 400, description = "Invalid item", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn insert_item(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<InsertRequest>,
) -> Response {
    debug!("Inserting item into {}: {}", &key, &request.value);
    run_command(
        &state,
        Command::Add {
            key: key.into_bytes(),
            item: request.value.into_bytes(),
        },
    )
}

/// Query if an item exists in the live window of a key's filter
#[utoipa::path(
    get,
    path = "/filters/{key}/items/{value}",
    tag = "bucket-bloom",
    params(
        ("key" = String, Path, description = "Filter key"),
        ("value" = String, Path, description = "Value to query")
    ),
    responses(
        (status = 200, description = "Query successful", body = QueryResponse),
        (status = 400, description = "Invalid item", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
async fn query_item(
    State(state): State<Arc<AppState>>,
    Path((key, value)): Path<(String, String)>,
) -> Response {
    debug!("Querying item in {}: {}", &key, &value);
    let command = Command::Exists {
        key: key.into_bytes(),
        item: value.into_bytes(),
    };
    match state.adapter.apply(&command) {
        Ok(reply) => (
            StatusCode::OK,
            Json(QueryResponse {
                exists: reply == Reply::Integer(1),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// Advance the current time of a key's filter
#[utoipa::path(
    post,
    path = "/filters/{key}/time/advance",
    tag = "bucket-bloom",
    params(
        ("key" = String, Path, description = "Filter key")
    ),
    request_body = AdvanceTimeRequest,
    responses(
        (status = 200, description = "Time advanced, 0 for an unknown key", body = CommandResponse),
        (status = 400, description = "Invalid delta", body = ErrorResponse)
    )
)]
async fn advance_time(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<AdvanceTimeRequest>,
) -> Response {
    let delta = request.delta.unwrap_or(1);
    if delta < 1 {
        return error_response(FilterError::InvalidTime(format!(
            "time delta must be at least 1, got {delta}"
        )));
    }
    run_command(
        &state,
        Command::IncTime {
            key: key.into_bytes(),
            delta: delta as u64,
        },
    )
}

/// Set the current time of a key's filter
#[utoipa::path(
    put,
    path = "/filters/{key}/time",
    tag = "bucket-bloom",
    params(
        ("key" = String, Path, description = "Filter key")
    ),
    request_body = SetTimeRequest,
    responses(
        (status = 200, description = "Time set, 0 for an unknown key", body = CommandResponse),
        (status = 400, description = "Invalid time", body = ErrorResponse)
    )
)]
async fn set_time(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Json(request): Json<SetTimeRequest>,
) -> Response {
    run_command(
        &state,
        Command::SetTime {
            key: key.into_bytes(),
            time: request.time,
        },
    )
}

/// Evict every item recorded in one bucket
#[utoipa::path(
    delete,
    path = "/filters/{key}/buckets/{bucket}",
    tag = "bucket-bloom",
    params(
        ("key" = String, Path, description = "Filter key"),
        ("bucket" = i64, Path, description = "Bucket index to clear")
    ),
    responses(
        (status = 200, description = "Bucket cleared, 0 for an unknown key", body = CommandResponse),
        (status = 400, description = "Invalid bucket index", body = ErrorResponse)
    )
)]
async fn clear_bucket(
    State(state): State<Arc<AppState>>,
    Path((key, bucket)): Path<(String, i64)>,
) -> Response {
    run_command(
        &state,
        Command::ClearTime {
            key: key.into_bytes(),
            bucket,
        },
    )
}

/// Describe the window and buckets of a key's filter
#[utoipa::path(
    get,
    path = "/filters/{key}",
    tag = "bucket-bloom",
    params(
        ("key" = String, Path, description = "Filter key")
    ),
    responses(
        (status = 200, description = "Filter state", body = FilterInfo),
        (status = 404, description = "Unknown key", body = ErrorResponse)
    )
)]
async fn filter_info(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
) -> Response {
    let registry = state.adapter.registry();
    let filter = match registry.get(key.as_bytes()) {
        Ok(Some(filter)) => filter,
        Ok(None) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    message: format!("no filter for key '{key}'"),
                }),
            )
                .into_response();
        }
        Err(e) => return error_response(e),
    };
    let info = match lock_filter(&filter) {
        Ok(filter) => filter.info(),
        Err(e) => return error_response(e),
    };
    (StatusCode::OK, Json(info)).into_response()
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let openapi = ApiDoc::openapi();

    Router::new()
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi),
        )
        .route("/health", get(health_check))
        .route("/filters/{key}", get(filter_info))
        .route("/filters/{key}/items", post(insert_item))
        .route("/filters/{key}/items/{value}", get(query_item))
        .route("/filters/{key}/time/advance", post(advance_time))
        .route("/filters/{key}/time", put(set_time))
        .route("/filters/{key}/buckets/{bucket}", delete(clear_bucket))
        .with_state(state)
}
