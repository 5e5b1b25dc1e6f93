//! HTTP boundary: request validation and the availability endpoint.

use std::sync::Arc;

use aggregator::Aggregator;
use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use common::types::{AvailabilityRequest, Slot};
use common::Error;
use cronofy_client::AvailabilityProvider;
use serde::Serialize;
use serde_json::json;
use tracing::{error, info};
use uuid::Uuid;

/// Shared handles for the request handlers.
pub struct AppState<P> {
    pub engine: Aggregator<P>,
}

/// Build the gateway router.
pub fn router<P: AvailabilityProvider + 'static>(state: Arc<AppState<P>>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/availability", post(availability::<P>))
        .with_state(state)
}

/// JSON extractor that rejects malformed bodies with 400 and the same error
/// envelope the field checks use, instead of axum's default 422.
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBody(value)),
            Err(rejection) => Err(validation_failure(vec![rejection.body_text()])),
        }
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Serialize)]
struct AvailabilityReply {
    success: bool,
    cache: &'static str,
    slots: Vec<Slot>,
}

/// Field-level checks applied before the engine sees a request. Every problem
/// is reported, not just the first.
pub fn validate_request(request: &AvailabilityRequest) -> Vec<String> {
    let mut errors: Vec<String> = Vec::new();

    if request.members.is_empty() {
        errors.push("members must contain at least one member".into());
    }
    for (i, member) in request.members.iter().enumerate() {
        if member.sub.trim().is_empty() {
            errors.push(format!("members[{i}].sub must not be empty"));
        }
    }

    if request.query_periods.is_empty() {
        errors.push("query_periods must contain at least one period".into());
    }
    for (i, period) in request.query_periods.iter().enumerate() {
        if period.start >= period.end {
            errors.push(format!("query_periods[{i}] must end after it starts"));
        }
    }

    if request.duration_buffer.duration_minutes == 0 {
        errors.push("duration_buffer.duration_minutes must be >= 1".into());
    }

    errors
}

async fn availability<P: AvailabilityProvider + 'static>(
    State(state): State<Arc<AppState<P>>>,
    JsonBody(request): JsonBody<AvailabilityRequest>,
) -> Response {
    let request_id = Uuid::new_v4();

    let errors = validate_request(&request);
    if !errors.is_empty() {
        info!(
            "request {} rejected: {} validation error(s)",
            request_id,
            errors.len()
        );
        return validation_failure(errors);
    }

    info!(
        "request {}: bucket={} members={} periods={}",
        request_id,
        request.cache_bucket.as_str(),
        request.members.len(),
        request.query_periods.len()
    );

    match state.engine.resolve(&request).await {
        Ok(aggregation) => {
            info!(
                "request {}: {} with {} slot(s)",
                request_id,
                aggregation.outcome.as_str(),
                aggregation.slots.len()
            );
            Json(AvailabilityReply {
                success: true,
                cache: aggregation.outcome.as_str(),
                slots: aggregation.slots,
            })
            .into_response()
        }
        Err(e) => {
            error!("request {} failed: {}", request_id, e);
            error_response(&e)
        }
    }
}

fn validation_failure(errors: Vec<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "errors": errors })),
    )
        .into_response()
}

/// Map core errors onto boundary status codes and the failure envelope.
fn error_response(error: &Error) -> Response {
    let status = match error {
        Error::Timeout => StatusCode::GATEWAY_TIMEOUT,
        Error::CronofyApi { .. } | Error::Http(_) => StatusCode::BAD_GATEWAY,
        Error::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({
            "success": false,
            "error": status.canonical_reason().unwrap_or("error"),
            "message": error.to_string(),
        })),
    )
        .into_response()
}
