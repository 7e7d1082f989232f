use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use health::HealthStatus;
use tracing::error;

use crate::app_context::AppContext;
use crate::forwarder::{process_event, report_outcome, Disposition};

pub async fn index() -> &'static str {
    "splunk notification forwarder"
}

pub fn router(context: Arc<AppContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/_readiness", get(index))
        .route("/_liveness", get(liveness))
        .route("/internal/test", post(internal_test))
        .with_state(context)
}

async fn liveness(State(context): State<Arc<AppContext>>) -> HealthStatus {
    context.liveness.get_status()
}

/// Runs an envelope through the exact delivery pipeline, minus the Kafka
/// ingress and its filters. The outcome comes back in the response and is
/// also reported on the return topic, like any other event.
async fn internal_test(State(context): State<Arc<AppContext>>, body: Bytes) -> Response {
    match process_event(&context, &body, None).await {
        Disposition::Completed(history) => {
            if let Err(err) = report_outcome(&context, &history).await {
                error!("Failed to report test outcome: {}", err);
            }
            Json(history).into_response()
        }
        Disposition::NoEvents => StatusCode::NO_CONTENT.into_response(),
        Disposition::Rejected(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
        // No type filter is passed above, so this arm cannot be hit
        Disposition::Skipped => StatusCode::UNPROCESSABLE_ENTITY.into_response(),
    }
}
