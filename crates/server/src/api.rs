//! HTTP API: prediction, health checks and Prometheus metrics

use axum::{
    extract::{rejection::JsonRejection, MatchedPath, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use housing_core::{
    health,
    models::{FeatureRecord, PredictionResponse},
    observability::{ServiceMetrics, StructuredLogger},
    serving::{ModelHandle, PredictError},
};
use prometheus::{Encoder, TextEncoder};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info};

const ROOT_MESSAGE: &str = "California housing price prediction API";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelHandle>,
    pub metrics: ServiceMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(model: ModelHandle, metrics: ServiceMetrics, logger: StructuredLogger) -> Self {
        Self {
            model: Arc::new(model),
            metrics,
            logger,
        }
    }
}

fn detail(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "detail": message.into() }))).into_response()
}

/// Liveness message; independent of model state
async fn root() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": ROOT_MESSAGE }))
}

/// Predict the median house value for one feature record
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeatureRecord>, JsonRejection>,
) -> Response {
    let record = match payload {
        Ok(Json(record)) => record,
        Err(rejection) => {
            let status = match &rejection {
                JsonRejection::JsonDataError(_) | JsonRejection::JsonSyntaxError(_) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                other => other.status(),
            };
            let message = rejection.body_text();
            state.logger.log_rejected_request(status.as_u16(), &message);
            return detail(status, message);
        }
    };

    if !state.model.is_ready() {
        state.metrics.inc_prediction_errors();
        return detail(StatusCode::SERVICE_UNAVAILABLE, "Model not available");
    }

    state.logger.log_prediction_request(&record);
    let started = Instant::now();

    match state.model.predict(&record) {
        Ok(value) => {
            let latency = started.elapsed().as_secs_f64();
            state.metrics.observe_prediction_latency(latency);
            state.metrics.inc_predictions();
            state.logger.log_prediction(value, latency);
            Json(PredictionResponse {
                predicted_median_house_value: value,
            })
            .into_response()
        }
        Err(PredictError::ModelUnavailable) => {
            state.metrics.inc_prediction_errors();
            detail(StatusCode::SERVICE_UNAVAILABLE, "Model not available")
        }
        Err(PredictError::Failed(reason)) => {
            state.metrics.inc_prediction_errors();
            state.logger.log_prediction_failed(&reason);
            detail(StatusCode::INTERNAL_SERVER_ERROR, "Prediction failed")
        }
    }
}

/// Health check response - returns 200 while the process is up, degraded or not
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (StatusCode::OK, Json(health::health(&state.model)))
}

/// Readiness check response - returns 200 if a model is loaded, 503 otherwise
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = health::readiness(&state.model);

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Count and time every request on a matched route
async fn track_requests(State(state): State<Arc<AppState>>, req: Request, next: Next) -> Response {
    let handler = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| req.uri().path().to_owned());
    let started = Instant::now();

    let response = next.run(req).await;

    state.metrics.observe_request(
        &handler,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/predict/", post(predict))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

/// Serve the API on `port` until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
