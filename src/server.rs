//! HTTP routes for the scoring service

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info_span, warn};
use uuid::Uuid;

use crate::error::PredictError;
use crate::metrics::{MetricsSnapshot, ServiceMetrics};
use crate::models::inference::InferenceEngine;
use crate::types::prediction::PredictionResponse;
use crate::types::transaction::TransactionRecord;

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<InferenceEngine>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(engine: Arc<InferenceEngine>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { engine, metrics }
    }
}

/// Build the service router.
pub fn router(state: AppState, allow_any_origin: bool) -> Router {
    let router = Router::new()
        .route("/predict", post(predict))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if allow_any_origin {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// `POST /predict`: score one transaction record.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<TransactionRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>, PredictError> {
    let request_id = Uuid::new_v4();
    info_span!("predict", %request_id).in_scope(|| score(&state, payload))
}

fn score(
    state: &AppState,
    payload: Result<Json<TransactionRecord>, JsonRejection>,
) -> Result<Json<PredictionResponse>, PredictError> {
    let start_time = Instant::now();
    let outcome = payload
        .map_err(|rejection| PredictError::InvalidBody(rejection.body_text()))
        .and_then(|Json(record)| state.engine.predict(record));

    match outcome {
        Ok(result) => {
            let processing_time = start_time.elapsed();
            state
                .metrics
                .record_prediction(processing_time, &result.prediction);

            debug!(
                label = result.prediction.label,
                fraud_probability = result.prediction.positive_probability(),
                processing_time_us = processing_time.as_micros(),
                "Prediction served"
            );

            Ok(Json(PredictionResponse::from(&result)))
        }
        Err(e) => {
            state.metrics.record_failure(e.kind());

            if e.is_client_error() {
                warn!(error = %e, kind = e.kind(), "Rejected prediction request");
            } else {
                error!(error = %e, kind = e.kind(), "Prediction failed");
            }

            Err(e)
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "features": state.engine.feature_count(),
        "classes": state.engine.classes(),
    }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature_extractor::NUMERIC_COUNT;
    use crate::models::inference::Predictor;
    use crate::models::testing::{identity_scaler, standard_scaler, MockClassifier};
    use crate::normalizer::Normalizer;
    use crate::types::prediction::ErrorResponse;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use axum::response::{IntoResponse, Response};
    use tower::ServiceExt;

    fn state_with_scaler(columns: usize) -> AppState {
        let scaler = if columns == NUMERIC_COUNT {
            standard_scaler()
        } else {
            identity_scaler(columns)
        };
        let engine = InferenceEngine::from_parts(
            Normalizer::new(Arc::new(scaler)),
            Predictor::new(Arc::new(MockClassifier::new())),
        );
        AppState::new(Arc::new(engine), Arc::new(ServiceMetrics::new()))
    }

    fn state() -> AppState {
        state_with_scaler(NUMERIC_COUNT)
    }

    fn record(value: Value) -> TransactionRecord {
        serde_json::from_value(value).unwrap()
    }

    fn sample() -> Value {
        json!({
            "amt": 100.0,
            "zip": 10001,
            "lat": 40.7,
            "long": -74.0,
            "city_pop": 5000,
            "merch_lat": 40.71,
            "merch_long": -74.01,
            "trans_date_trans_time": "2023-01-01 08:00:00",
            "dob": "1985-01-01",
            "category": "grocery_pos",
            "gender": "M"
        })
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn call_predict(state: &AppState, value: Value) -> Response {
        predict(State(state.clone()), Ok(Json(record(value))))
            .await
            .into_response()
    }

    #[tokio::test]
    async fn test_predict_success() {
        let state = state();

        let response = call_predict(&state, sample()).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body: PredictionResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.prediction.len(), 1);
        assert_eq!(body.probability.len(), 1);
        assert_eq!(body.probability[0].len(), 2);
        assert!((body.probability[0].iter().sum::<f64>() - 1.0).abs() < 1e-9);

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.requests, 1);
        assert_eq!(snapshot.predictions, 1);
    }

    #[tokio::test]
    async fn test_predict_malformed_date_is_bad_request() {
        let state = state();
        let mut value = sample();
        value["trans_date_trans_time"] = json!("not-a-date");

        let response = call_predict(&state, value).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.error, "invalid_date");
        assert!(body.message.contains("trans_date_trans_time"));
        assert_eq!(
            state.metrics.snapshot().failures_by_kind.get("invalid_date"),
            Some(&1)
        );
    }

    #[tokio::test]
    async fn test_predict_missing_numeric_is_bad_request() {
        let state = state();
        let mut value = sample();
        value.as_object_mut().unwrap().remove("city_pop");

        let response = call_predict(&state, value).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.error, "missing_value");
    }

    #[tokio::test]
    async fn test_predict_schema_drift_is_internal_error() {
        let state = state_with_scaler(8);

        let response = call_predict(&state, sample()).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
        assert_eq!(body.error, "schema_mismatch");
    }

    #[tokio::test]
    async fn test_predict_non_string_labels_score_as_absent() {
        let classifier = Arc::new(MockClassifier::new());
        let engine = InferenceEngine::from_parts(
            Normalizer::new(Arc::new(standard_scaler())),
            Predictor::new(classifier.clone()),
        );
        let state = AppState::new(Arc::new(engine), Arc::new(ServiceMetrics::new()));
        let mut value = sample();
        value["category"] = json!(42);
        value["gender"] = json!(1);

        let response = call_predict(&state, value).await;
        assert_eq!(response.status(), StatusCode::OK);

        // Category and gender flags follow the numeric columns
        let row = classifier.last_row.lock().unwrap().clone();
        assert_eq!(row.len(), 23);
        assert!(row[NUMERIC_COUNT..].iter().all(|&v| v == 0.0));
    }

    async fn post_predict(state: &AppState, body: impl Into<Body>) -> Response {
        router(state.clone(), true)
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/predict")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(body.into())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_malformed_bodies_are_bad_requests() {
        let state = state();
        let bodies = [
            "[1, 2]",
            "{",
            r#"{"amt": "lots", "trans_date_trans_time": "2023-01-01 08:00:00", "dob": "1985-01-01"}"#,
            r#"{"amt": "NaN", "trans_date_trans_time": "2023-01-01 08:00:00", "dob": "1985-01-01"}"#,
        ];

        for (i, body) in bodies.into_iter().enumerate() {
            let response = post_predict(&state, body).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");

            let error: ErrorResponse = serde_json::from_value(body_json(response).await).unwrap();
            assert_eq!(error.error, "invalid_body", "{body}");
            assert_eq!(
                state.metrics.snapshot().failures_by_kind.get("invalid_body"),
                Some(&(i as u64 + 1))
            );
        }
        assert_eq!(state.metrics.snapshot().predictions, 0);
    }

    #[tokio::test]
    async fn test_predict_through_router() {
        let state = state();
        let body = serde_json::to_string(&sample()).unwrap();

        let response = post_predict(&state, body).await;
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert!(body["Prediction"].is_array());
        assert!(body["Probability"].is_array());
    }

    #[tokio::test]
    async fn test_health() {
        let Json(body) = health(State(state())).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["features"], 23);
        assert_eq!(body["classes"], json!([0, 1]));
    }

    #[tokio::test]
    async fn test_metrics_endpoint() {
        let state = state();
        call_predict(&state, sample()).await;

        let Json(snapshot) = metrics(State(state)).await;
        assert_eq!(snapshot.requests, 1);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state(), true);
        let _ = router(state(), false);
    }
}
