use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    api::{ErrorResponse, store_error_response},
    app::AppState,
    classification::verdict,
};

#[derive(Debug, Deserialize)]
pub(crate) struct ClassifyRequest {
    text: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClassifyResponse {
    label: u8,
    verdict: &'static str,
    confidence: f32,
    model_id: Uuid,
}

/// POST /v1/classify
///
/// 1通のメール本文を現在のモデルで分類する。
/// 空文字や空白だけの入力は黙って分類せず、422で弾く。
pub(crate) async fn classify_one(
    State(state): State<AppState>,
    Json(payload): Json<ClassifyRequest>,
) -> impl IntoResponse {
    if payload.text.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ErrorResponse {
                error: "text must not be empty".to_string(),
            }),
        )
            .into_response();
    }

    let timer = std::time::Instant::now();
    let pipeline = match state.model_store().load() {
        Ok(pipeline) => pipeline,
        Err(error) => return store_error_response(&state, &error),
    };

    let prediction = pipeline.predict_with_confidence(std::slice::from_ref(&payload.text))[0];

    let metrics = state.telemetry().metrics();
    metrics.classifications_total.inc();
    metrics
        .classify_duration
        .observe(timer.elapsed().as_secs_f64());

    (
        StatusCode::OK,
        Json(ClassifyResponse {
            label: prediction.label,
            verdict: verdict(prediction.label),
            confidence: prediction.confidence,
            model_id: pipeline.model_id(),
        }),
    )
        .into_response()
}
