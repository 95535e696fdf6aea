pub(crate) mod batch;
pub(crate) mod classify;
pub(crate) mod health;
pub(crate) mod metrics;
pub(crate) mod train;
pub(crate) mod ui;

use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::{app::AppState, store::StoreError};

/// 使えるモデルが無いときの統一メッセージ。
///
/// 原因（未学習か破損か）はログとメトリクスに残し、
/// クライアントには同じ文言だけを返す。
pub(crate) const MODEL_UNAVAILABLE: &str = "no usable model available; train a model first";

#[derive(Debug, Serialize)]
pub(crate) struct ErrorResponse {
    pub(crate) error: String,
}

pub(crate) fn router(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes();
    Router::new()
        .route("/", get(ui::index))
        .route("/health/ready", get(health::ready))
        .route("/health/live", get(health::live))
        .route("/metrics", get(metrics::exporter))
        .route("/v1/model/train", post(train::train_model))
        .route("/v1/model", get(train::model_info))
        .route("/v1/classify", post(classify::classify_one))
        .route("/v1/classify/batch", post(batch::classify_batch))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// ストアの失敗をセッション境界でHTTPレスポンスに翻訳する。
///
/// `NotFound` / `Corrupt` はどちらも「モデルなし、まず学習せよ」に畳み、
/// それ以外のI/O失敗はサーバエラーとして返す。黙って既定の予測に
/// フォールバックすることはしない。
pub(crate) fn store_error_response(state: &AppState, error: &StoreError) -> Response {
    match error {
        StoreError::NotFound { path } => {
            info!(path = %path.display(), "inference requested before any model was trained");
            (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: MODEL_UNAVAILABLE.to_string(),
                }),
            )
                .into_response()
        }
        StoreError::Corrupt { path, reason } => {
            state.telemetry().metrics().model_load_failures.inc();
            error!(path = %path.display(), reason, "model artifact is corrupt");
            (
                StatusCode::CONFLICT,
                Json(ErrorResponse {
                    error: MODEL_UNAVAILABLE.to_string(),
                }),
            )
                .into_response()
        }
        StoreError::Io { path, source } => {
            state.telemetry().metrics().model_load_failures.inc();
            error!(path = %path.display(), error = %source, "model store io failure");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "model store unavailable".to_string(),
                }),
            )
                .into_response()
        }
    }
}
