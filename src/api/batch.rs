use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, warn};

use crate::{
    api::{ErrorResponse, store_error_response},
    app::AppState,
    ingest::BatchTable,
};

/// POST /v1/classify/batch
///
/// `text` 列を持つCSVを受け取り、全行を1つのモデルインスタンスで採点して
/// `prediction` 列を追記したCSVを返す。モデルのロードはリクエストにつき
/// 1回だけで、バッチ内の全行は必ず同じモデル版で採点される。
/// 使えるモデルが無い場合はバッチ全体が失敗する（行単位の部分成功はない）。
#[allow(clippy::cast_precision_loss)]
pub(crate) async fn classify_batch(
    State(state): State<AppState>,
    body: Bytes,
) -> impl IntoResponse {
    let timer = std::time::Instant::now();

    let table = match BatchTable::parse(&body) {
        Ok(table) => table,
        Err(error) => {
            warn!(%error, "rejected batch table");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response();
        }
    };

    let pipeline = match state.model_store().load() {
        Ok(pipeline) => pipeline,
        Err(error) => return store_error_response(&state, &error),
    };

    let predictions = pipeline.predict(&table.texts());
    let csv_bytes = match table.to_csv_with_predictions(&predictions) {
        Ok(bytes) => bytes,
        Err(error) => {
            warn!(%error, "failed to render batch result csv");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "failed to render batch result".to_string(),
                }),
            )
                .into_response();
        }
    };

    let metrics = state.telemetry().metrics();
    metrics.batch_requests_total.inc();
    metrics.batch_rows_total.inc_by(table.len() as f64);
    metrics.batch_duration.observe(timer.elapsed().as_secs_f64());

    info!(
        rows = table.len(),
        model_id = %pipeline.model_id(),
        "batch classified"
    );

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"predictions.csv\"".to_string(),
            ),
            (
                header::HeaderName::from_static("x-model-id"),
                pipeline.model_id().to_string(),
            ),
        ],
        csv_bytes,
    )
        .into_response()
}
