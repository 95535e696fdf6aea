use axum::{
    Json, body::Bytes, extract::State, http::StatusCode, response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    api::{ErrorResponse, store_error_response},
    app::AppState,
    classification::TrainedPipeline,
    ingest::TrainingTable,
};

#[derive(Debug, Serialize)]
pub(crate) struct TrainResponse {
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    examples: usize,
    spam_examples: usize,
    ham_examples: usize,
    vocab_size: usize,
    train_accuracy: f32,
}

/// POST /v1/model/train
///
/// `text` / `label` 列を持つCSVを受け取り、検証→学習→保存を行う。
/// 検証はパイプラインに触れる前に完了させ、不正な入力は422で行番号つきの
/// メッセージを返す。学習と保存はシングルライターのロック下で行う。
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub(crate) async fn train_model(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let timer = std::time::Instant::now();
    let metrics = state.telemetry().metrics().clone();

    let table = match TrainingTable::parse(&body) {
        Ok(table) => table,
        Err(error) => {
            metrics.trainings_failed.inc();
            warn!(%error, "rejected training table");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response();
        }
    };

    let _writer = state.train_lock().lock().await;

    let settings = state.config().pipeline_settings();
    let (texts, labels) = table.into_parts();
    // fit はCPUバウンドで完走するまでブロックする
    let fit_result =
        tokio::task::spawn_blocking(move || TrainedPipeline::fit(settings, &texts, &labels)).await;

    let (pipeline, report) = match fit_result {
        Ok(Ok(fitted)) => fitted,
        Ok(Err(error)) => {
            metrics.trainings_failed.inc();
            warn!(%error, "training data is degenerate");
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error: error.to_string(),
                }),
            )
                .into_response();
        }
        Err(join_error) => {
            metrics.trainings_failed.inc();
            error!(error = %join_error, "training task failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "training task failed".to_string(),
                }),
            )
                .into_response();
        }
    };

    if let Err(error) = state.model_store().save(&pipeline) {
        metrics.trainings_failed.inc();
        error!(%error, "failed to persist model artifact");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: "failed to persist model artifact".to_string(),
            }),
        )
            .into_response();
    }

    metrics.trainings_total.inc();
    metrics.train_duration.observe(timer.elapsed().as_secs_f64());
    metrics.model_examples.set(report.examples as f64);

    info!(
        model_id = %pipeline.model_id(),
        examples = report.examples,
        spam_examples = report.spam_examples,
        ham_examples = report.ham_examples,
        train_accuracy = f64::from(report.train_accuracy),
        "model trained and saved"
    );

    (
        StatusCode::OK,
        Json(TrainResponse {
            model_id: pipeline.model_id(),
            trained_at: pipeline.trained_at(),
            examples: report.examples,
            spam_examples: report.spam_examples,
            ham_examples: report.ham_examples,
            vocab_size: report.vocab_size,
            train_accuracy: report.train_accuracy,
        }),
    )
        .into_response()
}

#[derive(Debug, Serialize)]
pub(crate) struct ModelInfoResponse {
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    examples: usize,
    vocab_size: usize,
}

/// GET /v1/model
///
/// 現在のアーティファクトのメタデータを返す。
pub(crate) async fn model_info(State(state): State<AppState>) -> impl IntoResponse {
    match state.model_store().load() {
        Ok(pipeline) => (
            StatusCode::OK,
            Json(ModelInfoResponse {
                model_id: pipeline.model_id(),
                trained_at: pipeline.trained_at(),
                examples: pipeline.examples(),
                vocab_size: pipeline.extractor().vocab_len(),
            }),
        )
            .into_response(),
        Err(error) => store_error_response(&state, &error),
    }
}
