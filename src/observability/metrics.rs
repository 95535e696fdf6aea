/// Prometheusメトリクス定義。
use prometheus::{
    Counter, Gauge, Histogram, Registry, register_counter_with_registry,
    register_gauge_with_registry, register_histogram_with_registry,
};

/// メトリクスコレクター。
#[derive(Debug, Clone)]
pub struct Metrics {
    // カウンター
    pub trainings_total: Counter,
    pub trainings_failed: Counter,
    pub classifications_total: Counter,
    pub batch_requests_total: Counter,
    pub batch_rows_total: Counter,
    pub model_load_failures: Counter,

    // ヒストグラム
    pub train_duration: Histogram,
    pub classify_duration: Histogram,
    pub batch_duration: Histogram,

    // ゲージ
    pub model_examples: Gauge,
}

impl Metrics {
    /// 新しいメトリクスコレクターを作成する。
    ///
    /// # Errors
    /// メトリクスの登録に失敗した場合はエラーを返す。
    pub fn new(registry: &Registry) -> Result<Self, prometheus::Error> {
        Ok(Self {
            trainings_total: register_counter_with_registry!(
                "screener_trainings_total",
                "Total number of successful training runs",
                registry
            )?,
            trainings_failed: register_counter_with_registry!(
                "screener_trainings_failed_total",
                "Total number of failed training runs",
                registry
            )?,
            classifications_total: register_counter_with_registry!(
                "screener_classifications_total",
                "Total number of single-email classifications",
                registry
            )?,
            batch_requests_total: register_counter_with_registry!(
                "screener_batch_requests_total",
                "Total number of batch classification requests",
                registry
            )?,
            batch_rows_total: register_counter_with_registry!(
                "screener_batch_rows_total",
                "Total number of rows scored across batch requests",
                registry
            )?,
            model_load_failures: register_counter_with_registry!(
                "screener_model_load_failures_total",
                "Total number of failed model artifact loads",
                registry
            )?,
            train_duration: register_histogram_with_registry!(
                "screener_train_duration_seconds",
                "Wall-clock duration of training runs",
                registry
            )?,
            classify_duration: register_histogram_with_registry!(
                "screener_classify_duration_seconds",
                "Wall-clock duration of single classifications",
                registry
            )?,
            batch_duration: register_histogram_with_registry!(
                "screener_batch_duration_seconds",
                "Wall-clock duration of batch classifications",
                registry
            )?,
            model_examples: register_gauge_with_registry!(
                "screener_model_examples",
                "Number of training examples behind the current model artifact",
                registry
            )?,
        })
    }
}
