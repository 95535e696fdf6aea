use std::sync::Arc;

use anyhow::Result;
use axum::Router;
use tokio::sync::Mutex;

use crate::{api, config::Config, observability::Telemetry, store::ModelStore};

#[derive(Clone)]
pub(crate) struct AppState {
    registry: Arc<ComponentRegistry>,
}

/// アプリケーション全体で共有するコンポーネント群。
pub struct ComponentRegistry {
    config: Arc<Config>,
    telemetry: Telemetry,
    model_store: Arc<ModelStore>,
    // 学習はシングルライター。保存はアトミックなrenameなので、
    // 推論側はロックなしで読んでよい。
    train_lock: Mutex<()>,
}

impl AppState {
    pub(crate) fn new(registry: ComponentRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub(crate) fn telemetry(&self) -> &Telemetry {
        &self.registry.telemetry
    }

    pub(crate) fn config(&self) -> &Config {
        &self.registry.config
    }

    pub(crate) fn model_store(&self) -> Arc<ModelStore> {
        Arc::clone(&self.registry.model_store)
    }

    pub(crate) fn train_lock(&self) -> &Mutex<()> {
        &self.registry.train_lock
    }
}

impl ComponentRegistry {
    /// 構成情報と依存をまとめて初期化し、アプリケーションの共有レジストリを構築する。
    ///
    /// # Errors
    /// Telemetry の初期化に失敗した場合はエラーを返す。
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);
        let telemetry = Telemetry::new()?;
        let model_store = Arc::new(ModelStore::new(config.model_path()));

        Ok(Self {
            config,
            telemetry,
            model_store,
            train_lock: Mutex::new(()),
        })
    }
}

#[must_use]
pub fn build_router(registry: ComponentRegistry) -> Router {
    let state = AppState::new(registry);
    api::router(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ENV_MUTEX;

    #[test]
    fn component_registry_builds_with_defaults() {
        let config = {
            let _lock = ENV_MUTEX.lock().expect("env mutex");
            Config::from_env().expect("config loads")
        };
        let registry = ComponentRegistry::build(config).expect("registry builds");
        let state = AppState::new(registry);

        state.telemetry().record_ready_probe();
        assert!(state.model_store().path().ends_with("spam_model.json"));
    }
}
