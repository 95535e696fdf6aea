use std::{
    env,
    net::SocketAddr,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use thiserror::Error;

use crate::classification::PipelineSettings;

#[cfg(test)]
use once_cell::sync::Lazy;
#[cfg(test)]
pub(crate) static ENV_MUTEX: Lazy<std::sync::Mutex<()>> = Lazy::new(|| std::sync::Mutex::new(()));

/// サービス全体の設定値。
///
/// すべての項目に既定値があり、環境変数で上書きできる。
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    http_bind: SocketAddr,
    model_path: PathBuf,
    vocab_size: NonZeroUsize,
    hash_buckets: usize,
    train_epochs: NonZeroUsize,
    learning_rate: f32,
    l2_penalty: f32,
    max_upload_bytes: usize,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数から設定値を読み込み、検証する。
    ///
    /// # Errors
    /// 数値・アドレスのパースに失敗した場合や範囲外の値は [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_bind = parse_socket_addr("SCREENER_HTTP_BIND", "0.0.0.0:9010")?;
        let model_path = PathBuf::from(
            env::var("SCREENER_MODEL_PATH")
                .unwrap_or_else(|_| "models/spam_model.json".to_string()),
        );
        let vocab_size = parse_non_zero_usize("SCREENER_VOCAB_SIZE", 4096)?;
        let hash_buckets = parse_usize("SCREENER_HASH_BUCKETS", 32)?;
        let train_epochs = parse_non_zero_usize("SCREENER_TRAIN_EPOCHS", 300)?;
        let learning_rate = parse_positive_f32("SCREENER_LEARNING_RATE", 0.5)?;
        let l2_penalty = parse_non_negative_f32("SCREENER_L2_PENALTY", 1e-4)?;
        let max_upload_bytes = parse_usize("SCREENER_MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?;

        Ok(Self {
            http_bind,
            model_path,
            vocab_size,
            hash_buckets,
            train_epochs,
            learning_rate,
            l2_penalty,
            max_upload_bytes,
        })
    }

    #[must_use]
    pub fn http_bind(&self) -> SocketAddr {
        self.http_bind
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_bytes
    }

    /// パイプライン構築に渡すハイパーパラメータを組み立てる。
    #[must_use]
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            vocab_size: self.vocab_size.get(),
            hash_buckets: self.hash_buckets,
            epochs: self.train_epochs.get(),
            learning_rate: self.learning_rate,
            l2_penalty: self.l2_penalty,
        }
    }
}

fn parse_socket_addr(name: &'static str, default: &str) -> Result<SocketAddr, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_non_zero_usize(name: &'static str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    let parsed = raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })?;
    NonZeroUsize::new(parsed).ok_or_else(|| ConfigError::Invalid {
        name,
        source: anyhow::anyhow!("must be greater than zero"),
    })
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_positive_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let parsed = parse_f32(name, default)?;
    if parsed <= 0.0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must be greater than zero"),
        });
    }
    Ok(parsed)
}

fn parse_non_negative_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let parsed = parse_f32(name, default)?;
    if parsed < 0.0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("must not be negative"),
        });
    }
    Ok(parsed)
}

fn parse_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<f32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_env(name: &str, value: &str) {
        // SAFETY: tests run sequentially behind ENV_MUTEX and assign valid UTF-8 values.
        unsafe {
            env::set_var(name, value);
        }
    }

    fn remove_env(name: &str) {
        // SAFETY: tests run sequentially behind ENV_MUTEX and clean up deterministic keys.
        unsafe {
            env::remove_var(name);
        }
    }

    fn reset_env() {
        remove_env("SCREENER_HTTP_BIND");
        remove_env("SCREENER_MODEL_PATH");
        remove_env("SCREENER_VOCAB_SIZE");
        remove_env("SCREENER_HASH_BUCKETS");
        remove_env("SCREENER_TRAIN_EPOCHS");
        remove_env("SCREENER_LEARNING_RATE");
        remove_env("SCREENER_L2_PENALTY");
        remove_env("SCREENER_MAX_UPLOAD_BYTES");
    }

    #[test]
    fn from_env_uses_defaults_when_unset() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();

        let config = Config::from_env().expect("config should load");
        assert_eq!(config.http_bind().port(), 9010);
        assert_eq!(config.model_path(), Path::new("models/spam_model.json"));
        assert_eq!(config.max_upload_bytes(), 10 * 1024 * 1024);

        let settings = config.pipeline_settings();
        assert_eq!(settings.vocab_size, 4096);
        assert_eq!(settings.hash_buckets, 32);
        assert_eq!(settings.epochs, 300);
    }

    #[test]
    fn from_env_honors_overrides() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SCREENER_HTTP_BIND", "127.0.0.1:18080");
        set_env("SCREENER_MODEL_PATH", "/tmp/screener/model.json");
        set_env("SCREENER_VOCAB_SIZE", "128");

        let config = Config::from_env().expect("config should load");
        assert_eq!(config.http_bind().port(), 18080);
        assert_eq!(config.model_path(), Path::new("/tmp/screener/model.json"));
        assert_eq!(config.pipeline_settings().vocab_size, 128);

        reset_env();
    }

    #[test]
    fn zero_vocab_size_is_rejected() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SCREENER_VOCAB_SIZE", "0");

        assert!(Config::from_env().is_err());

        reset_env();
    }

    #[test]
    fn negative_learning_rate_is_rejected() {
        let _lock = ENV_MUTEX.lock().expect("env mutex");
        reset_env();
        set_env("SCREENER_LEARNING_RATE", "-0.1");

        assert!(Config::from_env().is_err());

        reset_env();
    }
}
