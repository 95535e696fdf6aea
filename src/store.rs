//! 学習済みパイプラインを保持する単一スロットのモデルストア。
//!
//! アーティファクトは既知のパスに1つだけ存在する。`save` は一時ファイルへ
//! 書いてから `rename` で差し替えるため、並行する `load` が書きかけの
//! アーティファクトを観測することはない。どちらの操作も同期的で、
//! 内部でのリトライは行わない。
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::classification::{
    PipelineSettings, TrainedPipeline, features::FeatureExtractor, model::LogisticModel,
};

const SCHEMA_VERSION: u32 = 1;

/// モデルストアの操作エラー。
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no model artifact at {path}")]
    NotFound { path: PathBuf },
    #[error("model artifact at {path} is corrupt: {reason}")]
    Corrupt { path: PathBuf, reason: String },
    #[error("model store io failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 学習済みパイプラインの直列化形式。
///
/// ベクトライザの語彙・IDF表と分類器の重み・バイアス、
/// 学習時のハイパーパラメータをすべて1つのアーティファクトに収める。
#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    schema_version: u32,
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    examples: usize,
    settings: PipelineSettings,
    vocab: Vec<String>,
    idf: Vec<f32>,
    hash_buckets: usize,
    weights: Vec<f32>,
    bias: f32,
}

impl ModelArtifact {
    fn from_pipeline(pipeline: &TrainedPipeline) -> Self {
        let extractor = pipeline.extractor();
        let model = pipeline.model();
        Self {
            schema_version: SCHEMA_VERSION,
            model_id: pipeline.model_id(),
            trained_at: pipeline.trained_at(),
            examples: pipeline.examples(),
            settings: pipeline.settings(),
            vocab: extractor.vocab().to_vec(),
            idf: extractor.idf().to_vec(),
            hash_buckets: extractor.hash_buckets(),
            weights: model.weights().to_vec(),
            bias: model.bias(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {} (expected {SCHEMA_VERSION})",
                self.schema_version
            ));
        }
        if self.idf.len() != self.vocab.len() {
            return Err(format!(
                "idf table length {} does not match vocab length {}",
                self.idf.len(),
                self.vocab.len()
            ));
        }
        if self.weights.len() != self.vocab.len() + self.hash_buckets {
            return Err(format!(
                "weight vector length {} does not match feature dimension {}",
                self.weights.len(),
                self.vocab.len() + self.hash_buckets
            ));
        }
        if !self.bias.is_finite() || self.weights.iter().any(|w| !w.is_finite()) {
            return Err("weights contain non-finite values".to_string());
        }
        Ok(())
    }

    fn into_pipeline(self) -> TrainedPipeline {
        let extractor = FeatureExtractor::from_metadata(self.vocab, self.idf, self.hash_buckets);
        let model = LogisticModel::from_parts(self.weights, self.bias);
        TrainedPipeline::from_parts(
            self.model_id,
            self.trained_at,
            self.examples,
            self.settings,
            extractor,
            model,
        )
    }
}

/// 固定パスに置かれたモデルアーティファクトへの読み書き。
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// アーティファクトの親ディレクトリを用意する。
    ///
    /// readiness プローブと `save` の冒頭から呼ばれる。
    ///
    /// # Errors
    /// ディレクトリが作成できない場合は [`StoreError::Io`] を返す。
    pub fn ensure_workspace(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(())
    }

    /// 学習済みパイプラインを直列化し、アーティファクトを差し替える。
    ///
    /// 同じディレクトリ内の一時ファイルに全体を書き出してから `rename` する。
    /// 途中で失敗した場合、既存のアーティファクトは無傷のまま残る。
    ///
    /// # Errors
    /// 書き込みに失敗した場合は [`StoreError::Io`] を返す。
    pub fn save(&self, pipeline: &TrainedPipeline) -> Result<(), StoreError> {
        self.ensure_workspace()?;

        let artifact = ModelArtifact::from_pipeline(pipeline);
        let bytes = serde_json::to_vec(&artifact).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source: io::Error::other(source),
        })?;

        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, &bytes).map_err(|source| StoreError::Io {
            path: tmp_path.clone(),
            source,
        })?;
        fs::rename(&tmp_path, &self.path).map_err(|source| StoreError::Io {
            path: self.path.clone(),
            source,
        })?;

        tracing::info!(
            model_id = %artifact.model_id,
            examples = artifact.examples,
            vocab_size = artifact.vocab.len(),
            path = %self.path.display(),
            "model artifact saved"
        );
        Ok(())
    }

    /// アーティファクトを読み込み、パイプラインを復元する。
    ///
    /// # Errors
    /// アーティファクトが存在しない場合は [`StoreError::NotFound`]、
    /// 直列化形式として不正な場合は [`StoreError::Corrupt`] を返す。
    /// 失敗時に既定のパイプラインへフォールバックすることはない。
    pub fn load(&self) -> Result<TrainedPipeline, StoreError> {
        let bytes = fs::read(&self.path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StoreError::NotFound {
                    path: self.path.clone(),
                }
            } else {
                StoreError::Io {
                    path: self.path.clone(),
                    source,
                }
            }
        })?;

        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
                path: self.path.clone(),
                reason: source.to_string(),
            })?;
        artifact.validate().map_err(|reason| StoreError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;

        Ok(artifact.into_pipeline())
    }
}
