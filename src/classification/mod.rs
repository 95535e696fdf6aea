//! スパム/ハム分類パイプラインの高水準API。
//!
//! ベクトライザ（語彙学習つき特徴量抽出）と分類器（ロジスティック回帰）を
//! 1つの単位として学習・適用する。推論時の語彙が学習時の語彙と食い違うことが
//! ないよう、両者は常に同じ [`TrainedPipeline`] に同梱される。
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

pub mod features;
pub mod model;
pub mod tokenizer;

use features::FeatureExtractor;
use model::{LogisticModel, TrainOptions};
use tokenizer::TokenPipeline;

/// スパムを表すラベル値。
pub const SPAM: u8 = 1;
/// ハム（正当なメール）を表すラベル値。
pub const HAM: u8 = 0;

/// ラベル値を表示用の文字列にする。
#[must_use]
pub fn verdict(label: u8) -> &'static str {
    if label == SPAM { "spam" } else { "ham" }
}

/// パイプライン構築時に明示的に与えるハイパーパラメータ。
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PipelineSettings {
    pub vocab_size: usize,
    pub hash_buckets: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub l2_penalty: f32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            vocab_size: 4096,
            hash_buckets: 32,
            epochs: 300,
            learning_rate: 0.5,
            l2_penalty: 1e-4,
        }
    }
}

/// 学習データが退化しているときのエラー。
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training table is empty")]
    EmptyTrainingSet,
    #[error("training table contains only {0} examples; need at least one spam and one ham")]
    SingleClass(&'static str),
}

/// 1件分の分類結果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub label: u8,
    /// 予測したクラスの確率。常に [0.5, 1.0] に収まる。
    pub confidence: f32,
}

/// 学習直後の統計情報。
#[derive(Debug, Clone, Copy)]
pub struct TrainReport {
    pub examples: usize,
    pub spam_examples: usize,
    pub ham_examples: usize,
    pub vocab_size: usize,
    pub train_accuracy: f32,
}

/// 学習済みパイプライン。
///
/// `fit` か、保存済みアーティファクトの復元によってのみ構築できる。
/// 未学習のインスタンスは型として存在しないため、未学習のまま `predict` を
/// 呼ぶ誤用はコンパイル時に排除される。学習済み状態は不変で、再学習は
/// 常に新しいインスタンスを作る。
#[derive(Debug)]
pub struct TrainedPipeline {
    model_id: Uuid,
    trained_at: DateTime<Utc>,
    examples: usize,
    settings: PipelineSettings,
    tokenizer: TokenPipeline,
    extractor: FeatureExtractor,
    model: LogisticModel,
}

impl TrainedPipeline {
    /// ラベル付きコーパスからパイプラインを学習する。
    ///
    /// 語彙・IDF表・分類器の重みをこのコーパスだけから学習する。
    /// 1クラスしか含まないコーパスは退化した分類器しか生まないため、
    /// 黙って学習せず [`TrainError::SingleClass`] で即座に失敗する。
    ///
    /// # Errors
    /// コーパスが空、または1クラスのみの場合はエラーを返す。
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(
        settings: PipelineSettings,
        texts: &[String],
        labels: &[u8],
    ) -> Result<(Self, TrainReport), TrainError> {
        if texts.is_empty() || labels.is_empty() {
            return Err(TrainError::EmptyTrainingSet);
        }
        let spam_examples = labels.iter().filter(|label| **label == SPAM).count();
        let ham_examples = labels.len() - spam_examples;
        if spam_examples == 0 {
            return Err(TrainError::SingleClass("ham"));
        }
        if ham_examples == 0 {
            return Err(TrainError::SingleClass("spam"));
        }

        let tokenizer = TokenPipeline::new();
        let tokenized: Vec<Vec<String>> = texts.iter().map(|text| tokenizer.tokenize(text)).collect();
        let extractor =
            FeatureExtractor::build_from_corpus(&tokenized, settings.vocab_size, settings.hash_buckets);
        let feature_rows: Vec<Vec<f32>> = tokenized
            .iter()
            .map(|tokens| extractor.extract(tokens))
            .collect();

        let model = LogisticModel::train(
            &feature_rows,
            labels,
            TrainOptions {
                epochs: settings.epochs,
                learning_rate: settings.learning_rate,
                l2_penalty: settings.l2_penalty,
            },
        );

        let correct = feature_rows
            .iter()
            .zip(labels.iter())
            .filter(|(row, label)| label_for(model.spam_probability(row)) == **label)
            .count();
        let train_accuracy = correct as f32 / labels.len() as f32;

        let report = TrainReport {
            examples: labels.len(),
            spam_examples,
            ham_examples,
            vocab_size: extractor.vocab_len(),
            train_accuracy,
        };

        let pipeline = Self {
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            examples: labels.len(),
            settings,
            tokenizer,
            extractor,
            model,
        };

        Ok((pipeline, report))
    }

    /// 保存済みの学習状態からパイプラインを復元する。
    #[must_use]
    pub fn from_parts(
        model_id: Uuid,
        trained_at: DateTime<Utc>,
        examples: usize,
        settings: PipelineSettings,
        extractor: FeatureExtractor,
        model: LogisticModel,
    ) -> Self {
        Self {
            model_id,
            trained_at,
            examples,
            settings,
            tokenizer: TokenPipeline::new(),
            extractor,
            model,
        }
    }

    /// テキスト列を分類し、入力順にラベルを返す。推論は決定的。
    #[must_use]
    pub fn predict(&self, texts: &[String]) -> Vec<u8> {
        texts
            .iter()
            .map(|text| label_for(self.spam_probability(text)))
            .collect()
    }

    /// テキスト列を分類し、ラベルと予測クラスの確率を返す。
    ///
    /// 返るラベルは常にクラス確率の argmax と一致する。
    #[must_use]
    pub fn predict_with_confidence(&self, texts: &[String]) -> Vec<Prediction> {
        texts
            .iter()
            .map(|text| {
                let spam_probability = self.spam_probability(text);
                let label = label_for(spam_probability);
                let confidence = if label == SPAM {
                    spam_probability
                } else {
                    1.0 - spam_probability
                };
                Prediction { label, confidence }
            })
            .collect()
    }

    fn spam_probability(&self, text: &str) -> f32 {
        let tokens = self.tokenizer.tokenize(text);
        let features = self.extractor.extract(&tokens);
        self.model.spam_probability(&features)
    }

    #[must_use]
    pub fn model_id(&self) -> Uuid {
        self.model_id
    }

    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    #[must_use]
    pub fn examples(&self) -> usize {
        self.examples
    }

    #[must_use]
    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    #[must_use]
    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    #[must_use]
    pub fn model(&self) -> &LogisticModel {
        &self.model
    }
}

fn label_for(spam_probability: f32) -> u8 {
    if spam_probability >= 0.5 { SPAM } else { HAM }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_corpus() -> (Vec<String>, Vec<u8>) {
        let texts = vec![
            "free money now".to_string(),
            "meeting at noon".to_string(),
            "win cash prize".to_string(),
            "project update attached".to_string(),
        ];
        let labels = vec![SPAM, HAM, SPAM, HAM];
        (texts, labels)
    }

    #[test]
    fn fit_rejects_empty_corpus() {
        let result = TrainedPipeline::fit(PipelineSettings::default(), &[], &[]);
        assert!(matches!(result, Err(TrainError::EmptyTrainingSet)));
    }

    #[test]
    fn fit_rejects_single_class_corpus() {
        let texts = vec!["free money".to_string(), "win prize".to_string()];
        let labels = vec![SPAM, SPAM];
        let result = TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels);
        assert!(matches!(result, Err(TrainError::SingleClass("spam"))));
    }

    #[test]
    fn fit_learns_the_training_corpus() {
        let (texts, labels) = toy_corpus();
        let (pipeline, report) =
            TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");
        assert_eq!(report.examples, 4);
        assert_eq!(report.spam_examples, 2);
        assert_eq!(report.ham_examples, 2);
        assert!(report.train_accuracy >= 0.99);
        assert_eq!(pipeline.predict(&texts), labels);
    }

    #[test]
    fn predicted_label_matches_argmax_confidence() {
        let (texts, labels) = toy_corpus();
        let (pipeline, _) =
            TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");
        let queries = vec![
            "limited time offer, win now".to_string(),
            "see you at the meeting".to_string(),
        ];
        for prediction in pipeline.predict_with_confidence(&queries) {
            assert!(prediction.confidence >= 0.5);
            assert!(prediction.confidence <= 1.0);
        }
        let labels_only = pipeline.predict(&queries);
        let with_confidence = pipeline.predict_with_confidence(&queries);
        for (label, prediction) in labels_only.iter().zip(with_confidence.iter()) {
            assert_eq!(*label, prediction.label);
        }
    }

    #[test]
    fn predict_is_deterministic() {
        let (texts, labels) = toy_corpus();
        let (pipeline, _) =
            TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");
        let queries = vec!["win free cash".to_string(), "agenda for tomorrow".to_string()];
        assert_eq!(pipeline.predict(&queries), pipeline.predict(&queries));
    }
}
