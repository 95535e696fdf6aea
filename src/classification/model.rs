//! ロジスティック回帰による線形スパム分類モデル。
//!
//! 学習はフルバッチ勾配降下法で行う。乱数を一切使わないため、
//! 同じ訓練データと同じハイパーパラメータからは常に同じモデルが得られる。

fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

/// 学習時のハイパーパラメータ。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    pub l2_penalty: f32,
}

/// 重みベクトルとバイアスを持つ二値分類モデル。
#[derive(Debug, Clone)]
pub struct LogisticModel {
    weights: Vec<f32>,
    bias: f32,
}

impl LogisticModel {
    /// 保存済みの重みからモデルを復元する。
    #[must_use]
    pub fn from_parts(weights: Vec<f32>, bias: f32) -> Self {
        Self { weights, bias }
    }

    /// 特徴量ベクトルとラベル列からモデルを学習する。
    ///
    /// 呼び出し側は `features` の各行が同じ次元であること、
    /// `labels` が 0/1 のみを含むことを保証する。
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn train(features: &[Vec<f32>], labels: &[u8], options: TrainOptions) -> Self {
        debug_assert_eq!(features.len(), labels.len());
        let dim = features.first().map_or(0, Vec::len);
        let n = features.len() as f32;

        let mut weights = vec![0.0f32; dim];
        let mut bias = 0.0f32;

        for _ in 0..options.epochs {
            let mut grad_w = vec![0.0f32; dim];
            let mut grad_b = 0.0f32;

            for (row, label) in features.iter().zip(labels.iter()) {
                let mut z = bias;
                for (value, weight) in row.iter().zip(weights.iter()) {
                    z += value * weight;
                }
                let error = sigmoid(z) - f32::from(*label);
                grad_b += error;
                for (slot, value) in grad_w.iter_mut().zip(row.iter()) {
                    *slot += error * value;
                }
            }

            for (weight, grad) in weights.iter_mut().zip(grad_w.iter()) {
                *weight -= options.learning_rate * (grad / n + options.l2_penalty * *weight);
            }
            bias -= options.learning_rate * (grad_b / n);
        }

        Self { weights, bias }
    }

    /// 特徴量ベクトルに対するスパム確率を返す。
    #[must_use]
    pub fn spam_probability(&self, features: &[f32]) -> f32 {
        debug_assert_eq!(features.len(), self.weights.len());
        let mut z = self.bias;
        for (value, weight) in features.iter().zip(self.weights.iter()) {
            z += value * weight;
        }
        sigmoid(z)
    }

    #[must_use]
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    #[must_use]
    pub fn bias(&self) -> f32 {
        self.bias
    }

    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.weights.len()
    }
}
