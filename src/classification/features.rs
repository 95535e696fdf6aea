//! トークン列から特徴量ベクトルを抽出する。
use std::collections::{HashMap, HashSet};

use xxhash_rust::xxh3::xxh3_64;

/// 学習済み語彙に基づく特徴量抽出器。
///
/// 特徴量ベクトルは2つの区画からなる:
/// 語彙内トークンのTF-IDF区画と、語彙外トークンを吸収するハッシュバケット区画。
/// ハッシュ区画があるため、未知語だけのメールでもゼロベクトルにはならない。
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    vocab: Vec<String>,
    vocab_index: HashMap<String, usize>,
    idf: Vec<f32>,
    hash_buckets: usize,
}

impl FeatureExtractor {
    /// 保存済みメタデータ（語彙・IDF表・バケット数）から抽出器を復元する。
    #[must_use]
    pub fn from_metadata(vocab: Vec<String>, idf: Vec<f32>, hash_buckets: usize) -> Self {
        let vocab_index = vocab
            .iter()
            .enumerate()
            .map(|(idx, term)| (term.clone(), idx))
            .collect();
        Self {
            vocab,
            vocab_index,
            idf,
            hash_buckets,
        }
    }

    /// コーパスから語彙とIDF表を構築する。
    ///
    /// 文書頻度（DF）の上位 `vocab_size` 件を語彙として採用する。
    /// DFが同値の場合はトークンの辞書順で決定し、構築を決定的にする。
    #[must_use]
    pub fn build_from_corpus(
        tokenized_corpus: &[Vec<String>],
        vocab_size: usize,
        hash_buckets: usize,
    ) -> Self {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();
        let total_docs = tokenized_corpus.len();

        for doc_tokens in tokenized_corpus {
            let unique_tokens: HashSet<&String> = doc_tokens.iter().collect();
            for token in unique_tokens {
                *doc_freq.entry(token.clone()).or_insert(0) += 1;
            }
        }

        let unique_tokens_before_selection = doc_freq.len();

        let mut token_df_pairs: Vec<(String, usize)> = doc_freq.into_iter().collect();
        token_df_pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        token_df_pairs.truncate(vocab_size);

        let vocab: Vec<String> = token_df_pairs
            .iter()
            .map(|(token, _)| token.clone())
            .collect();
        #[allow(clippy::cast_precision_loss)]
        let idf: Vec<f32> = token_df_pairs
            .iter()
            .map(|(_, df)| {
                // IDF(t) = log((N + 1) / (DF(t) + 1)) + 1
                let n = total_docs as f32;
                let df_val = *df as f32;
                ((n + 1.0) / (df_val + 1.0)).ln() + 1.0
            })
            .collect();

        tracing::info!(
            total_docs,
            unique_tokens = unique_tokens_before_selection,
            selected_vocab_size = vocab.len(),
            hash_buckets,
            "vocabulary built from training corpus"
        );

        Self::from_metadata(vocab, idf, hash_buckets)
    }

    /// 語彙サイズを取得する。
    #[must_use]
    pub fn vocab_len(&self) -> usize {
        self.idf.len()
    }

    /// 特徴量ベクトルの全長（TF-IDF区画 + ハッシュ区画）。
    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.vocab.len() + self.hash_buckets
    }

    #[must_use]
    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    #[must_use]
    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    #[must_use]
    pub fn hash_buckets(&self) -> usize {
        self.hash_buckets
    }

    /// トークン列を固定長の特徴量ベクトルに変換する。
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    pub fn extract(&self, tokens: &[String]) -> Vec<f32> {
        let vocab_len = self.idf.len();
        let mut raw_counts = vec![0.0f32; vocab_len];
        let mut total_hits = 0.0f32;
        let mut hashed = vec![0.0f32; self.hash_buckets];

        for token in tokens {
            if let Some(&index) = self.vocab_index.get(token.as_str()) {
                raw_counts[index] += 1.0;
                total_hits += 1.0;
            } else if self.hash_buckets > 0 {
                // 語彙外トークンは決定的なハッシュでバケットへ振り分ける
                let bucket = (xxh3_64(token.as_bytes()) as usize) % self.hash_buckets;
                hashed[bucket] += 1.0;
            }
        }

        let mut features = vec![0.0f32; vocab_len + self.hash_buckets];

        if total_hits > 0.0 {
            for (idx, raw) in raw_counts.iter().enumerate() {
                if *raw == 0.0 {
                    continue;
                }
                let tf = *raw / total_hits;
                features[idx] = tf * self.idf[idx];
            }
        }

        let doc_len = tokens.len() as f32;
        if doc_len > 0.0 {
            for (slot, count) in features[vocab_len..].iter_mut().zip(hashed.iter()) {
                *slot = count / doc_len;
            }
        }

        features
    }
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use super::*;

    fn corpus() -> Vec<Vec<String>> {
        vec![
            vec!["free".into(), "money".into(), "now".into()],
            vec!["meeting".into(), "at".into(), "noon".into()],
            vec!["free".into(), "prize".into()],
        ]
    }

    #[test]
    fn vocabulary_is_ranked_by_document_frequency() {
        let extractor = FeatureExtractor::build_from_corpus(&corpus(), 2, 8);
        // "free" appears in two documents, everything else in one
        assert_eq!(extractor.vocab()[0], "free");
        assert_eq!(extractor.vocab_len(), 2);
        assert_eq!(extractor.feature_dim(), 10);
    }

    #[test]
    fn extraction_is_deterministic() {
        let extractor = FeatureExtractor::build_from_corpus(&corpus(), 4, 8);
        let tokens = vec!["free".to_string(), "unknown_word".to_string()];
        assert_eq!(extractor.extract(&tokens), extractor.extract(&tokens));
    }

    #[test]
    fn unknown_tokens_land_in_hash_buckets() {
        let extractor = FeatureExtractor::from_metadata(vec!["free".into()], vec![1.0], 8);
        let features = extractor.extract(&[String::from("zzzz_not_in_vocab")]);
        assert_eq!(features[0], 0.0);
        let hashed_mass: f32 = features[1..].iter().sum();
        assert!(hashed_mass > 0.0);
    }

    #[test]
    fn empty_token_list_yields_zero_vector() {
        let extractor = FeatureExtractor::from_metadata(vec!["free".into()], vec![1.0], 4);
        let features = extractor.extract(&[]);
        assert!(features.iter().all(|value| *value == 0.0));
    }
}
