//! メール本文のトークナイズと正規化処理。
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

fn normalize_text(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// メール本文をトークン列に落とすパイプライン。
///
/// 英語メールを主対象とし、単語境界ベースのトークナイザで処理する。
/// 英語トークナイザが1トークンも返さない場合（非ラテン文字のみの本文など）は
/// 正規表現ベースのフォールバックに切り替える。
#[derive(Debug)]
pub struct TokenPipeline {
    fallback: FallbackTokenizer,
}

impl TokenPipeline {
    #[must_use]
    pub fn new() -> Self {
        Self {
            fallback: FallbackTokenizer::new(),
        }
    }

    #[must_use]
    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let tokens = english_tokenize(text);
        if tokens.is_empty() {
            return self.fallback.tokenize(text);
        }
        tokens
    }
}

impl Default for TokenPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn english_tokenize(text: &str) -> Vec<String> {
    normalize_text(text)
        .split_word_bounds()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(normalize_english_token)
        .collect()
}

#[derive(Debug)]
struct FallbackTokenizer {
    split_re: Regex,
}

impl FallbackTokenizer {
    fn new() -> Self {
        Self {
            split_re: Regex::new(r"[^\p{L}\p{N}]+").expect("compile fallback pattern"),
        }
    }

    fn tokenize(&self, text: &str) -> Vec<String> {
        normalize_text(text)
            .split(|c: char| c.is_whitespace())
            .flat_map(|piece| self.split_re.split(piece))
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

fn normalize_english_token(token: &str) -> String {
    let lower = token.to_lowercase();
    if lower.ends_with("ies") && lower.len() > 3 {
        let stem = lower.trim_end_matches("ies");
        return format!("{stem}y");
    }
    if lower.ends_with("ing") && lower.len() > 4 {
        return lower.trim_end_matches("ing").to_string();
    }
    if lower.ends_with('s') && lower.len() > 3 {
        return lower.trim_end_matches('s').to_string();
    }
    lower
}
