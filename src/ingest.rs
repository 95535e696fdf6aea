//! 学習・バッチ分類に使うCSVテーブルの取り込みと検証。
//!
//! 検証はパイプラインやモデルストアに触れる前に行い、
//! 不正な行は1始まりのデータ行番号つきで報告する。
use std::io::Cursor;

use csv::ReaderBuilder;
use thiserror::Error;

use crate::classification::{HAM, SPAM};

/// 入力テーブルの検証エラー。
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to parse csv: {0}")]
    Malformed(#[from] csv::Error),
    #[error("missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("row {row}: label must be 0 or 1, got '{value}'")]
    BadLabel { row: usize, value: String },
    #[error("row {row}: text must not be empty")]
    BlankText { row: usize },
    #[error("table has no data rows")]
    Empty,
}

/// `text` / `label` 列を持つ学習テーブル。
#[derive(Debug)]
pub struct TrainingTable {
    texts: Vec<String>,
    labels: Vec<u8>,
}

impl TrainingTable {
    /// CSVバイト列から学習テーブルを読み込み、検証する。
    ///
    /// # Errors
    /// 必須列の欠落、空のテキスト、0/1以外のラベル、行の形式不正は
    /// [`TableError`] として報告する。
    pub fn parse(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(Cursor::new(bytes));

        let headers = reader.headers()?.clone();
        let text_index = headers
            .iter()
            .position(|name| name == "text")
            .ok_or(TableError::MissingColumn("text"))?;
        let label_index = headers
            .iter()
            .position(|name| name == "label")
            .ok_or(TableError::MissingColumn("label"))?;

        let mut texts = Vec::new();
        let mut labels = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let row = idx + 1;
            let record = record?;
            let text = record.get(text_index).unwrap_or_default();
            if text.trim().is_empty() {
                return Err(TableError::BlankText { row });
            }
            let raw_label = record.get(label_index).unwrap_or_default();
            let label = match raw_label.trim() {
                "0" => HAM,
                "1" => SPAM,
                other => {
                    return Err(TableError::BadLabel {
                        row,
                        value: other.to_string(),
                    });
                }
            };
            texts.push(text.to_string());
            labels.push(label);
        }

        if texts.is_empty() {
            return Err(TableError::Empty);
        }

        Ok(Self { texts, labels })
    }

    #[must_use]
    pub fn texts(&self) -> &[String] {
        &self.texts
    }

    #[must_use]
    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// テキスト列とラベル列を取り出す（学習タスクへ所有権ごと渡す用）。
    #[must_use]
    pub fn into_parts(self) -> (Vec<String>, Vec<u8>) {
        (self.texts, self.labels)
    }
}

/// 少なくとも `text` 列を持つバッチ分類テーブル。
///
/// `text` 以外の列は一切解釈せず、行順のまま出力に引き継ぐ。
#[derive(Debug)]
pub struct BatchTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
    text_index: usize,
}

impl BatchTable {
    /// CSVバイト列からバッチテーブルを読み込む。
    ///
    /// # Errors
    /// `text` 列の欠落、空のテキスト、行の形式不正は [`TableError`] として報告する。
    pub fn parse(bytes: &[u8]) -> Result<Self, TableError> {
        let mut reader = ReaderBuilder::new().trim(csv::Trim::All).from_reader(Cursor::new(bytes));

        let headers: Vec<String> = reader.headers()?.iter().map(ToString::to_string).collect();
        let text_index = headers
            .iter()
            .position(|name| name == "text")
            .ok_or(TableError::MissingColumn("text"))?;

        let mut rows = Vec::new();
        for (idx, record) in reader.records().enumerate() {
            let row = idx + 1;
            let record = record?;
            let fields: Vec<String> = record.iter().map(ToString::to_string).collect();
            if fields
                .get(text_index)
                .is_none_or(|text| text.trim().is_empty())
            {
                return Err(TableError::BlankText { row });
            }
            rows.push(fields);
        }

        if rows.is_empty() {
            return Err(TableError::Empty);
        }

        Ok(Self {
            headers,
            rows,
            text_index,
        })
    }

    /// `text` 列を行順のまま取り出す。
    #[must_use]
    pub fn texts(&self) -> Vec<String> {
        self.rows
            .iter()
            .map(|fields| fields[self.text_index].clone())
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 入力テーブルに `prediction` 列を追記したCSVを書き出す。
    ///
    /// 元の列と行順はそのまま保たれる。`predictions` は行数と同じ長さであること。
    ///
    /// # Errors
    /// CSVの書き出しに失敗した場合はエラーを返す。
    pub fn to_csv_with_predictions(&self, predictions: &[u8]) -> Result<Vec<u8>, TableError> {
        debug_assert_eq!(self.rows.len(), predictions.len());
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header_row = self.headers.clone();
        header_row.push("prediction".to_string());
        writer.write_record(&header_row)?;

        for (fields, prediction) in self.rows.iter().zip(predictions.iter()) {
            let mut record = fields.clone();
            record.push(prediction.to_string());
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|error| TableError::Malformed(csv::Error::from(error.into_error())))?;
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn training_table_parses_well_formed_csv() {
        let csv = b"text,label\nfree money now,1\nmeeting at noon,0\n";
        let table = TrainingTable::parse(csv).expect("parse");
        assert_eq!(table.len(), 2);
        assert_eq!(table.labels(), &[SPAM, HAM]);
        assert_eq!(table.texts()[1], "meeting at noon");
    }

    #[rstest]
    #[case(b"body,label\nhello,1\n".as_slice(), "text")]
    #[case(b"text,category\nhello\n".as_slice(), "label")]
    fn training_table_reports_missing_columns(#[case] csv: &[u8], #[case] column: &str) {
        match TrainingTable::parse(csv) {
            Err(TableError::MissingColumn(name)) => assert_eq!(name, column),
            other => panic!("expected missing column error, got {other:?}"),
        }
    }

    #[test]
    fn training_table_reports_bad_label_with_row_number() {
        let csv = b"text,label\nfree money,1\nmeeting,2\n";
        match TrainingTable::parse(csv) {
            Err(TableError::BadLabel { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "2");
            }
            other => panic!("expected bad label error, got {other:?}"),
        }
    }

    #[test]
    fn training_table_rejects_blank_text() {
        let csv = b"text,label\n   ,1\n";
        assert!(matches!(
            TrainingTable::parse(csv),
            Err(TableError::BlankText { row: 1 })
        ));
    }

    #[test]
    fn training_table_rejects_header_only_input() {
        assert!(matches!(
            TrainingTable::parse(b"text,label\n"),
            Err(TableError::Empty)
        ));
    }

    #[test]
    fn batch_table_preserves_extra_columns_and_order() {
        let csv = b"id,text,sender\n1,free money,a@example.com\n2,see you at noon,b@example.com\n";
        let table = BatchTable::parse(csv).expect("parse");
        assert_eq!(table.len(), 2);
        assert_eq!(table.texts(), vec!["free money", "see you at noon"]);

        let output = table.to_csv_with_predictions(&[1, 0]).expect("write");
        let rendered = String::from_utf8(output).expect("utf8");
        let mut lines = rendered.lines();
        assert_eq!(lines.next(), Some("id,text,sender,prediction"));
        assert_eq!(lines.next(), Some("1,free money,a@example.com,1"));
        assert_eq!(lines.next(), Some("2,see you at noon,b@example.com,0"));
    }
}
