//! A column-oriented per-file frame of accepted log lines.
//!
//! One column per captured header field plus, after the preprocessing steps
//! ran, the token sequence per line. Row ordinals are implicit: row `i`
//! carries `LineId == i + 1`.

use indexmap::IndexMap;

use crate::format::CONTENT_FIELD;
use crate::masking::MaskSet;
use crate::tokenize::Tokenizer;

#[derive(Debug, Clone)]
pub struct LogFrame {
    columns: IndexMap<String, Vec<String>>,
    tokens: Vec<Vec<String>>,
}

impl LogFrame {
    pub fn new(headers: &[String]) -> Self {
        let columns = headers
            .iter()
            .map(|header| (header.clone(), Vec::new()))
            .collect();
        Self {
            columns,
            tokens: Vec::new(),
        }
    }

    /// Append one accepted line, `fields` aligned with the header order.
    pub fn push_row(&mut self, fields: Vec<&str>) {
        debug_assert_eq!(fields.len(), self.columns.len());
        for (column, field) in self.columns.values_mut().zip(fields) {
            column.push(field.to_owned());
        }
    }

    pub fn len(&self) -> usize {
        self.columns
            .first()
            .map(|(_, column)| column.len())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn headers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, header: &str) -> Option<&[String]> {
        self.columns.get(header).map(Vec::as_slice)
    }

    /// The `Content` column. Masked in place once [`Self::mask`] ran.
    pub fn content(&self) -> &[String] {
        self.column(CONTENT_FIELD)
            .expect("LogFrame is built from a format that captures <Content>")
    }

    /// Token sequences per line, empty until [`Self::tokenize`] ran.
    pub fn tokens(&self) -> &[Vec<String>] {
        &self.tokens
    }

    /// Rewrite the `Content` column through the masking rules.
    pub fn mask(&mut self, masks: &MaskSet) {
        if masks.is_empty() {
            return;
        }
        let content = self
            .columns
            .get_mut(CONTENT_FIELD)
            .expect("LogFrame is built from a format that captures <Content>");
        for line in content.iter_mut() {
            let masked = masks.apply(line);
            if *line != masked {
                *line = masked;
            }
        }
    }

    /// Split the (masked) `Content` column into per-line token sequences.
    pub fn tokenize(&mut self, tokenizer: &Tokenizer) {
        self.tokens = self
            .content()
            .iter()
            .map(|line| tokenizer.tokenize(line))
            .collect();
    }

    /// Hand the header columns over to output materialization.
    pub fn into_columns(self) -> IndexMap<String, Vec<String>> {
        self.columns
    }
}
