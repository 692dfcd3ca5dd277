//! Whitespace tokenization with extra delimiter literals injected as split
//! boundaries.

/// Splits masked content into tokens.
///
/// Every configured delimiter `d` is rewritten to `d + " "` first, which
/// forces a split right after the delimiter while keeping it attached to the
/// preceding text.
#[derive(Debug, Clone, Default)]
pub struct Tokenizer {
    delimiters: Vec<String>,
}

impl Tokenizer {
    pub fn new(delimiters: Vec<String>) -> Self {
        Self { delimiters }
    }

    pub fn tokenize(&self, content: &str) -> Vec<String> {
        if self.delimiters.is_empty() {
            return content.split_whitespace().map(ToOwned::to_owned).collect();
        }
        let mut rewritten = content.to_owned();
        for delimiter in &self.delimiters {
            let mut spaced = String::with_capacity(delimiter.len() + 1);
            spaced.push_str(delimiter);
            spaced.push(' ');
            rewritten = rewritten.replace(delimiter.as_str(), &spaced);
        }
        rewritten.split_whitespace().map(ToOwned::to_owned).collect()
    }
}
