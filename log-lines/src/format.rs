//! Compile a log format spec such as `<Date> <Time> <Level>: <Content>` into
//! an anchored capturing pattern and split raw lines into named header fields.
//!
//! Literal segments of the spec may embed regex fragments (i.e. `\[<PID>\]`),
//! so they are passed through verbatim apart from collapsing runs of spaces
//! to `\s+`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::errors::*;

/// Name of the payload field every format must capture.
pub const CONTENT_FIELD: &str = "Content";

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new("<[^<>]+>").expect("PLACEHOLDER regex is valid");
    static ref SPACE_RUN: Regex = Regex::new(" +").expect("SPACE_RUN regex is valid");
}

/// A compiled log format: the ordered header names and the anchored pattern
/// that captures one field per header.
#[derive(Debug, Clone)]
pub struct LogFormat {
    spec: String,
    headers: Vec<String>,
    pattern: Regex,
}

impl LogFormat {
    /// Compile a `<Name>` placeholder spec into a capturing pattern.
    ///
    /// Fails with [`Error::BadFormatSpec`] when the spec yields an invalid
    /// regex, repeats a header name, or misses the `<Content>` field.
    pub fn compile(spec: &str) -> Result<Self> {
        let bad = |reason: String| Error::BadFormatSpec {
            spec: spec.to_owned(),
            reason,
        };

        let mut headers = Vec::new();
        let mut pattern = String::with_capacity(spec.len() + 16);
        pattern.push('^');

        let mut cursor = 0_usize;
        for placeholder in PLACEHOLDER.find_iter(spec) {
            let literal = &spec[cursor..placeholder.start()];
            pattern.push_str(&SPACE_RUN.replace_all(literal, r"\s+"));

            let header = placeholder
                .as_str()
                .trim_start_matches('<')
                .trim_end_matches('>');
            if headers.iter().any(|known| known == header) {
                return Err(bad(format!("duplicate field <{header}>")));
            }
            pattern.push_str(&format!("(?P<{header}>.*?)"));
            headers.push(header.to_owned());
            cursor = placeholder.end();
        }
        pattern.push_str(&SPACE_RUN.replace_all(&spec[cursor..], r"\s+"));
        pattern.push('$');

        if !headers.iter().any(|header| header == CONTENT_FIELD) {
            return Err(bad(format!("missing the <{CONTENT_FIELD}> field")));
        }

        let pattern = Regex::new(&pattern).map_err(|e| bad(e.to_string()))?;
        Ok(Self {
            spec: spec.to_owned(),
            headers,
            pattern,
        })
    }

    /// The original format spec.
    pub fn spec(&self) -> &str {
        &self.spec
    }

    /// Header names in capture order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Split a line into its header fields, aligned with [`Self::headers`].
    ///
    /// `None` when the line does not match the format.
    pub fn capture<'l>(&self, line: &'l str) -> Option<Vec<&'l str>> {
        let captures = self.pattern.captures(line)?;
        Some(
            self.headers
                .iter()
                .map(|header| {
                    captures
                        .name(header)
                        .map(|m| m.as_str())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn compiles_simple_format() {
        let format = LogFormat::compile("<Date> <Time> <Level>: <Content>").unwrap();
        assert_eq!(format.headers(), &["Date", "Time", "Level", "Content"]);

        let fields = format
            .capture("081109 203615 INFO: Received block blk_35871")
            .unwrap();
        assert_eq!(
            fields,
            vec!["081109", "203615", "INFO", "Received block blk_35871"]
        );
    }

    #[test]
    fn collapses_space_runs() {
        let format = LogFormat::compile("<Level>    <Content>").unwrap();
        // A single spec space must still match multiple input spaces.
        let fields = format.capture("WARN  disk almost full").unwrap();
        assert_eq!(fields, vec!["WARN", "disk almost full"]);
    }

    #[test]
    fn literal_regex_fragments_survive() {
        let format = LogFormat::compile(r"<Component>\[<PID>\]: <Content>").unwrap();
        let fields = format.capture("sshd[4902]: session opened").unwrap();
        assert_eq!(fields, vec!["sshd", "4902", "session opened"]);
    }

    #[test]
    fn optional_groups_may_be_absent() {
        let format = LogFormat::compile(r"<Component>(\[<PID>\])?: <Content>").unwrap();
        let fields = format.capture("kernel: panic imminent").unwrap();
        assert_eq!(fields, vec!["kernel", "", "panic imminent"]);
    }

    #[test]
    fn rejects_format_without_content() {
        assert_matches!(
            LogFormat::compile("<Date> <Time>"),
            Err(Error::BadFormatSpec { .. })
        );
    }

    #[test]
    fn rejects_duplicate_fields() {
        assert_matches!(
            LogFormat::compile("<Content> <Content>"),
            Err(Error::BadFormatSpec { .. })
        );
    }

    #[test]
    fn no_match_yields_none() {
        let format = LogFormat::compile("<Level>: <Content>").unwrap();
        assert_eq!(format.capture("no separator here"), None);
    }
}
