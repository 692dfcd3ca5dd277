//! Turns a mined file into its two output relations.
//!
//! The structured relation annotates every accepted line with the final
//! template of its cluster; the templates relation enumerates distinct
//! templates with occurrence counts, descending.

use indexmap::IndexMap;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;

use log_lines::{LogFrame, WILDCARD};

use crate::table::{Column, Table};

pub const LINE_ID: &str = "LineId";
pub const EVENT_TEMPLATE: &str = "EventTemplate";
pub const PARAMETER_LIST: &str = "ParameterList";
pub const OCCURRENCES: &str = "Occurrences";

lazy_static! {
    static ref SENTINEL: Regex = Regex::new("<.{1,5}>").expect("SENTINEL regex is valid");
    static ref NON_ALNUM: Regex = Regex::new("([^A-Za-z0-9])").expect("NON_ALNUM regex is valid");
    static ref ESCAPED_SPACES: Regex =
        Regex::new(r"(\\ )+").expect("ESCAPED_SPACES regex is valid");
}

/// Build the structured and templates relations from the line frame and the
/// per-line template strings the miner assigned.
pub fn materialize(frame: LogFrame, templates: Vec<String>, keep_params: bool) -> (Table, Table) {
    debug_assert_eq!(frame.len(), templates.len());

    let parameters = keep_params.then(|| {
        frame
            .content()
            .iter()
            .zip(templates.iter())
            .map(|(content, template)| extract_parameters(template, content))
            .collect::<Vec<_>>()
    });

    let mut structured = Table::new();
    structured.push_column(
        LINE_ID,
        Column::Int((1..=frame.len() as u64).collect()),
    );
    for (header, values) in frame.into_columns() {
        structured.push_column(header, Column::Str(values));
    }
    structured.push_column(EVENT_TEMPLATE, Column::Str(templates.clone()));
    if let Some(parameters) = parameters {
        structured.push_column(PARAMETER_LIST, Column::StrList(parameters));
    }

    (structured, occurrence_table(templates))
}

fn occurrence_table(templates: Vec<String>) -> Table {
    let mut counts: IndexMap<String, u64> = IndexMap::new();
    for template in templates {
        *counts.entry(template).or_insert(0) += 1;
    }
    let mut pairs: Vec<(String, u64)> = counts.into_iter().collect();
    // stable, so ties keep first-seen order
    pairs.sort_by(|a, b| b.1.cmp(&a.1));

    let (templates, occurrences): (Vec<String>, Vec<u64>) = pairs.into_iter().unzip();
    let mut table = Table::new();
    table.push_column(EVENT_TEMPLATE, Column::Str(templates));
    table.push_column(OCCURRENCES, Column::Int(occurrences));
    table
}

/// Recover the values the wildcards swallowed by matching the template back
/// against the content. Non-greedy per wildcard, so the split between two
/// adjacent wildcards is a specified approximation.
fn extract_parameters(template: &str, content: &str) -> Vec<String> {
    let Some(pattern) = template_pattern(template) else {
        return Vec::new();
    };
    pattern
        .captures(content)
        .map(|captures| {
            captures
                .iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_owned()).unwrap_or_default())
                .collect()
        })
        .unwrap_or_default()
}

fn template_pattern(template: &str) -> Option<Regex> {
    // any short <..> sentinel counts as a parameter position
    let collapsed = SENTINEL.replace_all(template, WILDCARD);
    if !collapsed.contains(WILDCARD) {
        return None;
    }
    let escaped = NON_ALNUM.replace_all(&collapsed, r"\$1");
    let spaced = ESCAPED_SPACES.replace_all(&escaped, r"\s+");
    let pattern = format!("^{}$", spaced.replace(r"\<\*\>", "(.*?)"));
    match Regex::new(&pattern) {
        Ok(pattern) => Some(pattern),
        Err(e) => {
            warn!("Template {template:?} does not yield a parameter pattern: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use log_lines::{LogFormat, Tokenizer};

    fn frame_of(lines: &[&str]) -> LogFrame {
        let format = LogFormat::compile("<Content>").unwrap();
        let mut frame = LogFrame::new(format.headers());
        for &line in lines {
            frame.push_row(vec![line]);
        }
        frame.tokenize(&Tokenizer::default());
        frame
    }

    #[test]
    fn extracts_parameters() {
        assert_eq!(
            extract_parameters("user <*> from <*>", "user alice from 10.0.0.1"),
            vec!["alice".to_owned(), "10.0.0.1".to_owned()]
        );
    }

    #[test]
    fn sentinels_count_as_parameters() {
        assert_eq!(
            extract_parameters("took <§NUM§> ms", "took 42 ms"),
            vec!["42".to_owned()]
        );
    }

    #[test]
    fn no_wildcard_no_parameters() {
        assert!(extract_parameters("shutting down", "shutting down").is_empty());
    }

    #[test]
    fn mismatching_content_yields_empty() {
        assert!(extract_parameters("user <*> out", "entirely different").is_empty());
    }

    #[test]
    fn occurrences_sorted_descending() {
        let frame = frame_of(&["a 1", "a 2", "b 9", "a 3"]);
        let templates = vec![
            "a <*>".to_owned(),
            "a <*>".to_owned(),
            "b <*>".to_owned(),
            "a <*>".to_owned(),
        ];
        let (structured, template_table) = materialize(frame, templates, false);

        assert_eq!(structured.len(), 4);
        assert_eq!(
            structured.column(LINE_ID),
            Some(&Column::Int(vec![1, 2, 3, 4]))
        );
        assert_eq!(
            template_table.column(EVENT_TEMPLATE),
            Some(&Column::Str(vec!["a <*>".to_owned(), "b <*>".to_owned()]))
        );
        assert_eq!(
            template_table.column(OCCURRENCES),
            Some(&Column::Int(vec![3, 1]))
        );
    }

    #[test]
    fn occurrence_sum_matches_row_count() {
        let frame = frame_of(&["x", "y", "x"]);
        let templates = vec!["x".to_owned(), "y".to_owned(), "x".to_owned()];
        let (structured, template_table) = materialize(frame, templates, false);
        let Some(Column::Int(occurrences)) = template_table.column(OCCURRENCES) else {
            panic!("occurrences column missing");
        };
        assert_eq!(occurrences.iter().sum::<u64>(), structured.len() as u64);
    }

    #[test]
    fn parameter_list_column_present_when_requested() {
        let frame = frame_of(&["user alice from 10.0.0.1"]);
        let templates = vec!["user <*> from <*>".to_owned()];
        let (structured, _) = materialize(frame, templates, true);
        assert_eq!(
            structured.column(PARAMETER_LIST),
            Some(&Column::StrList(vec![vec![
                "alice".to_owned(),
                "10.0.0.1".to_owned()
            ]]))
        );
    }
}
