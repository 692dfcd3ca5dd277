//! Brain
//!
//! Batch mining over length groups. Tokens are annotated with their column
//! frequency; the most plausible constant part of every line (the root
//! tuple) groups lines, then columns more frequent than the root split
//! upward and rarer columns split downward into wildcards.
//!
//! Tokens are interned to integer ids per length group so the frequency
//! matrix stays compact on large files.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use itertools::Itertools;

use log_lines::WILDCARD;

use crate::config::BrainConfig;
use crate::errors::*;

use super::Ticker;

struct Interner {
    ids: HashMap<String, u32>,
    tokens: Vec<String>,
}

impl Interner {
    fn new() -> Self {
        Self {
            ids: HashMap::new(),
            tokens: Vec::new(),
        }
    }

    fn intern(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.ids.get(token) {
            return id;
        }
        let id = self.tokens.len() as u32;
        self.ids.insert(token.to_owned(), id);
        self.tokens.push(token.to_owned());
        id
    }

    fn resolve(&self, id: u32) -> &str {
        &self.tokens[id as usize]
    }
}

struct ColumnStat {
    distinct: usize,
    max_freq: usize,
}

pub(crate) struct Brain {
    var_thr: usize,
}

impl Brain {
    pub(crate) fn new(config: &BrainConfig) -> Result<Self> {
        Ok(Self {
            var_thr: config.var_thr,
        })
    }

    pub(crate) fn assign(&self, rows: &[Vec<String>], ticker: &mut Ticker) -> Result<Vec<String>> {
        let mut length_groups: IndexMap<usize, Vec<usize>> = IndexMap::new();
        for (row, tokens) in rows.iter().enumerate() {
            ticker.poll()?;
            length_groups.entry(tokens.len()).or_default().push(row);
        }
        ticker.phase(30)?;

        let mut templates = vec![String::new(); rows.len()];
        for (&length, members) in &length_groups {
            ticker.poll()?;
            if length == 0 {
                // empty lines keep the empty template
                continue;
            }
            self.mine_group(rows, length, members, &mut templates);
        }
        ticker.phase(90)?;
        Ok(templates)
    }

    fn mine_group(
        &self,
        rows: &[Vec<String>],
        length: usize,
        members: &[usize],
        templates: &mut [String],
    ) {
        let mut interner = Interner::new();
        let encoded: Vec<Vec<u32>> = members
            .iter()
            .map(|&row| rows[row].iter().map(|token| interner.intern(token)).collect())
            .collect();

        // column frequencies across the whole length group
        let mut freqs: Vec<HashMap<u32, usize>> = vec![HashMap::new(); length];
        for line in &encoded {
            for (column, &token) in line.iter().enumerate() {
                *freqs[column].entry(token).or_insert(0) += 1;
            }
        }

        // root tuple per line: sort the line's (freq, count) pairs by count
        // descending (frequency breaks ties), take the first entry whose
        // frequency still reaches half of the line's top frequency
        let mut root_groups: IndexMap<(usize, usize), Vec<usize>> = IndexMap::new();
        for (idx, line) in encoded.iter().enumerate() {
            let line_freqs: Vec<usize> = line
                .iter()
                .enumerate()
                .map(|(column, token)| freqs[column][token])
                .collect();
            let max_freq = *line_freqs
                .iter()
                .max()
                .expect("length groups hold non-empty lines");
            let mut entries: Vec<(usize, usize)> =
                line_freqs.iter().copied().counts().into_iter().collect();
            entries.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.cmp(&a.0)));
            let root = entries
                .into_iter()
                .find(|(freq, _)| freq * 2 >= max_freq)
                .expect("the top frequency always qualifies");
            root_groups.entry(root).or_default().push(idx);
        }

        for ((root_freq, _), group) in root_groups {
            let stats: Vec<ColumnStat> = (0..length)
                .map(|column| {
                    let mut distinct = HashSet::new();
                    let mut max_freq = 0;
                    for &idx in &group {
                        let token = encoded[idx][column];
                        distinct.insert(token);
                        max_freq = max_freq.max(freqs[column][&token]);
                    }
                    ColumnStat {
                        distinct: distinct.len(),
                        max_freq,
                    }
                })
                .collect();

            let mut wild: HashSet<usize> = HashSet::new();

            // up split: parent columns that still disagree are variable
            for (column, stat) in stats.iter().enumerate() {
                if stat.max_freq > root_freq && stat.distinct > 1 {
                    wild.insert(column);
                }
            }

            // down split: child columns, least diverse first
            let mut children: Vec<(usize, usize)> = stats
                .iter()
                .enumerate()
                .filter(|(_, stat)| stat.max_freq < root_freq)
                .map(|(column, stat)| (stat.distinct, column))
                .collect();
            children.sort_unstable();
            for (distinct, column) in children {
                if distinct >= self.var_thr {
                    wild.insert(column);
                }
            }

            for &idx in &group {
                let template = encoded[idx]
                    .iter()
                    .enumerate()
                    .map(|(column, &token)| {
                        if wild.contains(&column) {
                            WILDCARD
                        } else {
                            interner.resolve(token)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                templates[members[idx]] = template;
            }
        }
    }
}
