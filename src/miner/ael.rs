//! AEL
//!
//! Batch mining in two passes: bin every line by token count and masked
//! parameter count, group identical token sequences into initial clusters,
//! then reconcile crowded bins with a single similarity merge pass.

use indexmap::IndexMap;

use log_lines::is_sentinel;

use crate::config::AelConfig;
use crate::errors::*;

use super::Ticker;

#[derive(Debug)]
struct LogCluster {
    template: Vec<String>,
    rows: Vec<usize>,
}

pub(crate) struct Ael {
    log_cluster_thr: usize,
    merge_thr: f64,
}

impl Ael {
    pub(crate) fn new(config: &AelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            log_cluster_thr: config.log_cluster_thr,
            merge_thr: config.merge_thr,
        })
    }

    pub(crate) fn assign(&self, rows: &[Vec<String>], ticker: &mut Ticker) -> Result<Vec<String>> {
        // bin by (token count, parameter count), then by exact sequence
        let mut bins: IndexMap<(usize, usize), IndexMap<Vec<String>, Vec<usize>>> = IndexMap::new();
        for (row, tokens) in rows.iter().enumerate() {
            ticker.poll()?;
            let parameters = tokens.iter().filter(|token| is_sentinel(token)).count();
            bins.entry((tokens.len(), parameters))
                .or_default()
                .entry(tokens.clone())
                .or_default()
                .push(row);
        }
        ticker.phase(40)?;

        let mut templates = vec![String::new(); rows.len()];
        for ((token_count, _), groups) in bins {
            ticker.poll()?;
            let mut clusters: Vec<LogCluster> = groups
                .into_iter()
                .map(|(template, rows)| LogCluster { template, rows })
                .collect();
            if clusters.len() > self.log_cluster_thr {
                clusters = self.merge_bin(clusters, token_count);
            }
            for cluster in clusters {
                let template = cluster.template.join(" ");
                for row in cluster.rows {
                    templates[row] = template.clone();
                }
            }
        }
        ticker.phase(90)?;
        Ok(templates)
    }

    /// One pass: every yet-unmerged cluster collects all remaining clusters
    /// within `merge_thr` positional disagreement of it, then the group is
    /// folded left to right.
    fn merge_bin(&self, clusters: Vec<LogCluster>, token_count: usize) -> Vec<LogCluster> {
        let mut taken = vec![false; clusters.len()];
        let mut merged = Vec::with_capacity(clusters.len());
        for lead in 0..clusters.len() {
            if taken[lead] {
                continue;
            }
            taken[lead] = true;
            let mut group = vec![lead];
            for other in lead + 1..clusters.len() {
                if taken[other] {
                    continue;
                }
                let distance = hamming(&clusters[lead].template, &clusters[other].template);
                let ratio = distance as f64 / token_count.max(1) as f64;
                if distance > 0 && ratio <= self.merge_thr {
                    taken[other] = true;
                    group.push(other);
                }
            }
            merged.push(fold(&clusters, group));
        }
        merged
    }
}

fn hamming(a: &[String], b: &[String]) -> usize {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b).filter(|(x, y)| x != y).count()
}

fn fold(clusters: &[LogCluster], group: Vec<usize>) -> LogCluster {
    let mut group = group.into_iter();
    let lead = group.next().expect("merge groups hold their lead");
    let mut template = clusters[lead].template.clone();
    let mut rows = clusters[lead].rows.clone();
    for other in group {
        template = merge_templates(&template, &clusters[other].template);
        rows.extend_from_slice(&clusters[other].rows);
    }
    rows.sort_unstable();
    LogCluster { template, rows }
}

fn merge_templates(a: &[String], b: &[String]) -> Vec<String> {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            if x == y {
                x.clone()
            } else {
                log_lines::WILDCARD.to_owned()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::miner::{ParseJob, Ticker};
    use std::path::Path;

    fn toks(line: &str) -> Vec<String> {
        line.split_whitespace().map(ToOwned::to_owned).collect()
    }

    fn run(config: AelConfig, lines: &[&str]) -> Vec<String> {
        let rows: Vec<Vec<String>> = lines.iter().map(|line| toks(line)).collect();
        let job = ParseJob {
            file: Path::new("unused.log"),
            structured_name: "s",
            templates_name: "t",
            keep_params: false,
            should_stop: &|| false,
            progress: None,
        };
        let mut ticker = Ticker::new(&job, rows.len());
        Ael::new(&config).unwrap().assign(&rows, &mut ticker).unwrap()
    }

    #[test]
    fn identical_masked_lines_share_one_cluster() {
        let templates = run(
            AelConfig {
                log_cluster_thr: 2,
                merge_thr: 1.0,
            },
            &["x <§NUM§> y", "x <§NUM§> y", "x <§NUM§> y", "x <§NUM§> y"],
        );
        assert!(templates.iter().all(|t| t == "x <§NUM§> y"));
    }

    #[test]
    fn crowded_bin_merges_similar_clusters() {
        let templates = run(
            AelConfig {
                log_cluster_thr: 2,
                merge_thr: 0.4,
            },
            &["a p z", "a q z", "b r z"],
        );
        // p and q disagree in one of three positions, within 0.4
        assert_eq!(templates[0], "a <*> z");
        assert_eq!(templates[1], "a <*> z");
        // b r z is two of three positions away from the lead, left out
        assert_eq!(templates[2], "b r z");
    }

    #[test]
    fn loose_threshold_folds_the_whole_bin() {
        let templates = run(
            AelConfig {
                log_cluster_thr: 2,
                merge_thr: 1.0,
            },
            &["a p z", "a q z", "b r z"],
        );
        assert!(templates.iter().all(|t| t == "<*> <*> z"));
    }

    #[test]
    fn small_bins_are_left_alone() {
        let templates = run(
            AelConfig {
                log_cluster_thr: 2,
                merge_thr: 1.0,
            },
            &["a p z", "a q z"],
        );
        // two clusters do not exceed the threshold, no merge runs
        assert_eq!(templates[0], "a p z");
        assert_eq!(templates[1], "a q z");
    }

    #[test]
    fn parameter_count_splits_bins() {
        let templates = run(
            AelConfig {
                log_cluster_thr: 1,
                merge_thr: 1.0,
            },
            &["up <§NUM§> q", "up down q"],
        );
        // same token count, different parameter count, so never merged
        assert_eq!(templates[0], "up <§NUM§> q");
        assert_eq!(templates[1], "up down q");
    }

    #[test]
    fn deterministic_across_runs() {
        let lines = ["a p z", "b r z", "a q z", "c s z", "a p z"];
        let config = || AelConfig {
            log_cluster_thr: 2,
            merge_thr: 0.4,
        };
        assert_eq!(run(config(), &lines), run(config(), &lines));
    }
}
