//! Drain and JaccardDrain
//!
//! A fixed-depth prefix tree routes every line to a small candidate set, a
//! similarity match over the candidates picks the cluster. Drain routes on
//! the token count and assumes equal arity inside a leaf; JaccardDrain
//! routes on the first token and compares token sets, so cluster arity may
//! widen while merging.
//!
//! Nodes live in a flat arena indexed by id, clusters in a parallel arena
//! keyed by their monotonic cluster id. Leaves hold cluster ids only, which
//! keeps the parent-owns-child shape free of cycles.

use std::collections::{HashMap, HashSet};

use log_lines::WILDCARD;

use crate::config::DrainConfig;
use crate::errors::*;

use super::OnlineMiner;

type NodeId = usize;
type ClusterId = usize;

const ROOT: NodeId = 0;

#[derive(Debug, Default)]
struct Node {
    children: HashMap<String, NodeId>,
    cluster_ids: Vec<ClusterId>,
}

#[derive(Debug)]
struct LogCluster {
    template: Vec<String>,
}

/// Tree arena, cluster table and the matching parameters, shared by both
/// variants.
#[derive(Debug)]
struct TreeCore {
    depth: usize,
    sim_thr: f64,
    max_children: usize,
    nodes: Vec<Node>,
    clusters: Vec<LogCluster>,
}

impl TreeCore {
    fn new(config: &DrainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            depth: config.depth,
            sim_thr: config.sim_thr,
            max_children: config.max_children,
            nodes: vec![Node::default()],
            clusters: Vec::new(),
        })
    }

    fn alloc(&mut self) -> NodeId {
        self.nodes.push(Node::default());
        self.nodes.len() - 1
    }

    fn child(&self, node: NodeId, token: &str) -> Option<NodeId> {
        self.nodes[node].children.get(token).copied()
    }

    /// Search step: the literal edge, else the wildcard edge, else nothing.
    fn descend(&self, node: NodeId, token: &str) -> Option<NodeId> {
        self.child(node, token)
            .or_else(|| self.child(node, WILDCARD))
    }

    /// Level-1 routing child. The routing level is not bounded by
    /// `max_children`.
    fn route_child(&mut self, key: &str) -> NodeId {
        if let Some(node) = self.child(ROOT, key) {
            return node;
        }
        let node = self.alloc();
        self.nodes[ROOT].children.insert(key.to_owned(), node);
        node
    }

    /// Insertion step for an internal edge: digit-bearing tokens funnel into
    /// the wildcard child, literal edges respect the branching bound, the
    /// last free slot always goes to `<*>`.
    fn insert_child(&mut self, node: NodeId, token: &str) -> NodeId {
        if let Some(next) = self.child(node, token) {
            return next;
        }
        if has_numbers(token) {
            return self.wildcard_child(node);
        }
        let fanout = self.nodes[node].children.len();
        if fanout + 1 < self.max_children {
            let next = self.alloc();
            self.nodes[node].children.insert(token.to_owned(), next);
            next
        } else if fanout + 1 == self.max_children {
            self.wildcard_child(node)
        } else {
            self.child(node, WILDCARD)
                .expect("a node at the branching bound holds a wildcard child")
        }
    }

    fn wildcard_child(&mut self, node: NodeId) -> NodeId {
        if let Some(next) = self.child(node, WILDCARD) {
            return next;
        }
        let next = self.alloc();
        self.nodes[node].children.insert(WILDCARD.to_owned(), next);
        next
    }

    fn new_cluster(&mut self, template: Vec<String>) -> ClusterId {
        self.clusters.push(LogCluster { template });
        self.clusters.len() - 1
    }

    /// Highest similarity wins, ties break towards more wildcards.
    fn fast_match(
        &self,
        candidates: &[ClusterId],
        tokens: &[String],
        include_params: bool,
        distance: fn(&[String], &[String], bool) -> (f64, usize),
    ) -> Option<ClusterId> {
        let mut best = None;
        let mut best_sim = -1.0_f64;
        let mut best_params = -1_i64;
        for &cluster in candidates {
            let (sim, params) = distance(&self.clusters[cluster].template, tokens, include_params);
            let params = params as i64;
            if sim > best_sim || ((sim - best_sim).abs() < f64::EPSILON && params > best_params) {
                best_sim = sim;
                best_params = params;
                best = Some(cluster);
            }
        }
        if best_sim >= self.sim_thr {
            best
        } else {
            None
        }
    }

    fn generalize(
        &mut self,
        cluster: ClusterId,
        tokens: &[String],
        merge: fn(&[String], &[String]) -> Vec<String>,
    ) {
        let merged = merge(tokens, &self.clusters[cluster].template);
        if merged != self.clusters[cluster].template {
            self.clusters[cluster].template = merged;
        }
    }

    fn template_of(&self, cluster: ClusterId) -> String {
        self.clusters[cluster].template.join(" ")
    }
}

fn has_numbers(token: &str) -> bool {
    token.chars().any(|c| c.is_ascii_digit())
}

/// Position-wise similarity over equal-length sequences. Wildcard positions
/// count towards the parameter count and, only with `include_params`,
/// towards the match count.
fn drain_distance(template: &[String], tokens: &[String], include_params: bool) -> (f64, usize) {
    if template.is_empty() {
        return (1.0, 0);
    }
    debug_assert_eq!(template.len(), tokens.len());
    let mut matched = 0_usize;
    let mut params = 0_usize;
    for (token, expected) in tokens.iter().zip(template) {
        if expected == WILDCARD {
            params += 1;
            if include_params {
                matched += 1;
            }
        } else if token == expected {
            matched += 1;
        }
    }
    (matched as f64 / template.len() as f64, params)
}

/// Set-overlap similarity. On equal length the template's wildcard positions
/// are stripped from both sides first. The fixed 1.3 gain offsets the low
/// raw Jaccard values of near-identical lines and is inherited as-is from
/// the reference implementation.
fn jaccard_distance(template: &[String], tokens: &[String], include_params: bool) -> (f64, usize) {
    if template.is_empty() {
        return (1.0, 0);
    }
    let params = template.iter().filter(|t| *t == WILDCARD).count();

    let line: Vec<&str> = if template.len() == tokens.len() && params > 0 {
        tokens
            .iter()
            .zip(template)
            .filter(|(_, expected)| *expected != WILDCARD)
            .map(|(token, _)| token.as_str())
            .collect()
    } else {
        tokens.iter().map(String::as_str).collect()
    };
    let temp: Vec<&str> = if include_params {
        template
            .iter()
            .filter(|t| *t != WILDCARD)
            .map(String::as_str)
            .collect()
    } else {
        template.iter().map(String::as_str).collect()
    };

    let temp: HashSet<&str> = temp.into_iter().collect();
    let line: HashSet<&str> = line.into_iter().collect();
    let union = temp.union(&line).count();
    let sim = if union == 0 {
        1.0
    } else {
        temp.intersection(&line).count() as f64 / union as f64
    };
    ((sim * 1.3).min(1.0), params)
}

/// Keep agreeing positions, wildcard the rest. Wildcards are sticky.
fn merge_equal_length(tokens: &[String], template: &[String]) -> Vec<String> {
    tokens
        .iter()
        .zip(template)
        .map(|(token, expected)| {
            if token == expected {
                expected.clone()
            } else {
                WILDCARD.to_owned()
            }
        })
        .collect()
}

/// Equal length merges position-wise; differing length takes the longer
/// sequence and wildcards everything outside the token intersection.
fn merge_jaccard(tokens: &[String], template: &[String]) -> Vec<String> {
    if tokens.len() == template.len() {
        return merge_equal_length(tokens, template);
    }
    let shared: HashSet<&str> = {
        let a: HashSet<&str> = tokens.iter().map(String::as_str).collect();
        let b: HashSet<&str> = template.iter().map(String::as_str).collect();
        a.intersection(&b).copied().collect()
    };
    let longer = if tokens.len() > template.len() {
        tokens
    } else {
        template
    };
    longer
        .iter()
        .map(|token| {
            if shared.contains(token.as_str()) {
                token.clone()
            } else {
                WILDCARD.to_owned()
            }
        })
        .collect()
}

/// The classic Drain miner: level 1 routes on token count, leaves hold
/// equal-arity clusters.
pub(crate) struct Drain {
    core: TreeCore,
}

impl Drain {
    pub(crate) fn new(config: &DrainConfig) -> Result<Self> {
        Ok(Self {
            core: TreeCore::new(config)?,
        })
    }

    /// Internal token levels below the routing level.
    fn walk_limit(&self, token_count: usize) -> usize {
        (self.core.depth - 2).min(token_count)
    }

    fn search(&self, tokens: &[String]) -> Option<ClusterId> {
        let mut node = self.core.child(ROOT, &tokens.len().to_string())?;
        for token in &tokens[..self.walk_limit(tokens.len())] {
            node = self.core.descend(node, token)?;
        }
        self.core
            .fast_match(&self.core.nodes[node].cluster_ids, tokens, false, drain_distance)
    }

    fn insert(&mut self, cluster: ClusterId) {
        let template = self.core.clusters[cluster].template.clone();
        let mut node = self.core.route_child(&template.len().to_string());
        for token in &template[..self.walk_limit(template.len())] {
            node = self.core.insert_child(node, token);
        }
        self.core.nodes[node].cluster_ids.push(cluster);
    }
}

impl OnlineMiner for Drain {
    fn add_line(&mut self, tokens: &[String]) -> ClusterId {
        match self.search(tokens) {
            Some(cluster) => {
                self.core.generalize(cluster, tokens, merge_equal_length);
                cluster
            }
            None => {
                let cluster = self.core.new_cluster(tokens.to_vec());
                self.insert(cluster);
                cluster
            }
        }
    }

    fn template_of(&self, cluster: ClusterId) -> String {
        self.core.template_of(cluster)
    }
}

/// Drain routing on the first token instead of the token count, with set
/// overlap as the similarity, so differing arities can share a cluster.
pub(crate) struct JaccardDrain {
    core: TreeCore,
}

impl JaccardDrain {
    pub(crate) fn new(config: &DrainConfig) -> Result<Self> {
        Ok(Self {
            core: TreeCore::new(config)?,
        })
    }

    fn route_key(tokens: &[String]) -> &str {
        tokens.first().map(String::as_str).unwrap_or("")
    }

    fn search(&self, tokens: &[String]) -> Option<ClusterId> {
        let mut node = self.core.child(ROOT, Self::route_key(tokens))?;
        if tokens.is_empty() {
            // the empty-line group holds a single cluster
            return self.core.nodes[node].cluster_ids.first().copied();
        }
        let token_count = tokens.len();
        for (level, token) in tokens[1..].iter().enumerate() {
            let level = level + 1;
            if level == self.core.depth || level == token_count - 1 {
                break;
            }
            node = self.core.descend(node, token)?;
        }
        self.core
            .fast_match(&self.core.nodes[node].cluster_ids, tokens, false, jaccard_distance)
    }

    fn insert(&mut self, cluster: ClusterId) {
        let template = self.core.clusters[cluster].template.clone();
        let mut node = self.core.route_child(Self::route_key(&template));
        let token_count = template.len();
        if token_count == 0 {
            self.core.nodes[node].cluster_ids = vec![cluster];
            return;
        }
        if token_count == 1 {
            self.core.nodes[node].cluster_ids.push(cluster);
        }
        for (level, token) in template[1..].iter().enumerate() {
            let level = level + 1;
            if level == self.core.depth || level == token_count - 1 {
                self.core.nodes[node].cluster_ids.push(cluster);
                break;
            }
            node = self.core.insert_child(node, token);
        }
    }
}

impl OnlineMiner for JaccardDrain {
    fn add_line(&mut self, tokens: &[String]) -> ClusterId {
        match self.search(tokens) {
            Some(cluster) => {
                self.core.generalize(cluster, tokens, merge_jaccard);
                cluster
            }
            None => {
                let cluster = self.core.new_cluster(tokens.to_vec());
                self.insert(cluster);
                cluster
            }
        }
    }

    fn template_of(&self, cluster: ClusterId) -> String {
        self.core.template_of(cluster)
    }
}
