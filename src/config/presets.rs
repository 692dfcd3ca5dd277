//! Builtin parser configs for the usual public log corpora.
//!
//! Formats, masking extensions, delimiters and per-algorithm parameters are
//! tuned per corpus. Drain and JaccardDrain share their knobs in every
//! preset.

use lazy_static::lazy_static;

use log_lines::MaskRule;

use super::{AelConfig, BrainConfig, DrainConfig, ParserConfig, SpellConfig};
use crate::errors::*;

/// Look up a builtin preset by name.
pub fn preset(name: &str) -> Result<ParserConfig> {
    PRESETS
        .iter()
        .find(|preset| preset.name == name)
        .cloned()
        .ok_or_else(|| Error::UnknownPreset(name.to_owned()))
}

/// Names of all builtin presets, in registry order.
pub fn preset_names() -> Vec<&'static str> {
    PRESETS.iter().map(|preset| preset.name.as_str()).collect()
}

fn masks(rules: &[(&str, &str)]) -> Vec<MaskRule> {
    rules
        .iter()
        .map(|(pattern, replacement)| {
            MaskRule::new(pattern, replacement).expect("preset masking rule is valid")
        })
        .collect()
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| (*value).to_owned()).collect()
}

#[allow(clippy::too_many_arguments)]
fn entry(
    name: &str,
    log_format: &str,
    masking: &[(&str, &str)],
    delimiters: &[&str],
    depth: usize,
    sim_thr: f64,
    spell_sim_thr: f64,
    log_cluster_thr: usize,
    merge_thr: f64,
    var_thr: usize,
) -> ParserConfig {
    let drain = DrainConfig {
        depth,
        sim_thr,
        ..DrainConfig::default()
    };
    ParserConfig {
        masking: masks(masking),
        delimiters: strings(delimiters),
        drain,
        jaccard_drain: drain,
        spell: SpellConfig {
            sim_thr: spell_sim_thr,
        },
        ael: AelConfig {
            log_cluster_thr,
            merge_thr,
        },
        brain: BrainConfig { var_thr },
        ..ParserConfig::bare(name, log_format)
    }
}

lazy_static! {
    static ref PRESETS: Vec<ParserConfig> = vec![
        entry(
            "HDFS",
            "<Date> <Time> <Pid> <Level> <Component>: <Content>",
            &[(r"blk_-?\d+", "<§BLK§>")],
            &[":"],
            4, 0.5, 0.7, 2, 0.5, 2,
        ),
        entry(
            "Hadoop",
            r"<Date> <Time> <Level> \[<Process>\] <Component>: <Content>",
            &[],
            &["=", ":", "_", "(", ")"],
            4, 0.5, 0.7, 2, 0.4, 6,
        ),
        entry(
            "Spark",
            "<Date> <Time> <Level> <Component>: <Content>",
            &[],
            &[":"],
            4, 0.5, 0.55, 2, 0.4, 4,
        ),
        entry(
            "Zookeeper",
            r"<Date> <Time> - <Level>  \[<Node>:<Component>@<Id>\] - <Content>",
            &[],
            &["=", ":"],
            4, 0.5, 0.7, 2, 0.4, 3,
        ),
        entry(
            "BGL",
            "<Label> <Timestamp> <Date> <Node> <Time> <NodeRepeat> <Type> <Component> <Level> <Content>",
            &[
                (r"core\.\d+", "<§CORE§>"),
                (r"\d+:[A-Fa-f\d]{8,}", "<§ADDR§>"),
            ],
            &["=", "..", "(", ")"],
            4, 0.5, 0.75, 2, 0.5, 6,
        ),
        entry(
            "HPC",
            "<LogId> <Node> <Component> <State> <Time> <Flag> <Content>",
            &[],
            &["=", ":", "-"],
            4, 0.5, 0.65, 5, 0.4, 5,
        ),
        entry(
            "Thunderbird",
            r"<Label> <Timestamp> <Date> <User> <Month> <Day> <Time> <Location> <Component>(\[<PID>\])?: <Content>",
            &[],
            &["=", ":"],
            4, 0.5, 0.5, 2, 0.4, 3,
        ),
        entry(
            "Windows",
            "<Date> <Time>, <Level>                  <Component>    <Content>",
            &[],
            &["=", ":", "[", "]"],
            5, 0.7, 0.7, 2, 0.4, 3,
        ),
        entry(
            "Linux",
            r"<Month> <Date> <Time> <Level> <Component>(\[<PID>\])?: <Content>",
            &[],
            &["=", ":"],
            6, 0.39, 0.55, 2, 0.6, 4,
        ),
        entry(
            "Android",
            "<Date> <Time>  <Pid>  <Tid> <Level> <Component>: <Content>",
            &[(r"(/[\w-]+)+", "<§PATH§>")],
            &["=", ":"],
            6, 0.2, 0.95, 2, 0.6, 5,
        ),
        entry(
            "HealthApp",
            r"<Time>\|<Component>\|<Pid>\|<Content>",
            &[(r"\d+##\d+##\d+##\d+##\d+##\d+", "<§SEQ§>")],
            &["=", ":", "|"],
            4, 0.2, 0.5, 2, 0.6, 4,
        ),
        entry(
            "Apache",
            r"\[<Time>\] \[<Level>\] <Content>",
            &[],
            &[],
            4, 0.5, 0.6, 2, 0.4, 4,
        ),
        entry(
            "Proxifier",
            r"\[<Time>\] <Program> - <Content>",
            &[(r"<\d+\ssec", "<§DURATION§>")],
            &[],
            3, 0.6, 0.85, 2, 0.4, 3,
        ),
        entry(
            "OpenSSH",
            r"<Date> <Day> <Time> <Component> sshd\[<Pid>\]: <Content>",
            &[],
            &[],
            5, 0.6, 0.8, 10, 0.7, 6,
        ),
        entry(
            "OpenStack",
            r"<Logrecord> <Date> <Time> <Pid> <Level> <Component> \[<ADDR>\] <Content>",
            &[
                (r"\[instance:(.*?)\]", "<§INST§>"),
                (r"(/[\w-]+)+", "<§PATH§>"),
            ],
            &[],
            5, 0.5, 0.9, 6, 0.5, 5,
        ),
        entry(
            "Mac",
            r"<Month>  <Date> <Time> <User> <Component>\[<PID>\]( \(<Address>\))?: <Content>",
            &[],
            &[],
            6, 0.7, 0.6, 2, 0.6, 5,
        ),
    ];
}
