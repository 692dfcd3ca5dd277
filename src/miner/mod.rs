//! Template miners
//!
//! The common contract over the five mining algorithms and the shared parse
//! driver that runs a single file end to end: read, mask, tokenize, mine,
//! materialize, publish.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;

use log::{debug, info};

use log_lines::{read_log, LogFormat};

use crate::config::ParserConfig;
use crate::errors::*;
use crate::output::materialize;
use crate::table::TableStore;

mod ael;
mod brain;
mod drain;
mod spell;

pub(crate) use self::ael::Ael;
pub(crate) use self::brain::Brain;
pub(crate) use self::drain::{Drain, JaccardDrain};
pub(crate) use self::spell::Spell;

/// The mining algorithms, which double as the registry: every variant knows
/// its external name and a one-line description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Drain,
    JaccardDrain,
    Spell,
    Ael,
    Brain,
}

impl Algorithm {
    pub const ALL: &'static [Algorithm] = &[
        Algorithm::Drain,
        Algorithm::JaccardDrain,
        Algorithm::Spell,
        Algorithm::Ael,
        Algorithm::Brain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Drain => "Drain",
            Algorithm::JaccardDrain => "JaccardDrain",
            Algorithm::Spell => "Spell",
            Algorithm::Ael => "AEL",
            Algorithm::Brain => "Brain",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Algorithm::Drain => "Fixed-depth prefix tree with a similarity leaf match",
            Algorithm::JaccardDrain => {
                "Drain variant routing on the first token and matching by set overlap"
            }
            Algorithm::Spell => "Online longest-common-subsequence mining with a prefix-tree fast path",
            Algorithm::Ael => "Token- and parameter-count binning with a similarity merge pass",
            Algorithm::Brain => "Column-frequency root finding with bidirectional variable splits",
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Algorithm::ALL
            .iter()
            .find(|algorithm| algorithm.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| Error::UnknownAlgorithm(s.to_owned()))
    }
}

/// Everything one parse run needs besides the algorithm and its config.
pub struct ParseJob<'a> {
    pub file: &'a Path,
    pub structured_name: &'a str,
    pub templates_name: &'a str,
    pub keep_params: bool,
    /// Cooperative cancellation, polled per line and per phase.
    pub should_stop: &'a (dyn Fn() -> bool + Sync),
    /// Percent progress, non-decreasing, within `[0, 100]`.
    pub progress: Option<&'a (dyn Fn(u8) + Sync)>,
}

/// What a finished run hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub log_file: PathBuf,
    pub line_count: usize,
    pub structured_table_name: String,
    pub templates_table_name: String,
}

/// Cancellation and progress bookkeeping shared by all miners.
///
/// Emitted percentages are strictly increasing and capped at 100, so the
/// callback sees a monotonic sequence no matter how ragged the chunking is.
pub(crate) struct Ticker<'a> {
    should_stop: &'a (dyn Fn() -> bool + Sync),
    progress: Option<&'a (dyn Fn(u8) + Sync)>,
    total: usize,
    emitted: u8,
}

impl<'a> Ticker<'a> {
    const CHUNK: usize = 10_000;

    pub(crate) fn new(job: &ParseJob<'a>, total: usize) -> Self {
        Self {
            should_stop: job.should_stop,
            progress: job.progress,
            total,
            emitted: 0,
        }
    }

    fn check(&self) -> Result<()> {
        if (self.should_stop)() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Call once per processed line with the 1-based count.
    pub(crate) fn row(&mut self, done: usize) -> Result<()> {
        self.check()?;
        if done % Self::CHUNK == 0 || done == self.total {
            self.emit((done * 100 / self.total.max(1)) as u8);
        }
        Ok(())
    }

    /// Call at batch-miner phase boundaries with an overall percentage.
    pub(crate) fn phase(&mut self, percent: u8) -> Result<()> {
        self.check()?;
        self.emit(percent);
        Ok(())
    }

    /// Cancellation poll without a progress emission, for inner batch loops.
    pub(crate) fn poll(&self) -> Result<()> {
        self.check()
    }

    fn emit(&mut self, percent: u8) {
        let percent = percent.min(100);
        if percent > self.emitted {
            if let Some(progress) = self.progress {
                progress(percent);
            }
            self.emitted = percent;
        }
    }

    fn finish(&mut self) {
        self.emit(100);
    }
}

/// Online miners absorb one line at a time; templates are rendered once the
/// whole file went through, so every row sees the final generalized form of
/// its cluster.
pub(crate) trait OnlineMiner {
    fn add_line(&mut self, tokens: &[String]) -> usize;
    fn template_of(&self, cluster: usize) -> String;
}

pub(crate) fn run_online<M: OnlineMiner>(
    miner: &mut M,
    rows: &[Vec<String>],
    ticker: &mut Ticker,
) -> Result<Vec<String>> {
    let mut assigned = Vec::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        ticker.row(idx + 1)?;
        assigned.push(miner.add_line(row));
    }
    Ok(assigned
        .into_iter()
        .map(|cluster| miner.template_of(cluster))
        .collect())
}

/// Run one file end to end and publish both relations.
///
/// There is no partial output: a cancellation or failure anywhere leaves the
/// store untouched, and destination collisions are refused up front.
pub fn parse(
    algorithm: Algorithm,
    config: &ParserConfig,
    job: &ParseJob,
    store: &dyn TableStore,
) -> Result<ParseResult> {
    info!("Parsing {} with {algorithm}", job.file.display());
    let started = Instant::now();

    for name in [job.structured_name, job.templates_name] {
        if store.contains(name) {
            return Err(Error::OutputConflict(name.to_owned()));
        }
    }

    let format = LogFormat::compile(&config.log_format)?;
    let mut frame = read_log(job.file, &format, job.should_stop)?;
    frame.mask(&config.mask_set());
    frame.tokenize(&config.tokenizer());
    debug!("Accepted {} lines, mining templates", frame.len());

    let mut ticker = Ticker::new(job, frame.len());
    let templates = match algorithm {
        Algorithm::Drain => {
            run_online(&mut Drain::new(&config.drain)?, frame.tokens(), &mut ticker)?
        }
        Algorithm::JaccardDrain => run_online(
            &mut JaccardDrain::new(&config.jaccard_drain)?,
            frame.tokens(),
            &mut ticker,
        )?,
        Algorithm::Spell => {
            run_online(&mut Spell::new(&config.spell)?, frame.tokens(), &mut ticker)?
        }
        Algorithm::Ael => Ael::new(&config.ael)?.assign(frame.tokens(), &mut ticker)?,
        Algorithm::Brain => Brain::new(&config.brain)?.assign(frame.tokens(), &mut ticker)?,
    };
    ticker.finish();

    let line_count = frame.len();
    let (structured, template_table) = materialize(frame, templates, job.keep_params);
    store.publish(vec![
        (job.structured_name.to_owned(), structured),
        (job.templates_name.to_owned(), template_table),
    ])?;

    info!(
        "Parsed {line_count} lines from {} in {:?}",
        job.file.display(),
        started.elapsed()
    );
    Ok(ParseResult {
        log_file: job.file.to_owned(),
        line_count,
        structured_table_name: job.structured_name.to_owned(),
        templates_table_name: job.templates_name.to_owned(),
    })
}
