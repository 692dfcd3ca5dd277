#![deny(clippy::dbg_macro)]

//! logsieve
//!
//! Mines parametric templates out of unstructured log files. Every input
//! line is split into header fields, its content masked and tokenized, and
//! one of five clustering algorithms (Drain, JaccardDrain, Spell, AEL,
//! Brain) assigns it a template with `<*>` wildcards at the parameter
//! positions. Each parsed file yields two relations: the structured lines
//! annotated with their template, and the distinct templates with
//! occurrence counts.

pub mod config;
pub mod errors;
mod miner;
mod output;
mod pool;
mod table;

pub use self::config::{
    preset, preset_names, AelConfig, BrainConfig, DrainConfig, ParserConfig, SpellConfig,
};
pub use self::miner::{parse, Algorithm, ParseJob, ParseResult};
pub use self::output::{EVENT_TEMPLATE, LINE_ID, OCCURRENCES, PARAMETER_LIST};
pub use self::pool::{JobEvent, JobHandle, JobRequest, ParsePool};
pub use self::table::{Column, MemoryStore, Table, TableStore};

pub use log_lines::{LogFormat, LogFrame, MaskRule, MaskSet, Tokenizer, WILDCARD};

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

/// Global cancellation flag, flipped by the signal handler. Jobs submitted
/// by the command line poll it through their `should_stop` hook.
pub static CANCEL_REQUESTED: AtomicBool = AtomicBool::new(false);

/// `true` once the user asked the process to wind down.
pub fn cancel_requested() -> bool {
    CANCEL_REQUESTED.load(Ordering::Acquire)
}

/// Handle incoming signals by requesting cooperative cancellation; a second
/// signal exits immediately.
///
/// Only relevant for *-nix platforms.
#[cfg(not(target_os = "windows"))]
pub fn signal_handler() {
    use signal_hook::consts::signal::{SIGINT, SIGQUIT, SIGTERM};
    use signal_hook::iterator;

    let mut signals =
        iterator::Signals::new([SIGTERM, SIGINT, SIGQUIT]).expect("Failed to create Signals");
    for signal in signals.forever() {
        match signal {
            SIGTERM | SIGINT | SIGQUIT => {
                if CANCEL_REQUESTED.swap(true, Ordering::AcqRel) {
                    std::process::exit(130);
                }
                warn!("Cancellation requested, waiting for running jobs to abort");
            }
            signal => warn!("Received unhandled signal {}, ignoring", signal),
        }
    }
}

#[cfg(target_os = "windows")]
use signal_hook as _;
