//! Streams a log file line by line into a [`LogFrame`].

use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, warn};

use crate::errors::*;
use crate::format::LogFormat;
use crate::frame::LogFrame;

/// Read `path` and split every line into header fields.
///
/// Lines that do not match the format are dropped with a warning and do not
/// consume a line id. The `should_stop` predicate is consulted once per line;
/// when it returns `true` reading fails with [`Error::Cancelled`].
pub fn read_log(
    path: &Path,
    format: &LogFormat,
    should_stop: &(dyn Fn() -> bool + Sync),
) -> Result<LogFrame> {
    let file = fs_err::File::open(path)?;
    let mut frame = LogFrame::new(format.headers());

    for line in BufReader::new(file).lines() {
        if should_stop() {
            return Err(Error::Cancelled);
        }
        let line = line?;
        let line = line.trim();
        match format.capture(line) {
            Some(fields) => frame.push_row(fields),
            None => warn!("Skipping line that does not match the log format: {line:?}"),
        }
    }

    debug!("Accepted {} lines from {}", frame.len(), path.display());
    Ok(frame)
}
