//! The parse job pool.
//!
//! A bounded set of worker threads runs one mining job per file. Miner state
//! is worker-local; the only shared pieces are the table store, the event
//! channel back to the submitter, and the atomic kill flag. Saturated pools
//! queue submissions; the `Started` event tells the submitter when a slot
//! was taken.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::Arc;

use log::warn;

use crate::config::ParserConfig;
use crate::errors::*;
use crate::miner::{parse, Algorithm, ParseJob};
use crate::table::TableStore;

/// Lifecycle events a job reports back to the submitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    /// A worker picked the job up.
    Started(u64),
    /// Percent progress, non-decreasing within a job.
    Progress(u64, u8),
    /// Both relations are published.
    Finished { log_id: u64, line_count: usize },
    /// The job was cancelled cooperatively; nothing was published.
    Interrupted(u64),
    /// The job failed; nothing was published.
    Error { log_id: u64, message: String },
}

/// One submission.
#[derive(Debug, Clone)]
pub struct JobRequest {
    pub log_id: u64,
    pub file: PathBuf,
    pub algorithm: Algorithm,
    pub config: ParserConfig,
    pub structured_name: String,
    pub templates_name: String,
    pub keep_params: bool,
}

/// Cancels a single submitted job, cooperatively.
#[derive(Debug, Clone, Default)]
pub struct JobHandle {
    flag: Arc<AtomicBool>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

pub struct ParsePool {
    workers: rayon::ThreadPool,
    events: Sender<JobEvent>,
    store: Arc<dyn TableStore>,
    killed: Arc<AtomicBool>,
}

impl ParsePool {
    /// A pool with `workers` threads publishing into `store` and reporting
    /// over `events`.
    pub fn new(
        workers: usize,
        store: Arc<dyn TableStore>,
        events: Sender<JobEvent>,
    ) -> Result<Self> {
        let workers = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("parse-worker-{index}"))
            .build()
            .map_err(|e| Error::BadConfig(format!("failed to build the worker pool: {e}")))?;
        Ok(Self {
            workers,
            events,
            store,
            killed: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Queue a job. Fails with [`Error::PoolKilled`] once [`Self::kill`] ran.
    ///
    /// The returned handle cancels this job alone; cancellation is
    /// cooperative and leaves no partial output behind.
    pub fn submit(&self, request: JobRequest) -> Result<JobHandle> {
        if self.killed.load(Ordering::Acquire) {
            return Err(Error::PoolKilled);
        }
        let handle = JobHandle::default();
        let job_flag = handle.clone();
        let events = self.events.clone();
        let store = Arc::clone(&self.store);
        let killed = Arc::clone(&self.killed);

        self.workers.spawn(move || {
            let log_id = request.log_id;
            // the receiver may be gone when nobody waits for events anymore
            let _ = events.send(JobEvent::Started(log_id));

            let should_stop = || killed.load(Ordering::Acquire) || job_flag.is_cancelled();
            let progress_events = events.clone();
            let progress = move |percent: u8| {
                let _ = progress_events.send(JobEvent::Progress(log_id, percent));
            };
            let job = ParseJob {
                file: &request.file,
                structured_name: &request.structured_name,
                templates_name: &request.templates_name,
                keep_params: request.keep_params,
                should_stop: &should_stop,
                progress: Some(&progress),
            };

            match parse(request.algorithm, &request.config, &job, store.as_ref()) {
                Ok(result) => {
                    let _ = events.send(JobEvent::Finished {
                        log_id,
                        line_count: result.line_count,
                    });
                }
                Err(e) if e.is_cancelled() => {
                    let _ = events.send(JobEvent::Interrupted(log_id));
                }
                Err(e) => {
                    warn!("Job {log_id} for {} failed: {e}", request.file.display());
                    let _ = events.send(JobEvent::Error {
                        log_id,
                        message: e.to_string(),
                    });
                }
            }
        });
        Ok(handle)
    }

    /// Cancel all running jobs and refuse every further submission. Running
    /// workers notice through their `should_stop` poll.
    pub fn kill(&self) {
        self.killed.store(true, Ordering::Release);
    }
}
