//! Bounded-parallel execution of the external analysis tool.
//!
//! One job is run per sample, with at most `max_jobs` processes alive at a
//! time. A job that fails (non-zero exit, timeout, cancellation, or a program
//! that cannot be started) is reported and the remaining jobs carry on; the
//! run as a whole only finishes once every job has resolved.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use futures::stream::{self, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::pair::matcher::SamplePair;
use crate::run::tool::{sample_output_directory, ToolConfig};
use crate::utils::display::PercentageFormat;

/// Name of the file each job's captured output is saved to, within the
/// sample's output directory.
pub const JOB_LOG_FILE_NAME: &str = "editbatch_job.log";

//=====================//
// Scheduling settings //
//=====================//

/// How jobs are scheduled.
#[derive(Clone, Debug)]
pub struct SchedulerOptions {
    /// Maximum number of jobs running at once.
    pub max_jobs: usize,

    /// Deadline for a single job. A job still running past it is killed.
    pub timeout: Option<Duration>,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        SchedulerOptions {
            max_jobs: 4,
            timeout: None,
        }
    }
}

//==============//
// Cancellation //
//==============//

/// The sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Asks every job holding a matching token to stop. Running processes are
    /// killed and queued jobs are not started.
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// The receiving half of a cancellation signal, cloned into every job.
#[derive(Clone, Debug)]
pub struct CancellationToken(watch::Receiver<bool>);

impl CancellationToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_, rx) = watch::channel(false);
        CancellationToken(rx)
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation is requested. If the handle is dropped
    /// without cancelling, this never resolves.
    pub async fn cancelled(&mut self) {
        while !*self.0.borrow() {
            if self.0.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Creates a connected cancellation handle and token.
pub fn cancellation() -> (CancelHandle, CancellationToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancellationToken(rx))
}

//=============//
// Job results //
//=============//

/// How a single job ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The tool exited with status zero.
    Succeeded,

    /// The tool exited with a non-zero status (`None` when killed by a
    /// signal).
    Failed {
        /// The exit code, if any.
        exit_code: Option<i32>,
    },

    /// The job ran past its deadline and was killed.
    TimedOut {
        /// The deadline that was exceeded, in seconds.
        after_secs: u64,
    },

    /// The run was cancelled before the job finished.
    Cancelled,

    /// The tool could not be started or waited on.
    SpawnFailed {
        /// What went wrong.
        reason: String,
    },
}

impl JobOutcome {
    /// Whether the job succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }

    /// The process exit code, when the process exited on its own.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            JobOutcome::Succeeded => Some(0),
            JobOutcome::Failed { exit_code } => *exit_code,
            _ => None,
        }
    }
}

/// The result of one job.
#[derive(Clone, Debug, Serialize)]
pub struct JobResult {
    /// The sample the job analyzed.
    pub sample_name: String,

    /// How the job ended.
    pub outcome: JobOutcome,

    /// Standard output followed by standard error.
    pub captured_output: String,

    /// Where the tool was asked to write its results.
    pub output_directory: PathBuf,
}

impl JobResult {
    /// The line reported for this job when it did not succeed.
    pub fn failure_line(&self) -> Option<String> {
        match &self.outcome {
            JobOutcome::Succeeded => None,
            JobOutcome::Failed { .. } => Some(format!("[ERROR] {} failed.", self.sample_name)),
            JobOutcome::TimedOut { after_secs } => Some(format!(
                "[ERROR] {} failed: timed out after {}s.",
                self.sample_name, after_secs
            )),
            JobOutcome::Cancelled => Some(format!(
                "[ERROR] {} failed: cancelled.",
                self.sample_name
            )),
            JobOutcome::SpawnFailed { reason } => Some(format!(
                "[ERROR] {} failed: could not run the analysis tool ({}).",
                self.sample_name, reason
            )),
        }
    }
}

/// Everything observed while running a batch of jobs.
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Job results, in completion order.
    pub results: Vec<JobResult>,

    /// The log lines emitted for the run: one per failed job and a final
    /// completion line.
    pub messages: Vec<String>,
}

impl RunReport {
    /// The jobs that did not succeed.
    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| !r.outcome.is_success())
    }
}

//===========//
// Execution //
//===========//

/// How long the output readers of a killed job may keep draining what the
/// process wrote before it died.
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// The combined output of a job. Standard output and standard error are
/// appended as each chunk arrives, so lines keep their order across the two
/// streams only to the granularity of a single read.
type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Copies everything `reader` yields into `buffer` until end of file.
fn capture<R>(mut reader: R, buffer: OutputBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut chunk = [0u8; 8192];
        loop {
            match reader.read(&mut chunk).await {
                Ok(0) | Err(_) => break,
                Ok(n) => buffer.lock().await.extend_from_slice(&chunk[..n]),
            }
        }
    })
}

/// Waits for the output readers. With a grace period, readers still running
/// after it (because the killed process left a descendant holding the pipe)
/// are aborted.
async fn drain(readers: Vec<JoinHandle<()>>, grace: Option<Duration>) {
    for mut reader in readers {
        match grace {
            Some(grace) => {
                if tokio::time::timeout(grace, &mut reader).await.is_err() {
                    reader.abort();
                }
            }
            None => {
                let _ = reader.await;
            }
        }
    }
}

/// Runs the tool for a single sample. Never returns an error: every problem
/// becomes a [`JobOutcome`].
async fn run_job(
    pair: SamplePair,
    config: Arc<ToolConfig>,
    out_root: Arc<PathBuf>,
    timeout: Option<Duration>,
    mut cancel: CancellationToken,
) -> JobResult {
    let output_directory = sample_output_directory(&pair, &out_root);
    let mut result = JobResult {
        sample_name: pair.sample_name.clone(),
        outcome: JobOutcome::Cancelled,
        captured_output: String::new(),
        output_directory,
    };

    if cancel.is_cancelled() {
        return result;
    }

    let program = match config.program() {
        Ok(p) => p,
        Err(e) => {
            result.outcome = JobOutcome::SpawnFailed {
                reason: e.to_string(),
            };
            return result;
        }
    };

    if let Err(e) = tokio::fs::create_dir_all(&result.output_directory).await {
        result.outcome = JobOutcome::SpawnFailed {
            reason: format!(
                "creating {}: {}",
                result.output_directory.display(),
                e
            ),
        };
        return result;
    }

    let mut command = Command::new(program);
    command
        .args(config.arguments(&pair, &result.output_directory))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    debug!("Starting job for {}: {:?}", pair.sample_name, command);
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(e) => {
            result.outcome = JobOutcome::SpawnFailed {
                reason: e.to_string(),
            };
            return result;
        }
    };

    let buffer = OutputBuffer::default();
    let mut readers = Vec::with_capacity(2);
    if let Some(stdout) = child.stdout.take() {
        readers.push(capture(stdout, Arc::clone(&buffer)));
    }
    if let Some(stderr) = child.stderr.take() {
        readers.push(capture(stderr, Arc::clone(&buffer)));
    }

    let deadline = async {
        match timeout {
            Some(t) => tokio::time::sleep(t).await,
            None => std::future::pending::<()>().await,
        }
    };

    let status = tokio::select! {
        status = child.wait() => Some(status),
        _ = deadline => {
            result.outcome = JobOutcome::TimedOut {
                after_secs: timeout.map(|t| t.as_secs()).unwrap_or_default(),
            };
            None
        },
        _ = cancel.cancelled() => {
            result.outcome = JobOutcome::Cancelled;
            None
        },
    };

    match status {
        Some(Ok(status)) => {
            drain(readers, None).await;
            result.outcome = if status.success() {
                JobOutcome::Succeeded
            } else {
                JobOutcome::Failed {
                    exit_code: status.code(),
                }
            };
        }
        Some(Err(e)) => {
            drain(readers, Some(DRAIN_GRACE)).await;
            result.outcome = JobOutcome::SpawnFailed {
                reason: e.to_string(),
            };
        }
        None => {
            if let Err(e) = child.kill().await {
                warn!("could not kill the job for {}: {}", pair.sample_name, e);
            }
            drain(readers, Some(DRAIN_GRACE)).await;
        }
    }

    result.captured_output = String::from_utf8_lossy(&buffer.lock().await).into_owned();

    let log = result.output_directory.join(JOB_LOG_FILE_NAME);
    if let Err(e) = tokio::fs::write(&log, &result.captured_output).await {
        warn!("could not save job output to {}: {}", log.display(), e);
    }

    result
}

/// Runs the tool once per sample with bounded parallelism and waits for every
/// job to resolve.
///
/// Results are collected in completion order. A failure line is logged (and
/// recorded in [`RunReport::messages`]) for every job that did not succeed,
/// followed by exactly one completion line once all jobs are done.
pub async fn run_jobs(
    pairs: Vec<SamplePair>,
    config: Arc<ToolConfig>,
    out_root: &Path,
    options: &SchedulerOptions,
    cancel: CancellationToken,
    progress: &ProgressBar,
) -> anyhow::Result<RunReport> {
    tokio::fs::create_dir_all(out_root)
        .await
        .with_context(|| format!("creating output directory {}", out_root.display()))?;

    let total = pairs.len();
    let out_root = Arc::new(out_root.to_path_buf());
    info!(
        "Running {} jobs with at most {} at a time.",
        total, options.max_jobs
    );

    let mut jobs = stream::iter(pairs.into_iter().map(|pair| {
        run_job(
            pair,
            Arc::clone(&config),
            Arc::clone(&out_root),
            options.timeout,
            cancel.clone(),
        )
    }))
    .buffer_unordered(options.max_jobs.max(1));

    let mut report = RunReport::default();
    while let Some(result) = jobs.next().await {
        progress.inc(1);

        match result.failure_line() {
            Some(line) => {
                error!("{}", line);
                debug!(
                    "Output of the failed job for {}:\n{}",
                    result.sample_name, result.captured_output
                );
                report.messages.push(line);
            }
            None => debug!("{} finished successfully.", result.sample_name),
        }

        report.results.push(result);
    }

    let succeeded = report.results.iter().filter(|r| r.outcome.is_success()).count();
    info!(
        "{} of {} jobs succeeded ({}).",
        succeeded,
        total,
        PercentageFormat(succeeded as u64, total as u64)
    );

    let line = format!("All jobs completed ({} samples).", total);
    info!("{}", line);
    report.messages.push(line);

    Ok(report)
}
