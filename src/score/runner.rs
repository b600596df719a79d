//! Obtaining a method's results table for a dataset file.

use crate::condition::ScoringOptions;
use crate::error::{BenchError, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Poll interval while waiting on a child process.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lines of runner stderr kept in a failure reason.
const STDERR_TAIL_LINES: usize = 5;

/// Last non-empty lines of `text`, joined on one line.
fn stderr_tail(text: &str) -> String {
    let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    lines[lines.len().saturating_sub(STDERR_TAIL_LINES)..].join(" | ")
}

/// One (dataset, method) unit of external work.
#[derive(Debug, Clone, Copy)]
pub struct RunRequest<'a> {
    /// Leaf label used in failure reports.
    pub leaf: &'a str,
    pub dataset: &'a Path,
    pub method: &'a str,
    /// Method output folder.
    pub output_dir: &'a Path,
}

impl RunRequest<'_> {
    /// File stem of the dataset.
    pub fn stem(&self) -> String {
        self.dataset
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn failure(&self, reason: impl Into<String>) -> BenchError {
        BenchError::ExternalRunnerFailure {
            leaf: self.leaf.to_string(),
            method: self.method.to_string(),
            reason: reason.into(),
        }
    }
}

/// Substitute `{dir}`, `{stem}` and `{method}` in a path template.
pub fn render_template(template: &str, dir: &Path, stem: &str, method: &str) -> PathBuf {
    PathBuf::from(
        template
            .replace("{dir}", &dir.to_string_lossy())
            .replace("{stem}", stem)
            .replace("{method}", method),
    )
}

/// Maps a dataset file to the results table of one method.
///
/// Failures are reported as `ExternalRunnerFailure` and only affect the
/// requested (leaf, method).
pub trait AnalysisRunner: Send + Sync {
    fn run(&self, request: &RunRequest<'_>) -> Result<PathBuf>;
}

/// Resolves outputs that were produced outside this process.
#[derive(Debug, Clone)]
pub struct TemplateLocator {
    template: String,
}

impl TemplateLocator {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn results_path(&self, request: &RunRequest<'_>) -> PathBuf {
        render_template(&self.template, request.output_dir, &request.stem(), request.method)
    }
}

impl AnalysisRunner for TemplateLocator {
    fn run(&self, request: &RunRequest<'_>) -> Result<PathBuf> {
        let path = self.results_path(request);
        if path.is_file() {
            Ok(path)
        } else {
            Err(request.failure(format!("no results at {}", path.display())))
        }
    }
}

/// Runs an external program per (dataset, method) and waits for its output.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    args: Vec<String>,
    locator: TemplateLocator,
    timeout: Duration,
}

impl CommandRunner {
    /// `args[0]` is the program; placeholders `{dataset}`, `{output}`,
    /// `{method}`, `{dir}` and `{stem}` are substituted per request.
    pub fn new(args: Vec<String>, result_template: impl Into<String>, timeout: Duration) -> Result<Self> {
        if args.is_empty() {
            return Err(BenchError::InvalidParameter("runner command is empty".to_string()));
        }
        Ok(Self {
            args,
            locator: TemplateLocator::new(result_template),
            timeout,
        })
    }

    fn render_args(&self, request: &RunRequest<'_>, output: &Path) -> Vec<String> {
        let stem = request.stem();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{dataset}", &request.dataset.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
                    .replace("{method}", request.method)
                    .replace("{dir}", &request.output_dir.to_string_lossy())
                    .replace("{stem}", &stem)
            })
            .collect()
    }
}

impl AnalysisRunner for CommandRunner {
    fn run(&self, request: &RunRequest<'_>) -> Result<PathBuf> {
        let output = self.locator.results_path(request);
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let args = self.render_args(request, &output);
        debug!(leaf = request.leaf, method = request.method, command = %args.join(" "), "spawning runner");

        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| request.failure(format!("could not spawn '{}': {}", args[0], e)))?;

        // Drained on its own thread so a chatty child never blocks on the pipe.
        let stderr = child.stderr.take();
        let drain = thread::spawn(move || {
            let mut buf = Vec::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_end(&mut buf);
            }
            String::from_utf8_lossy(&buf).into_owned()
        });

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child
                .try_wait()
                .map_err(|e| request.failure(format!("could not wait for runner: {}", e)))?
            {
                break status;
            }
            if started.elapsed() >= self.timeout {
                warn!(leaf = request.leaf, method = request.method, "runner timed out, killing");
                // The child may exit between try_wait and kill.
                let _ = child.kill();
                let _ = child.wait();
                return Err(request.failure(format!("timed out after {:?}", self.timeout)));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            let tail = drain.join().map(|text| stderr_tail(&text)).unwrap_or_default();
            let reason = if tail.is_empty() {
                format!("exited with {}", status)
            } else {
                format!("exited with {}: {}", status, tail)
            };
            return Err(request.failure(reason));
        }
        if !output.is_file() {
            return Err(request.failure(format!("finished without writing {}", output.display())));
        }
        Ok(output)
    }
}

/// The runner configured by scoring options.
pub fn runner_from_options(options: &ScoringOptions) -> Result<Box<dyn AnalysisRunner>> {
    match &options.command {
        Some(args) => Ok(Box::new(CommandRunner::new(
            args.clone(),
            options.result_template.clone(),
            Duration::from_secs(options.timeout_secs),
        )?)),
        None => Ok(Box::new(TemplateLocator::new(options.result_template.clone()))),
    }
}
