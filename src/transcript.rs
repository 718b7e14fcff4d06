//! Run transcript: the live text view and an optional JSON-lines log.
//!
//! Driver events arrive over a channel and are printed as plain lines as
//! they happen. When a log path is given, each event is also appended as a
//! self-contained JSON object with an RFC 3339 timestamp, which makes runs
//! easy to grep and post-process.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, mpsc};
use std::thread;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::driver::DriverEvent;

/// One line of the run log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    #[serde(flatten)]
    pub event: LogEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum LogEvent {
    RunStarted { work_dir: String },
    WizardLaunched { command: String, work_dir: String },
    WizardOutput { line: String },
    PromptDetected { prompt: String },
    EmailSubstituted { original: String, fallback: String },
    AnswerSent { index: usize, field: String, answer: String },
    BlankAnswerSent { index: usize, field: String },
    OutputClosedEarly { sent: usize, total: usize },
    WizardExited { code: Option<i32> },
    RunCompleted { answers_sent: usize },
    RunFailed { reason: String },
}

impl From<&DriverEvent> for LogEvent {
    fn from(event: &DriverEvent) -> Self {
        match event {
            DriverEvent::Launched { command, work_dir } => LogEvent::WizardLaunched {
                command: command.clone(),
                work_dir: work_dir.clone(),
            },
            DriverEvent::Output(line) => LogEvent::WizardOutput { line: line.clone() },
            DriverEvent::PromptDetected(prompt) => LogEvent::PromptDetected {
                prompt: prompt.clone(),
            },
            DriverEvent::EmailSubstituted { original, fallback } => LogEvent::EmailSubstituted {
                original: original.clone(),
                fallback: fallback.clone(),
            },
            DriverEvent::AnswerSent {
                index,
                field,
                answer,
                ..
            } => LogEvent::AnswerSent {
                index: *index,
                field: field.to_string(),
                answer: answer.clone(),
            },
            DriverEvent::BlankAnswerSent { index, field, .. } => LogEvent::BlankAnswerSent {
                index: *index,
                field: field.to_string(),
            },
            DriverEvent::OutputClosedEarly { sent, total } => LogEvent::OutputClosedEarly {
                sent: *sent,
                total: *total,
            },
            DriverEvent::Exited { code } => LogEvent::WizardExited { code: *code },
        }
    }
}

/// Append-only JSON-lines writer.
pub struct RunLog {
    writer: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl RunLog {
    /// Open (or create) the log at `path`, creating parent directories.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create log directory: {}", parent.display()))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open log file: {}", path.display()))?;

        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn log(&self, event: LogEvent) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };
        let json = serde_json::to_string(&entry).context("failed to serialize log entry")?;

        let mut writer = self
            .writer
            .lock()
            .map_err(|_| anyhow::anyhow!("run log writer poisoned"))?;
        writeln!(writer, "{json}").context("failed to write log entry")?;
        writer.flush().context("failed to flush log")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Consume driver events on a background thread: print each one as a line
/// to `out` and mirror it into `log`. The thread ends when every sender is
/// dropped.
pub fn spawn_printer<W>(
    rx: mpsc::Receiver<DriverEvent>,
    mut out: W,
    log: Option<std::sync::Arc<RunLog>>,
) -> thread::JoinHandle<()>
where
    W: Write + Send + 'static,
{
    thread::spawn(move || {
        for event in rx {
            if writeln!(out, "{event}").and_then(|_| out.flush()).is_err() {
                debug!("transcript output closed");
            }
            if let Some(ref log) = log {
                if let Err(e) = log.log(LogEvent::from(&event)) {
                    warn!(error = %e, path = %log.path().display(), "failed to write run log");
                }
            }
        }
    })
}
