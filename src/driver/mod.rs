//! Answer dispatch: drives the wizard one prompt at a time.
//!
//! For every answer, wait for the next prompt, apply the substitution rules,
//! write the reply (or a blank line to accept the default), flush, and
//! advance. Answers are paired with prompts purely by position. Once all
//! answers are sent, trailing output is drained, stdin is closed, and the
//! exit status decides the outcome.
//!
//! The wizard gives no readiness signal, so a short settling delay brackets
//! every write. This is an approximation for slow-starting tools, not a
//! synchronization guarantee.

use std::fmt;
use std::sync::mpsc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use crate::answers::{AnswerRules, AnswerSet, Field, Reply};
use crate::detector::{DEFAULT_CHUNK_SIZE, PromptDetector};
use crate::error::DriveError;
use crate::process::{ProcessHandle, read_to_string_lossy};
use crate::prompt::PromptMarkers;

/// Events emitted during a run for the live transcript and the run log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverEvent {
    /// The wizard process was started.
    Launched { command: String, work_dir: String },
    /// A complete line of wizard output (or the leftover at end of stream).
    Output(String),
    /// A prompt awaiting input was detected.
    PromptDetected(String),
    /// A malformed email answer was replaced by the fallback.
    EmailSubstituted { original: String, fallback: String },
    /// An answer was written to the wizard. `index` is 1-based.
    AnswerSent {
        index: usize,
        total: usize,
        field: Field,
        answer: String,
    },
    /// A bare newline was written to accept the wizard's default.
    BlankAnswerSent {
        index: usize,
        total: usize,
        field: Field,
    },
    /// The wizard closed its output before every answer was sent.
    OutputClosedEarly { sent: usize, total: usize },
    /// The wizard process exited.
    Exited { code: Option<i32> },
}

impl fmt::Display for DriverEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverEvent::Launched { command, work_dir } => {
                write!(f, "Running command: {command} (in {work_dir})")
            }
            DriverEvent::Output(line) => f.write_str(line),
            DriverEvent::PromptDetected(prompt) => write!(f, "Prompt received: {prompt}"),
            DriverEvent::EmailSubstituted { original, fallback } => {
                write!(f, "Invalid email '{original}', sending {fallback} instead")
            }
            DriverEvent::AnswerSent {
                index,
                total,
                answer,
                ..
            } => write!(f, "Sending answer {index}/{total}: {answer}"),
            DriverEvent::BlankAnswerSent { index, total, .. } => {
                write!(f, "Sending empty answer {index}/{total}")
            }
            DriverEvent::OutputClosedEarly { sent, total } => {
                write!(f, "Wizard closed its output after {sent} of {total} answers")
            }
            DriverEvent::Exited { code: Some(code) } => write!(f, "Wizard exited with code {code}"),
            DriverEvent::Exited { code: None } => f.write_str("Wizard was terminated by a signal"),
        }
    }
}

/// Tunables for one run.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub markers: PromptMarkers,
    pub chunk_size: usize,
    /// Pause between seeing a prompt and answering it.
    pub settle_before: Duration,
    /// Pause after an answer is flushed.
    pub settle_after: Duration,
    pub rules: AnswerRules,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            markers: PromptMarkers::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            settle_before: Duration::from_millis(500),
            settle_after: Duration::from_millis(500),
            rules: AnswerRules::default(),
        }
    }
}

/// What happened during the prompt/answer exchange.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExchangeSummary {
    /// Lines written, blank ones included.
    pub sent: usize,
    /// How many of those were bare newlines.
    pub blank: usize,
    /// How many email answers were replaced by the fallback.
    pub substituted: usize,
    /// The wizard's output ended before all answers were sent.
    pub closed_early: bool,
    /// A prompt the wizard printed after the last answer, if any.
    pub unanswered_prompt: Option<String>,
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub summary: ExchangeSummary,
    pub exit_code: i32,
}

/// Answer every prompt in order, then read once more to pick up trailing
/// output.
///
/// Exactly one reply is written per answer, each flushed before the next
/// prompt is awaited. If the wizard's output closes early, the remaining
/// answers are skipped and the summary says so.
pub async fn exchange<R, W>(
    answers: &AnswerSet,
    detector: &mut PromptDetector<R>,
    input: &mut W,
    config: &DriverConfig,
    event_tx: Option<&mpsc::Sender<DriverEvent>>,
) -> Result<ExchangeSummary, DriveError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let emit = |event: DriverEvent| {
        if let Some(tx) = event_tx {
            let _ = tx.send(event);
        }
    };

    let total = answers.len();
    let mut summary = ExchangeSummary::default();

    for (i, (field, answer)) in answers.iter().enumerate() {
        let index = i + 1;
        let prompt = detector
            .read_next_prompt()
            .await
            .map_err(DriveError::io("failed to read wizard output"))?;

        if prompt.at_eof {
            warn!(sent = summary.sent, total, "wizard output closed before all answers were sent");
            emit(DriverEvent::OutputClosedEarly {
                sent: summary.sent,
                total,
            });
            summary.closed_early = true;
            return Ok(summary);
        }
        info!(index, field = %field, prompt = %prompt.text, "prompt received");

        tokio::time::sleep(config.settle_before).await;

        let prepared = config.rules.prepare(&prompt.text, answer);
        if prepared.substituted {
            debug!(original = %answer, "substituting fallback email");
            emit(DriverEvent::EmailSubstituted {
                original: answer.to_string(),
                fallback: config.rules.email_fallback.clone(),
            });
            summary.substituted += 1;
        }

        input
            .write_all(prepared.reply.wire().as_bytes())
            .await
            .map_err(DriveError::io("failed to write answer to wizard"))?;
        input
            .flush()
            .await
            .map_err(DriveError::io("failed to flush answer to wizard"))?;

        match prepared.reply {
            Reply::Line(answer) => emit(DriverEvent::AnswerSent {
                index,
                total,
                field,
                answer,
            }),
            Reply::Blank => {
                summary.blank += 1;
                emit(DriverEvent::BlankAnswerSent {
                    index,
                    total,
                    field,
                });
            }
        }
        summary.sent += 1;
        debug!(index, total, "answer sent");

        tokio::time::sleep(config.settle_after).await;
    }

    let trailing = detector
        .read_next_prompt()
        .await
        .map_err(DriveError::io("failed to read wizard output"))?;
    if !trailing.at_eof {
        warn!(prompt = %trailing.text, "wizard asked for more input than was provided");
        summary.unanswered_prompt = Some(trailing.text);
    }

    Ok(summary)
}

/// Drive a spawned wizard to completion.
///
/// Success means every prompt was answered (or the wizard stopped asking)
/// and the process exited with code 0. A non-zero exit is a
/// [`DriveError::ToolFailure`] carrying the wizard's stderr verbatim.
pub async fn run_wizard(
    answers: &AnswerSet,
    mut process: ProcessHandle,
    config: &DriverConfig,
    event_tx: Option<mpsc::Sender<DriverEvent>>,
) -> Result<RunOutcome, DriveError> {
    let mut stdin = process.take_stdin()?;
    let stdout = process.take_stdout()?;
    let mut stderr = process.take_stderr()?;

    if let Some(ref tx) = event_tx {
        let _ = tx.send(DriverEvent::Launched {
            command: process.command_line().to_string(),
            work_dir: process.work_dir().display().to_string(),
        });
    }

    let mut detector = PromptDetector::new(
        stdout,
        config.markers.clone(),
        config.chunk_size,
        event_tx.clone(),
    );

    let summary = exchange(answers, &mut detector, &mut stdin, config, event_tx.as_ref()).await?;

    // Closing stdin makes a wizard that still wants input fail instead of
    // hanging. Output and stderr are read while waiting so the child never
    // blocks on a full pipe.
    drop(stdin);
    let (drained, status, stderr_text) = tokio::join!(
        detector.drain(),
        process.wait(),
        read_to_string_lossy(&mut stderr),
    );
    drained.map_err(DriveError::io("failed to read wizard output"))?;
    let status = status?;
    let stderr_text = stderr_text.map_err(DriveError::io("failed to read wizard stderr"))?;

    if let Some(ref tx) = event_tx {
        let _ = tx.send(DriverEvent::Exited {
            code: status.code(),
        });
    }

    if !status.success() {
        return Err(DriveError::ToolFailure {
            code: status.code(),
            stderr: stderr_text,
        });
    }
    if !stderr_text.is_empty() {
        debug!(stderr = %stderr_text, "wizard wrote to stderr despite succeeding");
    }

    info!(
        sent = summary.sent,
        blank = summary.blank,
        substituted = summary.substituted,
        "wizard completed"
    );
    Ok(RunOutcome {
        summary,
        exit_code: status.code().unwrap_or(0),
    })
}
