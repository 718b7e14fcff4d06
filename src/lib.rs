//! Drive the interactive `briefcase new` wizard from pre-collected answers.
//!
//! The wizard is spawned with piped standard streams. Its output is read
//! incrementally; a trailing unterminated fragment containing `:` or `?` is
//! taken to be a prompt, and the next answer is written back. Answers are
//! matched to prompts by position only.

pub mod answers;
pub mod cli;
pub mod config;
pub mod detector;
pub mod driver;
pub mod environment;
pub mod error;
pub mod form;
pub mod process;
pub mod project;
pub mod prompt;
pub mod shell_completion;
pub mod transcript;

#[cfg(test)]
pub(crate) mod testing;

pub use answers::{AnswerSet, Field, ProjectDetails};
pub use driver::{DriverConfig, DriverEvent, RunOutcome, run_wizard};
pub use error::DriveError;
pub use project::{ProjectRequest, create_project};
