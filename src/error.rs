//! Error taxonomy for a project-creation run.
//!
//! Every failure surfaces exactly once at the top of the flow. Nothing here
//! is retried, and partial progress (an already-created virtualenv, say) is
//! left in place.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::answers::Field;

#[derive(Error, Debug)]
pub enum DriveError {
    /// Interpreter missing, virtualenv creation or tool installation failed.
    #[error("{message}")]
    Setup { message: String },

    /// The working directory handed to the tool is unusable.
    #[error("working directory {} does not exist or is not a directory", path.display())]
    WorkDir { path: PathBuf },

    /// The tool invocation could not be started at all.
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The tool ran and exited unsuccessfully. Displays the captured error
    /// stream verbatim.
    #[error("{stderr}")]
    ToolFailure { code: Option<i32>, stderr: String },

    /// An answer that cannot be sent as a single protocol line.
    #[error("invalid answer for {field}: {reason}")]
    InvalidAnswer { field: Field, reason: String },

    /// Stream fault while talking to the tool.
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: io::Error,
    },
}

impl DriveError {
    pub(crate) fn setup(message: impl Into<String>) -> Self {
        DriveError::Setup {
            message: message.into(),
        }
    }

    pub(crate) fn io(context: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| DriveError::Io { context, source }
    }

    /// Message shown to the user when the run is aborted by this error.
    pub fn user_message(&self) -> String {
        match self {
            DriveError::Setup { message } => message.clone(),
            DriveError::WorkDir { .. } | DriveError::Spawn { .. } => {
                format!("Error starting the wizard: {self}")
            }
            DriveError::ToolFailure { stderr, .. } => {
                format!("Error creating project:\n\n{stderr}")
            }
            DriveError::InvalidAnswer { .. } => self.to_string(),
            DriveError::Io { .. } => format!("An unexpected error occurred: {self}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_displays_stderr_verbatim() {
        let err = DriveError::ToolFailure {
            code: Some(1),
            stderr: "Traceback (most recent call last):\n  boom\n".to_string(),
        };
        assert_eq!(err.to_string(), "Traceback (most recent call last):\n  boom\n");
        assert_eq!(
            err.user_message(),
            "Error creating project:\n\nTraceback (most recent call last):\n  boom\n"
        );
    }

    #[test]
    fn io_errors_are_reported_as_unexpected() {
        let err = DriveError::io("failed to write answer")(io::Error::new(
            io::ErrorKind::BrokenPipe,
            "pipe closed",
        ));
        assert!(err.user_message().starts_with("An unexpected error occurred:"));
        assert!(err.user_message().contains("failed to write answer"));
    }

    #[test]
    fn setup_message_is_passed_through() {
        let err = DriveError::setup("Python is not installed.");
        assert_eq!(err.user_message(), "Python is not installed.");
    }

    #[test]
    fn invalid_answer_names_the_field() {
        let err = DriveError::InvalidAnswer {
            field: Field::Email,
            reason: "contains a line break".to_string(),
        };
        assert_eq!(err.to_string(), "invalid answer for email: contains a line break");
    }
}
