//! End-to-end project creation: environment gates, spawn, dispatch.

use std::path::PathBuf;
use std::sync::mpsc;

use tracing::info;

use crate::answers::AnswerSet;
use crate::config::ProjectConfig;
use crate::driver::{DriverEvent, RunOutcome, run_wizard};
use crate::environment::{check_interpreter, prepare_environment, wizard_invocation};
use crate::error::DriveError;
use crate::process::ProcessHandle;

/// Everything one creation run needs from the form.
#[derive(Debug, Clone)]
pub struct ProjectRequest {
    /// Where the wizard runs and the project lands.
    pub work_dir: PathBuf,
    pub answers: AnswerSet,
}

/// Run the whole flow once. The first failure aborts the run and is
/// returned as is; nothing is retried.
pub async fn create_project(
    request: &ProjectRequest,
    config: &ProjectConfig,
    event_tx: Option<mpsc::Sender<DriverEvent>>,
) -> Result<RunOutcome, DriveError> {
    if !request.work_dir.is_dir() {
        return Err(DriveError::WorkDir {
            path: request.work_dir.clone(),
        });
    }

    config
        .validate()
        .map_err(|e| DriveError::setup(format!("{e:#}")))?;
    check_interpreter(&config.interpreter.program).await?;
    let env = prepare_environment(
        &config.interpreter.program,
        &request.work_dir,
        &config.environment,
    )
    .await?;

    let invocation = wizard_invocation(&env, &config.wizard);
    let process = ProcessHandle::spawn(&invocation, &request.work_dir)?;
    info!(pid = ?process.id(), "driving wizard");

    run_wizard(
        &request.answers,
        process,
        &config.driver_config(),
        event_tx,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::ProjectDetails;

    fn request(work_dir: PathBuf) -> ProjectRequest {
        ProjectRequest {
            work_dir,
            answers: ProjectDetails::default().to_answers().unwrap(),
        }
    }

    #[tokio::test]
    async fn missing_directory_fails_before_anything_runs() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("missing");
        let err = create_project(&request(missing.clone()), &ProjectConfig::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::WorkDir { path } if path == missing));
    }

    #[tokio::test]
    async fn missing_interpreter_is_setup_error() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.interpreter.program = "definitely-missing-briefcase-pilot-python".into();

        let err = create_project(&request(tmp.path().to_path_buf()), &config, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::Setup { .. }));
        assert!(!tmp.path().join("venv").exists());
    }

    #[tokio::test]
    async fn markerless_config_fails_before_setup() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ProjectConfig::default();
        config.detector.markers.clear();
        config.interpreter.program = "definitely-missing-briefcase-pilot-python".into();

        let err = create_project(&request(tmp.path().to_path_buf()), &config, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DriveError::Setup { .. }));
        assert!(err.to_string().contains("detector.markers"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_preempts_a_slow_interpreter_probe() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let tmp = tempfile::tempdir().unwrap();
        let python = tmp.path().join("slow-python");
        std::fs::write(&python, "#!/bin/sh\nsleep 2\nexit 1\n").unwrap();
        std::fs::set_permissions(&python, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut config = ProjectConfig::default();
        config.interpreter.program = python.display().to_string();
        let req = request(tmp.path().to_path_buf());

        let started = Instant::now();
        let cancelled = tokio::select! {
            biased;
            _ = tokio::time::sleep(Duration::from_millis(100)) => true,
            _ = create_project(&req, &config, None) => false,
        };

        assert!(cancelled);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
