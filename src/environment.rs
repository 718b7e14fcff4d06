//! Environment gates that run before the wizard is spawned.
//!
//! 1. Probe the interpreter (`<python> --version`).
//! 2. Materialize a virtualenv inside the project directory, unless one is
//!    already there or creation is disabled.
//! 3. Install the wizard's packages into it.
//!
//! Each gate is sequential and fatal on failure. Nothing is rolled back: a
//! virtualenv created before a failed install stays on disk and is reused on
//! the next run. The gates are awaited, so dropping the run while one is in
//! flight kills its child.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{EnvironmentConfig, WizardConfig};
use crate::error::DriveError;
use crate::process::ToolInvocation;

/// Where the wizard will run from once the gates have passed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedEnvironment {
    /// Interpreter that runs the wizard module.
    pub python: PathBuf,
    /// The virtualenv, when one is in use.
    pub venv_dir: Option<PathBuf>,
    /// The virtualenv was created by this run.
    pub created: bool,
    /// Packages handed to pip.
    pub installed: Vec<String>,
}

/// Confirm the interpreter runs and return the version it reports.
pub async fn check_interpreter(program: &str) -> Result<String, DriveError> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| {
            DriveError::setup(format!(
                "Python is not installed: could not run `{program} --version` ({e})."
            ))
        })?;

    if !output.status.success() {
        return Err(DriveError::setup(format!(
            "Python is not installed: `{program} --version` exited with {}.",
            output.status
        )));
    }

    // Older interpreters print their version on stderr.
    let version = [&output.stdout, &output.stderr]
        .into_iter()
        .map(|b| String::from_utf8_lossy(b).trim().to_string())
        .find(|s| !s.is_empty())
        .unwrap_or_default();
    info!(program, version = %version, "interpreter available");
    Ok(version)
}

/// Directory holding executables inside a virtualenv.
pub fn venv_bin_dir(venv: &Path) -> PathBuf {
    if cfg!(windows) {
        venv.join("Scripts")
    } else {
        venv.join("bin")
    }
}

/// The virtualenv's own interpreter.
pub fn venv_python(venv: &Path) -> PathBuf {
    venv_bin_dir(venv).join(format!("python{}", std::env::consts::EXE_SUFFIX))
}

/// Create (or reuse) the virtualenv and install the wizard into it.
pub async fn prepare_environment(
    interpreter: &str,
    work_dir: &Path,
    config: &EnvironmentConfig,
) -> Result<PreparedEnvironment, DriveError> {
    if !config.create {
        debug!("virtualenv creation disabled; using the interpreter directly");
        return Ok(PreparedEnvironment {
            python: PathBuf::from(interpreter),
            venv_dir: None,
            created: false,
            installed: Vec::new(),
        });
    }

    let venv = work_dir.join(&config.venv_dir);
    let python = venv_python(&venv);
    let mut created = false;

    if python.is_file() {
        info!(venv = %venv.display(), "reusing existing virtualenv");
    } else {
        info!(venv = %venv.display(), "creating virtualenv");
        let venv_arg = venv.to_string_lossy().to_string();
        run_step(
            "creating virtual environment",
            Command::new(interpreter).args(["-m", "venv", venv_arg.as_str()]),
        )
        .await?;
        created = true;
    }

    if !config.packages.is_empty() {
        info!(packages = ?config.packages, "installing wizard packages");
        run_step(
            "installing packages",
            Command::new(&python)
                .args(["-m", "pip", "install"])
                .args(&config.packages),
        )
        .await?;
    }

    Ok(PreparedEnvironment {
        python,
        venv_dir: Some(venv),
        created,
        installed: config.packages.clone(),
    })
}

/// The command line that starts the wizard in `env`.
pub fn wizard_invocation(env: &PreparedEnvironment, wizard: &WizardConfig) -> ToolInvocation {
    ToolInvocation::new(env.python.to_string_lossy())
        .arg("-m")
        .arg(&wizard.module)
        .args(&wizard.args)
        // Prompts must not sit in the interpreter's pipe buffer.
        .env("PYTHONUNBUFFERED", "1")
        .env("PYTHONIOENCODING", "utf-8")
}

async fn run_step(description: &str, cmd: &mut Command) -> Result<(), DriveError> {
    debug!(step = description, command = ?cmd, "running setup step");
    let output: Output = cmd
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| DriveError::setup(format!("Error {description}: {e}")))?;

    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let detail = stderr.trim();
    Err(DriveError::setup(if detail.is_empty() {
        format!("Error {description}: exited with {}", output.status)
    } else {
        format!("Error {description}: exited with {}\n\n{detail}", output.status)
    }))
}
