//! Wizard process lifecycle.
//!
//! Spawns the tool with all three standard streams piped and handed out as
//! asynchronous handles. The child is killed if the handle is dropped before
//! it exits, which is how an aborted run cleans up after itself.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tracing::{debug, info};

use crate::error::DriveError;

/// How to launch the wizard tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: String,
    pub args: Vec<String>,
    /// Extra environment variables (key, value pairs).
    pub env: Vec<(String, String)>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for ToolInvocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// A running wizard and the streams not yet claimed by the driver.
#[derive(Debug)]
pub struct ProcessHandle {
    child: Child,
    command_line: String,
    work_dir: PathBuf,
    stdin: Option<ChildStdin>,
    stdout: Option<ChildStdout>,
    stderr: Option<ChildStderr>,
    exit: Option<ExitStatus>,
}

impl ProcessHandle {
    /// Start `invocation` inside `work_dir`.
    ///
    /// A missing working directory or a program that cannot be executed is a
    /// spawn failure, distinct from the tool itself reporting an error.
    pub fn spawn(invocation: &ToolInvocation, work_dir: &Path) -> Result<Self, DriveError> {
        if !work_dir.is_dir() {
            return Err(DriveError::WorkDir {
                path: work_dir.to_path_buf(),
            });
        }

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(work_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, val) in &invocation.env {
            cmd.env(key, val);
        }

        info!(
            command = %invocation,
            work_dir = %work_dir.display(),
            "spawning wizard"
        );

        let mut child = cmd.spawn().map_err(|source| DriveError::Spawn {
            program: invocation.program.clone(),
            source,
        })?;
        debug!(pid = ?child.id(), "wizard started");

        Ok(Self {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            command_line: invocation.to_string(),
            work_dir: work_dir.to_path_buf(),
            exit: None,
        })
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    pub fn take_stdin(&mut self) -> Result<ChildStdin, DriveError> {
        self.stdin.take().ok_or_else(|| not_piped("stdin"))
    }

    pub fn take_stdout(&mut self) -> Result<ChildStdout, DriveError> {
        self.stdout.take().ok_or_else(|| not_piped("stdout"))
    }

    pub fn take_stderr(&mut self) -> Result<ChildStderr, DriveError> {
        self.stderr.take().ok_or_else(|| not_piped("stderr"))
    }

    /// Suspend until the process exits. The status is remembered, so calling
    /// this again is cheap.
    pub async fn wait(&mut self) -> Result<ExitStatus, DriveError> {
        if let Some(status) = self.exit {
            return Ok(status);
        }
        let status = self
            .child
            .wait()
            .await
            .map_err(DriveError::io("failed to wait for wizard process"))?;
        info!(code = ?status.code(), success = status.success(), "wizard exited");
        self.exit = Some(status);
        Ok(status)
    }

    /// Exit status, once [`wait`](Self::wait) has observed it.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit
    }

    /// Terminate the process and reap it.
    pub async fn kill(&mut self) -> Result<(), DriveError> {
        if self.exit.is_some() {
            return Ok(());
        }
        self.child
            .kill()
            .await
            .map_err(DriveError::io("failed to kill wizard process"))?;
        self.exit = self.child.try_wait().ok().flatten();
        Ok(())
    }
}

fn not_piped(stream: &'static str) -> DriveError {
    DriveError::Io {
        context: "wizard stream unavailable",
        source: io::Error::other(format!("{stream} is not piped or was already taken")),
    }
}

/// Read a stream to its end as (lossy) text.
pub async fn read_to_string_lossy<R>(reader: &mut R) -> io::Result<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).await?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn sh(script: &str) -> ToolInvocation {
        ToolInvocation::new("sh").arg("-c").arg(script)
    }

    #[test]
    fn invocation_display_joins_program_and_args() {
        let inv = ToolInvocation::new("python3").args(["-m", "briefcase", "new"]);
        assert_eq!(inv.to_string(), "python3 -m briefcase new");
    }

    #[tokio::test]
    async fn spawn_missing_program_is_spawn_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = ProcessHandle::spawn(
            &ToolInvocation::new("definitely-missing-briefcase-pilot-tool"),
            tmp.path(),
        )
        .unwrap_err();
        assert!(matches!(err, DriveError::Spawn { .. }));
    }

    #[tokio::test]
    async fn spawn_in_missing_directory_is_work_dir_error() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("nope");
        let err = ProcessHandle::spawn(&sh("true"), &missing).unwrap_err();
        assert!(matches!(err, DriveError::WorkDir { path } if path == missing));
    }

    #[tokio::test]
    async fn runs_in_working_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::spawn(&sh("pwd"), tmp.path()).unwrap();
        let mut stdout = handle.take_stdout().unwrap();
        let out = read_to_string_lossy(&mut stdout).await.unwrap();
        let status = handle.wait().await.unwrap();
        assert!(status.success());
        let expected = tmp.path().canonicalize().unwrap();
        assert_eq!(
            PathBuf::from(out.trim()).canonicalize().unwrap(),
            expected
        );
    }

    #[tokio::test]
    async fn streams_are_piped_and_exit_code_recorded() {
        let tmp = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::spawn(
            &sh("read line; echo \"got $line\"; echo oops >&2; exit 3"),
            tmp.path(),
        )
        .unwrap();

        let mut stdin = handle.take_stdin().unwrap();
        stdin.write_all(b"hello\n").await.unwrap();
        stdin.flush().await.unwrap();
        drop(stdin);

        let mut stdout = handle.take_stdout().unwrap();
        let mut stderr = handle.take_stderr().unwrap();
        let out = read_to_string_lossy(&mut stdout).await.unwrap();
        let err = read_to_string_lossy(&mut stderr).await.unwrap();
        let status = handle.wait().await.unwrap();

        assert_eq!(out, "got hello\n");
        assert_eq!(err, "oops\n");
        assert_eq!(status.code(), Some(3));
        assert_eq!(handle.exit_status().and_then(|s| s.code()), Some(3));
    }

    #[tokio::test]
    async fn streams_can_only_be_taken_once() {
        let tmp = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::spawn(&sh("true"), tmp.path()).unwrap();
        assert!(handle.take_stdout().is_ok());
        assert!(handle.take_stdout().is_err());
        handle.wait().await.unwrap();
    }

    #[tokio::test]
    async fn kill_stops_a_blocked_wizard() {
        let tmp = tempfile::tempdir().unwrap();
        let mut handle = ProcessHandle::spawn(&sh("read never"), tmp.path()).unwrap();
        handle.kill().await.unwrap();
        let status = handle.wait().await.unwrap();
        assert!(!status.success());
    }
}
