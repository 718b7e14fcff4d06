use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::answers::{AnswerRules, DEFAULT_EMAIL_FALLBACK, DEFAULT_EMAIL_PROMPT_MARKER};
use crate::detector::DEFAULT_CHUNK_SIZE;
use crate::driver::DriverConfig;
use crate::prompt::PromptMarkers;

const CONFIG_FILENAME: &str = "config.toml";
const CONFIG_DIR: &str = ".briefcase-pilot";

fn default_interpreter_program() -> String {
    if cfg!(windows) {
        "python".to_string()
    } else {
        "python3".to_string()
    }
}

fn default_environment_create() -> bool {
    true
}

fn default_environment_venv_dir() -> String {
    "venv".to_string()
}

fn default_environment_packages() -> Vec<String> {
    vec!["briefcase".to_string()]
}

fn default_wizard_module() -> String {
    "briefcase".to_string()
}

fn default_wizard_args() -> Vec<String> {
    vec!["new".to_string()]
}

fn default_detector_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_detector_markers() -> Vec<String> {
    vec![":".to_string(), "?".to_string()]
}

fn default_timing_settle_millis() -> u64 {
    500
}

fn default_answers_email_fallback() -> String {
    DEFAULT_EMAIL_FALLBACK.to_string()
}

fn default_answers_email_prompt_marker() -> String {
    DEFAULT_EMAIL_PROMPT_MARKER.to_string()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InterpreterConfig {
    /// Interpreter used to probe, create the virtualenv, and (without a
    /// virtualenv) run the wizard.
    #[serde(default = "default_interpreter_program")]
    pub program: String,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            program: default_interpreter_program(),
        }
    }
}

/// ```toml
/// [environment]
/// create = true
/// venv_dir = "venv"
/// packages = ["briefcase"]
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnvironmentConfig {
    #[serde(default = "default_environment_create")]
    pub create: bool,
    /// Relative to the project's working directory.
    #[serde(default = "default_environment_venv_dir")]
    pub venv_dir: String,
    #[serde(default = "default_environment_packages")]
    pub packages: Vec<String>,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            create: default_environment_create(),
            venv_dir: default_environment_venv_dir(),
            packages: default_environment_packages(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WizardConfig {
    /// Python module run with `-m`.
    #[serde(default = "default_wizard_module")]
    pub module: String,
    #[serde(default = "default_wizard_args")]
    pub args: Vec<String>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            module: default_wizard_module(),
            args: default_wizard_args(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorSettings {
    #[serde(default = "default_detector_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_detector_markers")]
    pub markers: Vec<String>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            chunk_size: default_detector_chunk_size(),
            markers: default_detector_markers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimingConfig {
    #[serde(default = "default_timing_settle_millis")]
    pub settle_before_millis: u64,
    #[serde(default = "default_timing_settle_millis")]
    pub settle_after_millis: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_before_millis: default_timing_settle_millis(),
            settle_after_millis: default_timing_settle_millis(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnswersConfig {
    #[serde(default = "default_answers_email_fallback")]
    pub email_fallback: String,
    #[serde(default = "default_answers_email_prompt_marker")]
    pub email_prompt_marker: String,
}

impl Default for AnswersConfig {
    fn default() -> Self {
        Self {
            email_fallback: default_answers_email_fallback(),
            email_prompt_marker: default_answers_email_prompt_marker(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub interpreter: InterpreterConfig,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub detector: DetectorSettings,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub answers: AnswersConfig,
}

impl ProjectConfig {
    /// Search upward from `start` for a `.briefcase-pilot/config.toml` file
    /// and load it. Returns the default config if no file is found.
    pub fn load(start: &Path) -> Result<(Self, Option<PathBuf>)> {
        if let Some(path) = Self::find_config_file(start) {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let config: ProjectConfig = toml::from_str(&contents)
                .with_context(|| format!("failed to parse {}", path.display()))?;
            config
                .validate()
                .with_context(|| format!("invalid config in {}", path.display()))?;
            Ok((config, Some(path)))
        } else {
            Ok((ProjectConfig::default(), None))
        }
    }

    /// Reject settings that would leave the driver waiting forever.
    pub fn validate(&self) -> Result<()> {
        if self.detector.markers.iter().all(|m| m.is_empty()) {
            anyhow::bail!(
                "detector.markers must contain at least one non-empty marker; without one no prompt is ever recognized"
            );
        }
        Ok(())
    }

    fn find_config_file(start: &Path) -> Option<PathBuf> {
        let mut dir = start.to_path_buf();
        loop {
            let candidate = dir.join(CONFIG_DIR).join(CONFIG_FILENAME);
            if candidate.is_file() {
                return Some(candidate);
            }
            if !dir.pop() {
                return None;
            }
        }
    }

    /// Protocol settings for the answer dispatcher.
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            markers: PromptMarkers::new(self.detector.markers.iter().cloned()),
            chunk_size: self.detector.chunk_size,
            settle_before: Duration::from_millis(self.timing.settle_before_millis),
            settle_after: Duration::from_millis(self.timing.settle_after_millis),
            rules: AnswerRules {
                email_prompt_marker: self.answers.email_prompt_marker.clone(),
                email_fallback: self.answers.email_fallback.clone(),
            },
        }
    }
}
