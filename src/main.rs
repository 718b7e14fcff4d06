use anyhow::{Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, mpsc};
use tracing::{info, warn};

use briefcase_pilot::answers::{FIELD_ORDER_VERSION, FRAMEWORK_OPTIONS, LICENSE_OPTIONS, ordinal};
use briefcase_pilot::cli::{Cli, Command, NewArgs};
use briefcase_pilot::config::ProjectConfig;
use briefcase_pilot::transcript::{LogEvent, RunLog, spawn_printer};
use briefcase_pilot::{ProjectDetails, ProjectRequest, create_project, form, shell_completion};

fn config_source_label(config_path: Option<&Path>) -> String {
    config_path
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(defaults, no .briefcase-pilot/config.toml found)".to_string())
}

fn push_kv(output: &mut String, key: &str, value: impl std::fmt::Display) {
    output.push_str(&format!("  {key:<22} {value}\n"));
}

fn list_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

fn render_config_human(config: &ProjectConfig, config_path: Option<&Path>) -> String {
    let mut output = String::new();
    output.push_str("Interpreter\n");
    push_kv(&mut output, "program", &config.interpreter.program);
    output.push('\n');

    output.push_str("Environment\n");
    push_kv(&mut output, "create", config.environment.create);
    push_kv(&mut output, "venv_dir", &config.environment.venv_dir);
    push_kv(
        &mut output,
        "packages",
        list_or_none(&config.environment.packages),
    );
    output.push('\n');

    output.push_str("Wizard\n");
    push_kv(&mut output, "module", &config.wizard.module);
    push_kv(&mut output, "args", list_or_none(&config.wizard.args));
    output.push('\n');

    output.push_str("Detector\n");
    push_kv(&mut output, "chunk_size", config.detector.chunk_size);
    push_kv(&mut output, "markers", list_or_none(&config.detector.markers));
    output.push('\n');

    output.push_str("Timing\n");
    push_kv(
        &mut output,
        "settle_before",
        format!("{}ms", config.timing.settle_before_millis),
    );
    push_kv(
        &mut output,
        "settle_after",
        format!("{}ms", config.timing.settle_after_millis),
    );
    output.push('\n');

    output.push_str("Answers\n");
    push_kv(&mut output, "email_fallback", &config.answers.email_fallback);
    push_kv(
        &mut output,
        "email_prompt_marker",
        &config.answers.email_prompt_marker,
    );
    output.push('\n');

    output.push_str("Source Path\n");
    push_kv(&mut output, "path", config_source_label(config_path));

    output
}

fn render_config_json(config: &ProjectConfig, config_path: Option<&Path>) -> Result<String> {
    let mut payload = serde_json::to_value(config).context("failed to serialize config")?;
    payload["source_path"] = serde_json::Value::String(config_source_label(config_path));
    serde_json::to_string_pretty(&payload).context("failed to serialize config to JSON")
}

fn render_options() -> String {
    let mut output = format!("Answer order version {FIELD_ORDER_VERSION}\n\nLicense\n");
    for (i, name) in LICENSE_OPTIONS.iter().enumerate() {
        output.push_str(&format!("  {:>2}  {name}\n", ordinal(i)));
    }
    output.push_str("\nGUI Framework\n");
    for (i, name) in FRAMEWORK_OPTIONS.iter().enumerate() {
        output.push_str(&format!("  {:>2}  {name}\n", ordinal(i)));
    }
    output
}

/// Merge answers file, flags, and (optionally) the terminal form.
fn collect_details(args: &NewArgs) -> Result<ProjectDetails> {
    let mut details = match &args.answers {
        Some(path) => ProjectDetails::load(path)?,
        None => ProjectDetails::default(),
    };
    details.merge(args.details());

    if args.interactive {
        details = form::fill_details(details)?;
    }
    Ok(details)
}

fn resolve_dir(args: &NewArgs, cwd: &Path) -> Result<PathBuf> {
    let dir = match &args.dir {
        Some(dir) => dir.clone(),
        None if args.interactive => form::ask_directory(None)?,
        None => anyhow::bail!("Please select a directory for the project (--dir)."),
    };
    Ok(if dir.is_absolute() { dir } else { cwd.join(dir) })
}

fn apply_overrides(config: &mut ProjectConfig, args: &NewArgs) {
    if let Some(ref python) = args.python {
        config.interpreter.program = python.clone();
    }
    if args.no_venv {
        config.environment.create = false;
    }
    if let Some(ms) = args.settle_millis {
        config.timing.settle_before_millis = ms;
        config.timing.settle_after_millis = ms;
    }
}

async fn run_new(args: NewArgs, mut config: ProjectConfig, cwd: &Path) -> Result<ExitCode> {
    let details = collect_details(&args)?;
    let work_dir = resolve_dir(&args, cwd)?;
    apply_overrides(&mut config, &args);

    let answers = match details.to_answers() {
        Ok(answers) => answers,
        Err(e) => {
            eprintln!("{}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };

    let run_log = match &args.log {
        Some(path) => Some(Arc::new(RunLog::open(&cwd.join(path))?)),
        None => None,
    };
    let log_event = |event: LogEvent| {
        if let Some(ref log) = run_log {
            if let Err(e) = log.log(event) {
                warn!(error = %e, "failed to write run log");
            }
        }
    };
    log_event(LogEvent::RunStarted {
        work_dir: work_dir.display().to_string(),
    });

    let (event_tx, event_rx) = mpsc::channel();
    let printer = spawn_printer(event_rx, std::io::stdout(), run_log.clone());

    let request = ProjectRequest { work_dir, answers };
    let result = tokio::select! {
        result = create_project(&request, &config, Some(event_tx)) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };
    // The sender went away with the finished (or cancelled) run.
    if printer.join().is_err() {
        warn!("transcript printer panicked");
    }

    match result {
        Some(Ok(outcome)) => {
            log_event(LogEvent::RunCompleted {
                answers_sent: outcome.summary.sent,
            });
            if let Some(ref prompt) = outcome.summary.unanswered_prompt {
                warn!(prompt = %prompt, "the wizard asked a question that had no answer");
            }
            println!("Project created successfully!");
            Ok(ExitCode::SUCCESS)
        }
        Some(Err(e)) => {
            log_event(LogEvent::RunFailed {
                reason: e.to_string(),
            });
            eprintln!("{}", e.user_message());
            Ok(ExitCode::FAILURE)
        }
        None => {
            log_event(LogEvent::RunFailed {
                reason: "interrupted".to_string(),
            });
            eprintln!("Interrupted; the wizard process was stopped.");
            Ok(ExitCode::from(130))
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let is_quiet_command = matches!(
        &cli.command,
        Command::Config { .. } | Command::Options | Command::Completions { .. }
    );

    let filter = match cli.verbose {
        0 if is_quiet_command => "briefcase_pilot=warn",
        0 => "briefcase_pilot=info",
        1 => "briefcase_pilot=debug",
        _ => "briefcase_pilot=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cwd = std::env::current_dir().context("failed to get current directory (was it deleted?)")?;
    let (config, config_path) = ProjectConfig::load(&cwd)?;

    if !is_quiet_command || cli.verbose > 0 {
        match config_path {
            Some(ref p) => info!("loaded config from {}", p.display()),
            None => info!("no .briefcase-pilot/config.toml found, using defaults"),
        }
    }

    match cli.command {
        Command::New(args) => return run_new(args, config, &cwd).await,
        Command::Options => print!("{}", render_options()),
        Command::Config { json } => {
            if json {
                println!("{}", render_config_json(&config, config_path.as_deref())?);
            } else {
                print!("{}", render_config_human(&config, config_path.as_deref()));
            }
        }
        Command::Completions { shell } => {
            shell_completion::write(shell, &mut std::io::stdout())?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_config_human_groups_sections() {
        let config = ProjectConfig::default();
        let rendered = render_config_human(&config, None);

        assert!(rendered.contains("Interpreter"));
        assert!(rendered.contains("Environment"));
        assert!(rendered.contains("Timing"));
        assert!(rendered.contains("500ms"));
        assert!(rendered.contains(":, ?"));
        assert!(rendered.contains("(defaults, no .briefcase-pilot/config.toml found)"));
    }

    #[test]
    fn render_config_json_is_valid_and_contains_expected_fields() {
        let config = ProjectConfig::default();
        let json = render_config_json(&config, None).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["wizard"]["module"], "briefcase");
        assert_eq!(value["environment"]["create"], true);
        assert_eq!(value["timing"]["settle_before_millis"], 500);
        assert_eq!(value["answers"]["email_fallback"], "example@example.com");
        assert_eq!(
            value["source_path"],
            "(defaults, no .briefcase-pilot/config.toml found)"
        );
    }

    #[test]
    fn render_options_numbers_from_one() {
        let rendered = render_options();
        assert!(rendered.contains(" 3  Apache Software License"));
        assert!(rendered.contains(" 1  Toga"));
        assert!(rendered.contains(" 9  Other"));
    }

    #[test]
    fn flags_override_answers_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("answers.toml");
        std::fs::write(&path, "formal_name = \"From File\"\nauthor = \"File Author\"\n").unwrap();

        let args = NewArgs {
            answers: Some(path),
            author: Some("Flag Author".into()),
            ..NewArgs::default()
        };
        let details = collect_details(&args).unwrap();
        assert_eq!(details.formal_name, "From File");
        assert_eq!(details.author, "Flag Author");
    }

    #[test]
    fn relative_dir_resolves_against_cwd() {
        let args = NewArgs {
            dir: Some(PathBuf::from("projects")),
            ..NewArgs::default()
        };
        let dir = resolve_dir(&args, Path::new("/home/jane")).unwrap();
        assert_eq!(dir, PathBuf::from("/home/jane/projects"));
    }

    #[test]
    fn missing_dir_without_form_is_an_error() {
        let err = resolve_dir(&NewArgs::default(), Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("Please select a directory"));
    }

    #[test]
    fn overrides_apply_to_config() {
        let mut config = ProjectConfig::default();
        let args = NewArgs {
            python: Some("python3.12".into()),
            no_venv: true,
            settle_millis: Some(0),
            ..NewArgs::default()
        };
        apply_overrides(&mut config, &args);
        assert_eq!(config.interpreter.program, "python3.12");
        assert!(!config.environment.create);
        assert_eq!(config.timing.settle_before_millis, 0);
        assert_eq!(config.timing.settle_after_millis, 0);
    }
}
