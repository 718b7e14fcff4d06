use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::answers::ProjectDetails;

#[derive(Parser, Debug)]
#[command(
    name = "briefcase-pilot",
    about = "Create a Briefcase project by answering `briefcase new` for you",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new project by driving the wizard
    New(NewArgs),

    /// List the license and framework options with the numbers sent to the wizard
    Options,

    /// Show the effective configuration
    Config {
        /// Emit JSON instead of the human-readable view
        #[arg(long)]
        json: bool,
    },

    /// Print a shell completion script
    Completions {
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Args, Debug, Default)]
pub struct NewArgs {
    /// Directory the project is created in
    #[arg(long, short = 'd')]
    pub dir: Option<PathBuf>,

    /// TOML file with project details; flags override its values
    #[arg(long)]
    pub answers: Option<PathBuf>,

    /// Review and complete every field in a terminal form before running
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Append a JSON-lines run log to this file
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Interpreter to probe and build the virtualenv with
    #[arg(long)]
    pub python: Option<String>,

    /// Run the wizard with the interpreter directly instead of a virtualenv
    #[arg(long)]
    pub no_venv: bool,

    /// Settling delay before and after each answer, in milliseconds
    #[arg(long)]
    pub settle_millis: Option<u64>,

    #[arg(long)]
    pub formal_name: Option<String>,
    #[arg(long)]
    pub app_name: Option<String>,
    #[arg(long)]
    pub bundle_id: Option<String>,
    #[arg(long)]
    pub project_name: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub author: Option<String>,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub url: Option<String>,

    /// License name or 1-based number (see `options`)
    #[arg(long)]
    pub license: Option<String>,

    /// GUI framework name or 1-based number (see `options`)
    #[arg(long)]
    pub framework: Option<String>,
}

impl NewArgs {
    /// Project details given directly as flags.
    pub fn details(&self) -> ProjectDetails {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        ProjectDetails {
            formal_name: text(&self.formal_name),
            app_name: text(&self.app_name),
            bundle_id: text(&self.bundle_id),
            project_name: text(&self.project_name),
            description: text(&self.description),
            author: text(&self.author),
            email: text(&self.email),
            url: text(&self.url),
            license: self.license.clone(),
            framework: self.framework.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}
