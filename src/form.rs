//! Terminal form for collecting project details.
//!
//! Walks the fields in wizard order, pre-filled with whatever was already
//! supplied on the command line or in an answers file. The form only
//! produces a [`ProjectDetails`] value; it never talks to the wizard.

use std::path::PathBuf;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

use crate::answers::{FIELD_ORDER, FRAMEWORK_OPTIONS, Field, LICENSE_OPTIONS, ProjectDetails};

/// Ask for every field, starting from `details`.
pub fn fill_details(mut details: ProjectDetails) -> Result<ProjectDetails> {
    let theme = ColorfulTheme::default();

    for field in FIELD_ORDER {
        match field {
            Field::License => {
                let current = details.license_index().unwrap_or(0);
                let idx = select(&theme, field, &LICENSE_OPTIONS, current)?;
                details.license = Some(LICENSE_OPTIONS[idx].to_string());
            }
            Field::Framework => {
                let current = details.framework_index().unwrap_or(0);
                let idx = select(&theme, field, &FRAMEWORK_OPTIONS, current)?;
                details.framework = Some(FRAMEWORK_OPTIONS[idx].to_string());
            }
            text_field => {
                let Some(slot) = details.text_mut(text_field) else {
                    continue;
                };
                let value: String = Input::with_theme(&theme)
                    .with_prompt(text_field.label())
                    .with_initial_text(slot.as_str())
                    .allow_empty(true)
                    .interact_text()
                    .with_context(|| format!("failed to read {}", text_field.label()))?;
                *slot = value;
            }
        }
    }

    Ok(details)
}

/// Ask for the directory the project is created in.
pub fn ask_directory(initial: Option<&str>) -> Result<PathBuf> {
    let theme = ColorfulTheme::default();
    let value: String = Input::with_theme(&theme)
        .with_prompt("Select Directory")
        .with_initial_text(initial.unwrap_or_default())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Please select a directory for the project.")
            } else {
                Ok(())
            }
        })
        .interact_text()
        .context("failed to read project directory")?;
    Ok(PathBuf::from(value.trim()))
}

fn select(theme: &ColorfulTheme, field: Field, options: &[&str], current: usize) -> Result<usize> {
    Select::with_theme(theme)
        .with_prompt(field.label())
        .items(options)
        .default(current.min(options.len().saturating_sub(1)))
        .interact()
        .with_context(|| format!("failed to read {}", field.label()))
}
