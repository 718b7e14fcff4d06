//! Answer source for the `briefcase new` wizard.
//!
//! The wizard asks its questions in a fixed order and the driver answers
//! positionally: the n-th prompt receives the n-th answer. Nothing checks
//! that a prompt actually asks for the field we think it does, so the order
//! and the option tables below are the contract with the tool. Bump
//! [`FIELD_ORDER_VERSION`] whenever either changes.

use std::fmt;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DriveError;

/// Revision of [`FIELD_ORDER`], [`LICENSE_OPTIONS`] and [`FRAMEWORK_OPTIONS`].
pub const FIELD_ORDER_VERSION: u32 = 1;

/// Number of answers the wizard consumes.
pub const FIELD_COUNT: usize = 10;

/// Address substituted for a malformed email answer.
pub const DEFAULT_EMAIL_FALLBACK: &str = "example@example.com";

/// Substring that identifies the email prompt.
pub const DEFAULT_EMAIL_PROMPT_MARKER: &str = "Email";

/// License choices, in the order the wizard numbers them.
pub const LICENSE_OPTIONS: [&str; 9] = [
    "BSD license",
    "MIT license",
    "Apache Software License",
    "GNU General Public License v2 (GPLv2)",
    "GNU General Public License v2 or later (GPLv2+)",
    "GNU General Public License v3 (GPLv3)",
    "GNU General Public License v3 or later (GPLv3+)",
    "Proprietary",
    "Other",
];

/// GUI framework choices, in the order the wizard numbers them.
pub const FRAMEWORK_OPTIONS: [&str; 5] = ["Toga", "PySide6", "Pygame", "Console", "None"];

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.-]+@[\w.-]+\.\w+$").expect("email pattern compiles"));

/// Identity of one answer slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    FormalName,
    AppName,
    BundleId,
    ProjectName,
    Description,
    Author,
    Email,
    Url,
    License,
    Framework,
}

/// The order in which the wizard prompts for each field.
pub const FIELD_ORDER: [Field; FIELD_COUNT] = [
    Field::FormalName,
    Field::AppName,
    Field::BundleId,
    Field::ProjectName,
    Field::Description,
    Field::Author,
    Field::Email,
    Field::Url,
    Field::License,
    Field::Framework,
];

impl Field {
    pub fn as_str(self) -> &'static str {
        match self {
            Field::FormalName => "formal_name",
            Field::AppName => "app_name",
            Field::BundleId => "bundle_id",
            Field::ProjectName => "project_name",
            Field::Description => "description",
            Field::Author => "author",
            Field::Email => "email",
            Field::Url => "url",
            Field::License => "license",
            Field::Framework => "framework",
        }
    }

    /// Human-readable label used by the terminal form.
    pub fn label(self) -> &'static str {
        match self {
            Field::FormalName => "Formal Name",
            Field::AppName => "App Name",
            Field::BundleId => "Bundle Identifier",
            Field::ProjectName => "Project Name",
            Field::Description => "Description",
            Field::Author => "Author",
            Field::Email => "Author's Email",
            Field::Url => "Application URL",
            Field::License => "Project License",
            Field::Framework => "GUI Framework",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Project metadata as collected by a form, before serialization.
///
/// `license` and `framework` accept either an option label
/// (`"MIT license"`, case-insensitive) or a 1-based ordinal (`"2"`). When
/// absent, the first option is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectDetails {
    pub formal_name: String,
    pub app_name: String,
    pub bundle_id: String,
    pub project_name: String,
    pub description: String,
    pub author: String,
    pub email: String,
    pub url: String,
    pub license: Option<String>,
    pub framework: Option<String>,
}

impl ProjectDetails {
    /// Load details from a TOML answers file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    /// Overlay every non-empty value from `other` onto `self`.
    pub fn merge(&mut self, other: ProjectDetails) {
        fn take(dst: &mut String, src: String) {
            if !src.is_empty() {
                *dst = src;
            }
        }
        take(&mut self.formal_name, other.formal_name);
        take(&mut self.app_name, other.app_name);
        take(&mut self.bundle_id, other.bundle_id);
        take(&mut self.project_name, other.project_name);
        take(&mut self.description, other.description);
        take(&mut self.author, other.author);
        take(&mut self.email, other.email);
        take(&mut self.url, other.url);
        if other.license.is_some() {
            self.license = other.license;
        }
        if other.framework.is_some() {
            self.framework = other.framework;
        }
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::FormalName => Some(&self.formal_name),
            Field::AppName => Some(&self.app_name),
            Field::BundleId => Some(&self.bundle_id),
            Field::ProjectName => Some(&self.project_name),
            Field::Description => Some(&self.description),
            Field::Author => Some(&self.author),
            Field::Email => Some(&self.email),
            Field::Url => Some(&self.url),
            Field::License | Field::Framework => None,
        }
    }

    pub fn text_mut(&mut self, field: Field) -> Option<&mut String> {
        match field {
            Field::FormalName => Some(&mut self.formal_name),
            Field::AppName => Some(&mut self.app_name),
            Field::BundleId => Some(&mut self.bundle_id),
            Field::ProjectName => Some(&mut self.project_name),
            Field::Description => Some(&mut self.description),
            Field::Author => Some(&mut self.author),
            Field::Email => Some(&mut self.email),
            Field::Url => Some(&mut self.url),
            Field::License | Field::Framework => None,
        }
    }

    /// 0-based index into [`LICENSE_OPTIONS`].
    pub fn license_index(&self) -> Result<usize, DriveError> {
        choice_index(Field::License, &LICENSE_OPTIONS, self.license.as_deref())
    }

    /// 0-based index into [`FRAMEWORK_OPTIONS`].
    pub fn framework_index(&self) -> Result<usize, DriveError> {
        choice_index(Field::Framework, &FRAMEWORK_OPTIONS, self.framework.as_deref())
    }

    /// Serialize into the positional answers the wizard expects.
    pub fn to_answers(&self) -> Result<AnswerSet, DriveError> {
        let mut values: [String; FIELD_COUNT] = Default::default();
        for (slot, field) in values.iter_mut().zip(FIELD_ORDER) {
            *slot = match field {
                Field::License => ordinal(self.license_index()?),
                Field::Framework => ordinal(self.framework_index()?),
                other => self.text(other).unwrap_or_default().to_string(),
            };
        }
        AnswerSet::new(values)
    }
}

/// The wizard numbers its options from 1.
pub fn ordinal(index: usize) -> String {
    (index + 1).to_string()
}

fn choice_index(field: Field, options: &[&str], raw: Option<&str>) -> Result<usize, DriveError> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(0);
    };

    if let Ok(n) = raw.parse::<usize>() {
        if (1..=options.len()).contains(&n) {
            return Ok(n - 1);
        }
        return Err(DriveError::InvalidAnswer {
            field,
            reason: format!("option {n} is out of range 1..={}", options.len()),
        });
    }

    options
        .iter()
        .position(|o| o.eq_ignore_ascii_case(raw))
        .ok_or_else(|| DriveError::InvalidAnswer {
            field,
            reason: format!("unknown option '{raw}'"),
        })
}

/// Exactly [`FIELD_COUNT`] answers in [`FIELD_ORDER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerSet {
    values: [String; FIELD_COUNT],
}

impl AnswerSet {
    /// Every answer must fit on one input line.
    pub fn new(values: [String; FIELD_COUNT]) -> Result<Self, DriveError> {
        for (value, field) in values.iter().zip(FIELD_ORDER) {
            if value.contains(['\n', '\r']) {
                return Err(DriveError::InvalidAnswer {
                    field,
                    reason: "contains a line break".to_string(),
                });
            }
        }
        Ok(Self { values })
    }

    pub fn get(&self, field: Field) -> &str {
        let idx = FIELD_ORDER
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        &self.values[idx]
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &str)> {
        FIELD_ORDER
            .into_iter()
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        FIELD_COUNT
    }

    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Substitution rules applied to an answer right before it is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRules {
    pub email_prompt_marker: String,
    pub email_fallback: String,
}

impl Default for AnswerRules {
    fn default() -> Self {
        Self {
            email_prompt_marker: DEFAULT_EMAIL_PROMPT_MARKER.to_string(),
            email_fallback: DEFAULT_EMAIL_FALLBACK.to_string(),
        }
    }
}

/// What actually goes down the wire for one prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// A non-empty answer.
    Line(String),
    /// Accept the tool's default.
    Blank,
}

impl Reply {
    /// Bytes written to the tool's stdin.
    pub fn wire(&self) -> String {
        match self {
            Reply::Line(answer) => format!("{answer}\n"),
            Reply::Blank => "\n".to_string(),
        }
    }
}

/// Result of applying [`AnswerRules`] to one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedReply {
    pub reply: Reply,
    /// Set when the malformed email was replaced by the fallback.
    pub substituted: bool,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

impl AnswerRules {
    pub fn prepare(&self, prompt: &str, answer: &str) -> PreparedReply {
        let substituted = prompt.contains(&self.email_prompt_marker) && !is_valid_email(answer);
        let answer = if substituted {
            self.email_fallback.as_str()
        } else {
            answer
        };

        let reply = if answer.trim().is_empty() {
            Reply::Blank
        } else {
            Reply::Line(answer.to_string())
        };
        PreparedReply { reply, substituted }
    }
}
