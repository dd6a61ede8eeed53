// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundles of executable steps and their attachments.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named file fetched before a step runs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Attachment {
    /// Local file name the payload is materialized under
    pub file_name: String,
    /// Source location: `file://` reference, bare absolute path, or remote URL
    pub url: String,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self { file_name: file_name.into(), url: url.into() }
    }
}

/// A script invocation: source body plus the files it needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptStep {
    pub nickname: String,
    pub source: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

crate::builder! {
    pub struct ScriptStepBuilder => ScriptStep {
        into {
            nickname: String = "test-script",
            source: String = "#!/bin/sh\nexit 0\n",
        }
        set {
            parameters: BTreeMap<String, String> = BTreeMap::new(),
            packages: Option<String> = None,
            attachments: Vec<Attachment> = Vec::new(),
        }
    }
}

/// A configuration recipe run by the recipe runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeStep {
    /// Recipe name, e.g. `cookbook::recipe`
    pub nickname: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packages: Option<String>,
}

crate::builder! {
    pub struct RecipeStepBuilder => RecipeStep {
        into {
            nickname: String = "test::default",
        }
        set {
            parameters: BTreeMap<String, String> = BTreeMap::new(),
            packages: Option<String> = None,
        }
    }
}

/// Discriminant of an [`Executable`], used in audit text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Script,
    Recipe,
}

crate::simple_display! {
    StepKind {
        Script => "script",
        Recipe => "recipe",
    }
}

/// One step of a bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Executable {
    Script(ScriptStep),
    Recipe(RecipeStep),
}

impl Executable {
    pub fn kind(&self) -> StepKind {
        match self {
            Executable::Script(_) => StepKind::Script,
            Executable::Recipe(_) => StepKind::Recipe,
        }
    }

    /// Display name used in audits and logs
    pub fn nickname(&self) -> &str {
        match self {
            Executable::Script(s) => &s.nickname,
            Executable::Recipe(r) => &r.nickname,
        }
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        match self {
            Executable::Script(s) => &s.parameters,
            Executable::Recipe(r) => &r.parameters,
        }
    }

    /// Package spec, or `None` when absent or blank.
    pub fn packages(&self) -> Option<&str> {
        let raw = match self {
            Executable::Script(s) => s.packages.as_deref(),
            Executable::Recipe(r) => r.packages.as_deref(),
        };
        raw.filter(|p| !p.trim().is_empty())
    }

    /// Attachments declared by the step. Recipes never carry attachments.
    pub fn attachments(&self) -> &[Attachment] {
        match self {
            Executable::Script(s) => &s.attachments,
            Executable::Recipe(_) => &[],
        }
    }
}

impl From<ScriptStep> for Executable {
    fn from(step: ScriptStep) -> Self {
        Executable::Script(step)
    }
}

impl From<RecipeStep> for Executable {
    fn from(step: RecipeStep) -> Self {
        Executable::Recipe(step)
    }
}

/// Ordered steps submitted as one unit of work.
///
/// Immutable once constructed. `sequence` is assigned upstream and increases
/// monotonically; it correlates audit entries and detects re-delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutableBundle {
    executables: Vec<Executable>,
    #[serde(default)]
    attachments: Vec<Attachment>,
    sequence: u64,
}

impl ExecutableBundle {
    pub fn new(executables: Vec<Executable>, attachments: Vec<Attachment>, sequence: u64) -> Self {
        Self { executables, attachments, sequence }
    }

    pub fn executables(&self) -> &[Executable] {
        &self.executables
    }

    /// Bundle-wide attachments, made available to every step.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn is_empty(&self) -> bool {
        self.executables.is_empty()
    }

    /// Comma-separated step nicknames, for log lines.
    pub fn summary(&self) -> String {
        self.executables.iter().map(Executable::nickname).collect::<Vec<_>>().join(", ")
    }
}

#[cfg(test)]
#[path = "bundle_tests.rs"]
mod tests;
