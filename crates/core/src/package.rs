// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Package specification strings.
//!
//! A spec lists package names separated by whitespace and/or commas,
//! e.g. `"curl git, build-essential"`.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Accepted package name shape (covers apt, yum and gem style names).
#[allow(clippy::expect_used)]
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9.+:_-]*$").expect("constant regex pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackageSpecError {
    #[error("package spec is empty")]
    Empty,
    #[error("invalid package name '{0}'")]
    InvalidName(String),
}

/// A validated, ordered list of package names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    names: Vec<String>,
}

impl PackageSpec {
    pub fn parse(spec: &str) -> Result<Self, PackageSpecError> {
        let mut names: Vec<String> = Vec::new();
        for name in spec.split(|c: char| c == ',' || c.is_whitespace()).filter(|s| !s.is_empty()) {
            if !PACKAGE_NAME.is_match(name) {
                return Err(PackageSpecError::InvalidName(name.to_string()));
            }
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        if names.is_empty() {
            return Err(PackageSpecError::Empty);
        }
        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl std::fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.names.join(" "))
    }
}

#[cfg(test)]
#[path = "package_tests.rs"]
mod tests;
