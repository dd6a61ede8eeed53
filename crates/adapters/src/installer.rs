// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Operating-system package installation.

use crate::subprocess::run_captured;
use async_trait::async_trait;
use bx_core::{InstallResult, PackageSpec};
use tokio::process::Command;

/// Installs the packages a step requires.
///
/// Failures are terminal: a spec that cannot be installed now will not
/// become installable by waiting.
#[async_trait]
pub trait PackageInstaller: Clone + Send + Sync + 'static {
    async fn install(&self, spec: &str) -> InstallResult;
}

/// Installs packages by invoking a package manager command.
///
/// The spec is validated before anything runs; names are appended to the
/// configured arguments, e.g. `apt-get install -y curl git`.
#[derive(Debug, Clone)]
pub struct CommandPackageInstaller {
    program: String,
    args: Vec<String>,
}

impl CommandPackageInstaller {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self { program: program.into(), args }
    }

    pub fn apt() -> Self {
        Self::new("apt-get", vec!["install".to_string(), "-y".to_string()])
    }

    pub fn yum() -> Self {
        Self::new("yum", vec!["install".to_string(), "-y".to_string()])
    }
}

impl Default for CommandPackageInstaller {
    fn default() -> Self {
        Self::apt()
    }
}

#[async_trait]
impl PackageInstaller for CommandPackageInstaller {
    async fn install(&self, spec: &str) -> InstallResult {
        let packages = match PackageSpec::parse(spec) {
            Ok(p) => p,
            Err(e) => return InstallResult::failed(format!("{} (spec: '{}')", e, spec)),
        };

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).args(packages.names());
        tracing::info!(program = %self.program, packages = %packages, "installing packages");

        match run_captured(cmd).await {
            Ok(out) if out.success() => InstallResult::installed(out.output),
            Ok(out) => InstallResult::failed(format!(
                "{} exited with status {}: {}",
                self.program,
                out.status,
                out.output.trim_end()
            )),
            Err(e) => InstallResult::failed(format!("failed to spawn {}: {}", self.program, e)),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::PackageInstaller;
    use async_trait::async_trait;
    use bx_core::{InstallResult, PackageSpec};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct FakeInstallerState {
        calls: Vec<String>,
        rejected: Vec<String>,
    }

    /// Fake installer for testing.
    ///
    /// Accepts any spec that parses, except names explicitly rejected.
    #[derive(Clone, Default)]
    pub struct FakePackageInstaller {
        inner: Arc<Mutex<FakeInstallerState>>,
    }

    impl FakePackageInstaller {
        pub fn new() -> Self {
            Self::default()
        }

        /// Fail installation of any spec containing `name`
        pub fn reject(&self, name: impl Into<String>) {
            self.inner.lock().rejected.push(name.into());
        }

        /// Specs passed to `install`, in call order
        pub fn calls(&self) -> Vec<String> {
            self.inner.lock().calls.clone()
        }
    }

    #[async_trait]
    impl PackageInstaller for FakePackageInstaller {
        async fn install(&self, spec: &str) -> InstallResult {
            let mut state = self.inner.lock();
            state.calls.push(spec.to_string());
            let packages = match PackageSpec::parse(spec) {
                Ok(p) => p,
                Err(e) => return InstallResult::failed(e.to_string()),
            };
            if let Some(bad) = packages.names().iter().find(|n| state.rejected.contains(n)) {
                return InstallResult::failed(format!("no installation candidate for '{}'", bad));
            }
            InstallResult::installed(format!("installed {}", packages))
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakePackageInstaller;

#[cfg(test)]
#[path = "installer_tests.rs"]
mod tests;
