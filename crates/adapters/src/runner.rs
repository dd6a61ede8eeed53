// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step execution: scripts run as child processes, recipes are handed to an
//! external recipe runtime command.

use crate::subprocess::run_captured;
use async_trait::async_trait;
use bx_core::{Executable, RecipeStep, RunResult, ScriptStep};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::process::Command;

/// An attachment whose payload has been fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAttachment {
    pub file_name: String,
    pub url: String,
    pub payload: Arc<[u8]>,
}

/// Executes one resolved step.
#[async_trait]
pub trait StepRunner: Clone + Send + Sync + 'static {
    async fn run(
        &self,
        step: &Executable,
        attachments: &[ResolvedAttachment],
        parameters: &BTreeMap<String, String>,
    ) -> RunResult;
}

/// Runs scripts under their shebang interpreter (or the default shell) in a
/// fresh directory holding the step's attachments.
///
/// Parameters are exported as environment variables; `ATTACH_DIR` points at
/// the step directory.
#[derive(Debug, Clone)]
pub struct ShellStepRunner {
    work_dir: PathBuf,
    shell: String,
    recipe_command: Option<Vec<String>>,
    runs: Arc<AtomicU64>,
}

impl ShellStepRunner {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            shell: "/bin/sh".to_string(),
            recipe_command: None,
            runs: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Interpreter for scripts without a shebang line
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    /// Command that runs a recipe; the recipe name is appended as last argument
    pub fn recipe_command(mut self, argv: Vec<String>) -> Self {
        self.recipe_command = Some(argv).filter(|a| !a.is_empty());
        self
    }

    /// Run a script in a fresh step directory, removed again once the
    /// script has exited.
    async fn run_script(
        &self,
        script: &ScriptStep,
        attachments: &[ResolvedAttachment],
        parameters: &BTreeMap<String, String>,
    ) -> RunResult {
        let dir = self.step_dir(&script.nickname);
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            return RunResult::crashed(format!("cannot create {}: {}", dir.display(), e));
        }
        let result = self.run_in(&dir, script, attachments, parameters).await;
        if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot remove step directory");
        }
        result
    }

    async fn run_in(
        &self,
        dir: &Path,
        script: &ScriptStep,
        attachments: &[ResolvedAttachment],
        parameters: &BTreeMap<String, String>,
    ) -> RunResult {
        for attachment in attachments {
            if !is_plain_file_name(&attachment.file_name) {
                return RunResult::crashed(format!(
                    "attachment file name '{}' escapes the step directory",
                    attachment.file_name
                ));
            }
            let path = dir.join(&attachment.file_name);
            if let Err(e) = tokio::fs::write(&path, &attachment.payload[..]).await {
                return RunResult::crashed(format!("cannot write {}: {}", path.display(), e));
            }
        }

        let script_path = dir.join("__script__");
        if let Err(e) = tokio::fs::write(&script_path, &script.source).await {
            return RunResult::crashed(format!("cannot write {}: {}", script_path.display(), e));
        }

        let (program, args) = interpreter(&script.source, &self.shell);
        let mut cmd = Command::new(program);
        cmd.args(args)
            .arg(&script_path)
            .current_dir(dir)
            .env("ATTACH_DIR", dir)
            .envs(parameters);

        tracing::debug!(step = %script.nickname, dir = %dir.display(), "running script");
        match run_captured(cmd).await {
            Ok(out) => RunResult::exited(out.status, out.output),
            Err(e) => RunResult::crashed(format!("failed to start interpreter: {}", e)),
        }
    }

    async fn run_recipe(
        &self,
        recipe: &RecipeStep,
        parameters: &BTreeMap<String, String>,
    ) -> RunResult {
        let Some((program, args)) = self.recipe_command.as_ref().and_then(|a| a.split_first())
        else {
            return RunResult::crashed(format!(
                "no recipe runtime configured to run '{}'",
                recipe.nickname
            ));
        };

        if let Err(e) = tokio::fs::create_dir_all(&self.work_dir).await {
            return RunResult::crashed(format!("cannot create {}: {}", self.work_dir.display(), e));
        }

        let mut cmd = Command::new(program);
        cmd.args(args).arg(&recipe.nickname).current_dir(&self.work_dir).envs(parameters);

        tracing::debug!(recipe = %recipe.nickname, "running recipe");
        match run_captured(cmd).await {
            Ok(out) => RunResult::exited(out.status, out.output),
            Err(e) => RunResult::crashed(format!("failed to start recipe runtime: {}", e)),
        }
    }

    fn step_dir(&self, nickname: &str) -> PathBuf {
        let n = self.runs.fetch_add(1, Ordering::Relaxed);
        let slug: String = nickname
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
            .collect();
        self.work_dir.join(format!("{}-{}-{}", std::process::id(), n, slug.trim_matches('-')))
    }
}

#[async_trait]
impl StepRunner for ShellStepRunner {
    async fn run(
        &self,
        step: &Executable,
        attachments: &[ResolvedAttachment],
        parameters: &BTreeMap<String, String>,
    ) -> RunResult {
        match step {
            Executable::Script(script) => self.run_script(script, attachments, parameters).await,
            Executable::Recipe(recipe) => self.run_recipe(recipe, parameters).await,
        }
    }
}

/// Split a `#!` line into program and leading arguments, falling back to `shell`.
fn interpreter<'a>(source: &'a str, shell: &'a str) -> (&'a str, Vec<&'a str>) {
    let shebang = source.lines().next().and_then(|l| l.strip_prefix("#!"));
    let mut parts = shebang.into_iter().flat_map(str::split_whitespace);
    match parts.next() {
        Some(program) => (program, parts.collect()),
        None => (shell, Vec::new()),
    }
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!((components.next(), components.next()), (Some(Component::Normal(_)), None))
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::{ResolvedAttachment, StepRunner};
    use async_trait::async_trait;
    use bx_core::{Executable, RunResult};
    use parking_lot::Mutex;
    use std::collections::{BTreeMap, HashMap};
    use std::sync::Arc;
    use std::time::Duration;

    /// Recorded step run
    #[derive(Debug, Clone)]
    pub struct RunCall {
        pub nickname: String,
        pub attachments: Vec<String>,
        pub parameters: BTreeMap<String, String>,
    }

    #[derive(Default)]
    struct FakeRunnerState {
        results: HashMap<String, RunResult>,
        calls: Vec<RunCall>,
        delay: Option<Duration>,
    }

    /// Fake step runner for testing.
    ///
    /// Steps exit 0 unless a result was scripted for their nickname.
    #[derive(Clone, Default)]
    pub struct FakeStepRunner {
        inner: Arc<Mutex<FakeRunnerState>>,
    }

    impl FakeStepRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Script the result for steps with the given nickname
        pub fn set_result(&self, nickname: impl Into<String>, result: RunResult) {
            self.inner.lock().results.insert(nickname.into(), result);
        }

        /// Make every run take this long (tokio time)
        pub fn set_delay(&self, delay: Duration) {
            self.inner.lock().delay = Some(delay);
        }

        pub fn calls(&self) -> Vec<RunCall> {
            self.inner.lock().calls.clone()
        }

        pub fn ran(&self) -> Vec<String> {
            self.inner.lock().calls.iter().map(|c| c.nickname.clone()).collect()
        }
    }

    #[async_trait]
    impl StepRunner for FakeStepRunner {
        async fn run(
            &self,
            step: &Executable,
            attachments: &[ResolvedAttachment],
            parameters: &BTreeMap<String, String>,
        ) -> RunResult {
            let (delay, result) = {
                let mut state = self.inner.lock();
                state.calls.push(RunCall {
                    nickname: step.nickname().to_string(),
                    attachments: attachments.iter().map(|a| a.file_name.clone()).collect(),
                    parameters: parameters.clone(),
                });
                let result = state
                    .results
                    .get(step.nickname())
                    .cloned()
                    .unwrap_or_else(|| RunResult::exited(0, "ok"));
                (state.delay, result)
            };
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            result
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeStepRunner, RunCall};

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
