//! taskrun configuration stored at `.taskrun/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::policy::CommandPolicy;
use crate::io::process::{Shell, ShellRunner};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".taskrun/config.toml";

/// taskrun configuration (TOML).
///
/// Missing fields default to the built-in policy, the host shell and a task
/// store under `.taskrun/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TaskrunConfig {
    /// JSON file holding all tasks and their execution history.
    pub store_path: PathBuf,

    pub runner: RunnerConfig,

    pub policy: PolicyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Shell program and its run-one-command flag (e.g. `["sh","-c"]`).
    /// Unset means host detection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shell: Option<Vec<String>>,

    /// Kill commands running longer than this. Unset means wait forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Additions to the built-in allow/deny lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PolicyConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

impl Default for TaskrunConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".taskrun/tasks.json"),
            runner: RunnerConfig::default(),
            policy: PolicyConfig::default(),
        }
    }
}

impl TaskrunConfig {
    pub fn validate(&self) -> Result<()> {
        if self.store_path.as_os_str().is_empty() {
            return Err(anyhow!("store_path must not be empty"));
        }
        if let Some(shell) = &self.runner.shell
            && (shell.len() != 2 || shell.iter().any(|part| part.trim().is_empty()))
        {
            return Err(anyhow!(
                "runner.shell must be [program, flag] with non-blank entries"
            ));
        }
        if self.runner.timeout_secs == Some(0) {
            return Err(anyhow!("runner.timeout_secs must be > 0"));
        }
        for (list, names) in [("allow", &self.policy.allow), ("deny", &self.policy.deny)] {
            for name in names {
                if name.trim().is_empty() || name.trim().contains(char::is_whitespace) {
                    return Err(anyhow!(
                        "policy.{list} entries must be single executable names, got '{name}'"
                    ));
                }
            }
        }
        Ok(())
    }

    /// Built-in policy extended with the configured names.
    pub fn command_policy(&self) -> CommandPolicy {
        CommandPolicy::default()
            .allow_more(&self.policy.allow)
            .deny_more(&self.policy.deny)
    }

    pub fn shell(&self) -> Shell {
        match self.runner.shell.as_deref() {
            Some([program, flag]) => Shell::new(program, flag),
            _ => Shell::host(),
        }
    }

    pub fn shell_runner(&self) -> ShellRunner {
        let runner = ShellRunner::new(self.shell());
        match self.runner.timeout_secs {
            Some(secs) => runner.with_timeout(Duration::from_secs(secs)),
            None => runner,
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `TaskrunConfig::default()`.
pub fn load_config(path: &Path) -> Result<TaskrunConfig> {
    if !path.exists() {
        let cfg = TaskrunConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: TaskrunConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &TaskrunConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
