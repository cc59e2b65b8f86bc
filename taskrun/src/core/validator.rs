//! Allow-list gate for command strings.
//!
//! Not a sandbox: the validator refuses any string containing shell
//! metacharacters and only admits a small set of known executables. It does
//! not parse shell syntax.

use crate::core::policy::{CommandPolicy, fold};

/// Outcome of a single validation. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum Verdict {
    Accepted,
    Rejected(String),
}

impl Verdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Verdict::Accepted)
    }

    /// Convert into a `Result` carrying the rejection reason.
    pub fn into_result(self) -> Result<(), String> {
        match self {
            Verdict::Accepted => Ok(()),
            Verdict::Rejected(reason) => Err(reason),
        }
    }
}

/// Deterministic command validator over a [`CommandPolicy`].
#[derive(Debug, Clone, Default)]
pub struct CommandValidator {
    policy: CommandPolicy,
}

impl CommandValidator {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    /// Decide whether `command` may run.
    ///
    /// Checks run in a fixed order: blank, metacharacters, leading token,
    /// deny-list, allow-list. The deny-list is consulted first so well-known
    /// dangerous tools get a specific reason.
    pub fn validate(&self, command: &str) -> Verdict {
        if command.trim().is_empty() {
            return reject("command must not be blank");
        }
        if self.policy.has_forbidden_char(command) {
            return reject("command contains forbidden shell metacharacters");
        }
        let first = first_token(command);
        if first.is_empty() {
            return reject("command must start with an executable");
        }
        let executable = fold(first);
        if self.policy.is_denied(&executable) {
            return Verdict::Rejected(format!("command is not allowed: {executable}"));
        }
        if !self.policy.is_allowed(&executable) {
            return Verdict::Rejected(format!(
                "only a limited set of safe commands is allowed: {}",
                self.policy.allow_list_display()
            ));
        }
        Verdict::Accepted
    }
}

fn reject(reason: &str) -> Verdict {
    Verdict::Rejected(reason.to_string())
}

/// First whitespace-delimited token of the trimmed command.
fn first_token(command: &str) -> &str {
    command.split_whitespace().next().unwrap_or("")
}
