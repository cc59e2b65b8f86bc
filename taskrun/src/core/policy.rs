//! Command policy data: forbidden characters, denied and allowed executables.
//!
//! The policy is plain data consumed by [`CommandValidator`]. Swapping or
//! extending a list never touches the validation control flow.
//!
//! [`CommandValidator`]: crate::core::validator::CommandValidator

use std::collections::BTreeSet;

/// Shell metacharacters that are never accepted anywhere in a command.
///
/// Covers chaining, piping, redirection, globbing, substitution and grouping.
pub const FORBIDDEN_CHARS: &[char] = &[';', '&', '|', '`', '$', '>', '<', '*', '{', '}', ']'];

/// Executables rejected with a specific message.
pub const DEFAULT_DENY: &[&str] = &[
    "rm", "sudo", "su", "reboot", "poweroff", "shutdown", "kill", "mkfs", "dd", "chmod", "chown",
    "useradd", "userdel", "curl", "wget", "nc", "netcat", "python", "perl", "ruby", "java",
    "kubectl", "docker", "podman", "bash", "sh",
];

/// Benign read-only utilities that may run.
pub const DEFAULT_ALLOW: &[&str] = &[
    "echo", "printf", "date", "whoami", "uname", "ls", "pwd", "cat",
];

/// Allow/deny lists plus the forbidden character set.
///
/// Executable names are stored lowercased; lookups expect a lowercased token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandPolicy {
    forbidden: Vec<char>,
    deny: BTreeSet<String>,
    allow: BTreeSet<String>,
}

impl Default for CommandPolicy {
    fn default() -> Self {
        Self {
            forbidden: FORBIDDEN_CHARS.to_vec(),
            deny: DEFAULT_DENY.iter().map(|name| name.to_string()).collect(),
            allow: DEFAULT_ALLOW.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl CommandPolicy {
    /// Build a policy from explicit lists. Names are lowercased.
    pub fn new<D, A>(forbidden: &[char], deny: D, allow: A) -> Self
    where
        D: IntoIterator,
        D::Item: AsRef<str>,
        A: IntoIterator,
        A::Item: AsRef<str>,
    {
        Self {
            forbidden: forbidden.to_vec(),
            deny: deny.into_iter().map(|n| fold(n.as_ref())).collect(),
            allow: allow.into_iter().map(|n| fold(n.as_ref())).collect(),
        }
    }

    /// Add executables to the deny-list.
    pub fn deny_more<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.deny.extend(names.into_iter().map(|n| fold(n.as_ref())));
        self
    }

    /// Add executables to the allow-list.
    pub fn allow_more<I>(mut self, names: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        self.allow.extend(names.into_iter().map(|n| fold(n.as_ref())));
        self
    }

    pub fn has_forbidden_char(&self, command: &str) -> bool {
        command.chars().any(|c| self.forbidden.contains(&c))
    }

    pub fn is_denied(&self, executable: &str) -> bool {
        self.deny.contains(executable)
    }

    pub fn is_allowed(&self, executable: &str) -> bool {
        self.allow.contains(executable)
    }

    /// Allow-list rendered as `[a, b, c]` in sorted order.
    pub fn allow_list_display(&self) -> String {
        let names: Vec<&str> = self.allow.iter().map(String::as_str).collect();
        format!("[{}]", names.join(", "))
    }
}

/// Locale-independent case folding for executable names.
pub fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}
