//! Register named shell commands and run them on demand.
//!
//! The crate keeps the same split as any runner built around a policy gate:
//!
//! - **[`core`]**: Pure, deterministic logic (command policy, validation,
//!   domain types). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (subprocesses, task storage,
//!   configuration). Isolated behind traits to enable fakes in tests.
//!
//! [`service`] composes the two into the task operations, including the
//! validate, run, append, persist pipeline behind `execute`.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod service;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
