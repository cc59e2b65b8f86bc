//! CLI tests for `taskrun put` / `exec` / `get`, including parallel `exec`
//! processes sharing one store file.
//!
//! Spawns the taskrun binary against a temp store and verifies exit codes and
//! the recorded execution history.

#![cfg(unix)]

use std::path::Path;
use std::process::{Command, Output, Stdio};

use taskrun::core::types::{Task, TaskExecution};
use taskrun::exit_codes;
use taskrun::io::config::{RunnerConfig, TaskrunConfig, write_config};

/// Write a config that runs commands through `sh -c` so host login profiles
/// cannot leak into captured output.
fn setup(root: &Path) {
    let cfg = TaskrunConfig {
        store_path: root.join("tasks.json"),
        runner: RunnerConfig {
            shell: Some(vec!["sh".to_string(), "-c".to_string()]),
            timeout_secs: None,
        },
        ..TaskrunConfig::default()
    };
    write_config(&root.join("config.toml"), &cfg).expect("write config");
}

fn taskrun(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_taskrun"))
        .current_dir(root)
        .arg("--config")
        .arg(root.join("config.toml"))
        .args(args)
        .output()
        .expect("run taskrun")
}

fn put_echo(root: &Path) {
    let out = taskrun(
        root,
        &[
            "put", "--id", "t1", "--name", "Greeting", "--owner", "ops", "--command", "echo hi",
        ],
    );
    assert_eq!(out.status.code(), Some(exit_codes::OK), "{out:?}");
}

#[test]
fn exec_records_execution() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path());
    put_echo(temp.path());

    let out = taskrun(temp.path(), &["exec", "t1"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK), "{out:?}");
    let execution: TaskExecution = serde_json::from_slice(&out.stdout).expect("parse execution");
    assert_eq!(execution.output, "hi\n");

    taskrun(temp.path(), &["exec", "t1"]);
    let out = taskrun(temp.path(), &["get", "t1"]);
    let task: Task = serde_json::from_slice(&out.stdout).expect("parse task");
    assert_eq!(task.task_executions.len(), 2);
    assert_eq!(task.task_executions[0], execution);
}

#[test]
fn exec_unknown_task_exits_not_found() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path());

    let out = taskrun(temp.path(), &["exec", "nope"]);
    assert_eq!(out.status.code(), Some(exit_codes::NOT_FOUND));
    assert!(String::from_utf8_lossy(&out.stderr).contains("task not found: nope"));
}

#[test]
fn exec_rejected_override_exits_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path());
    put_echo(temp.path());

    let out = taskrun(temp.path(), &["exec", "t1", "--command", "rm -rf /"]);
    assert_eq!(out.status.code(), Some(exit_codes::REJECTED));
    assert!(String::from_utf8_lossy(&out.stderr).contains("command is not allowed: rm"));

    let out = taskrun(temp.path(), &["get", "t1"]);
    let task: Task = serde_json::from_slice(&out.stdout).expect("parse task");
    assert!(task.task_executions.is_empty());
}

#[test]
fn put_with_metacharacters_exits_rejected() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path());

    let out = taskrun(
        temp.path(),
        &[
            "put", "--id", "t2", "--name", "x", "--owner", "o", "--command", "echo hi | cat",
        ],
    );
    assert_eq!(out.status.code(), Some(exit_codes::REJECTED));
}

#[test]
fn search_and_delete() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path());
    put_echo(temp.path());

    let out = taskrun(temp.path(), &["search", "greet"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let tasks: Vec<Task> = serde_json::from_slice(&out.stdout).expect("parse tasks");
    assert_eq!(tasks.len(), 1);

    let out = taskrun(temp.path(), &["delete", "t1"]);
    assert_eq!(out.status.code(), Some(exit_codes::OK));
    let out = taskrun(temp.path(), &["search", "greet"]);
    assert_eq!(out.status.code(), Some(exit_codes::NOT_FOUND));
}

#[test]
fn parallel_exec_processes_all_record() {
    let temp = tempfile::tempdir().expect("tempdir");
    setup(temp.path());
    put_echo(temp.path());

    let runs = 6;
    let children: Vec<_> = (0..runs)
        .map(|_| {
            Command::new(env!("CARGO_BIN_EXE_taskrun"))
                .current_dir(temp.path())
                .arg("--config")
                .arg(temp.path().join("config.toml"))
                .args(["exec", "t1"])
                .stdout(Stdio::null())
                .spawn()
                .expect("spawn taskrun")
        })
        .collect();
    for mut child in children {
        let status = child.wait().expect("wait taskrun");
        assert_eq!(status.code(), Some(exit_codes::OK));
    }

    let out = taskrun(temp.path(), &["get", "t1"]);
    let task: Task = serde_json::from_slice(&out.stdout).expect("parse task");
    assert_eq!(task.task_executions.len(), runs);
    assert!(task.task_executions.iter().all(|e| e.output == "hi\n"));
}
