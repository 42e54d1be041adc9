// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::Path;
use std::sync::{Arc, Mutex};

use esy_manifest::fixtures::*;
use esy_manifest::{BuildSandbox, NodeModulesResolver, crawl_sandbox};
use rstest::rstest;

use super::{TaskStatus, build};
use crate::task::{BuildTask, plan_build};
use crate::{Error, StoreConfig};

type StatusLog = Arc<Mutex<Vec<(String, TaskStatus)>>>;

fn recorder() -> (StatusLog, impl Fn(&Arc<BuildTask>, TaskStatus) + Send + Sync + 'static) {
    let log: StatusLog = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    let on_status = move |task: &Arc<BuildTask>, status: TaskStatus| {
        sink.lock()
            .unwrap()
            .push((task.spec.name.clone(), status));
    };
    (log, on_status)
}

fn terminal_of(log: &StatusLog, name: &str) -> TaskStatus {
    log.lock()
        .unwrap()
        .iter()
        .rev()
        .find(|(task, status)| task == name && !matches!(status, TaskStatus::InProgress))
        .map(|(_, status)| status.clone())
        .unwrap_or_else(|| panic!("no terminal status for {name}"))
}

async fn crawl(root_dir: &Path) -> BuildSandbox {
    crawl_sandbox(root_dir, &NodeModulesResolver::new())
        .await
        .unwrap()
}

async fn run(root_dir: &Path, config: &StoreConfig) -> (StatusLog, crate::Result<()>) {
    let sandbox = crawl(root_dir).await;
    let plan = plan_build(&sandbox, config);
    let (log, on_status) = recorder();
    let outcome = build(plan, &sandbox, config, on_status).await;
    (log, outcome)
}

#[rstest]
#[tokio::test]
async fn test_single_package_build(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "esy": {"build": "echo hi > $cur__install/hi"},
        }),
    );
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (log, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();

    let sandbox = crawl(&root_dir).await;
    let spec = &sandbox.root;
    let (prefix, hash) = spec.id.rsplit_once('-').unwrap();
    assert_eq!(prefix, "app-0.0.0");
    assert_eq!(hash.len(), 40);

    let installed = config.final_install_path(spec).join("hi");
    assert_eq!(std::fs::read_to_string(installed).unwrap().trim(), "hi");
    assert!(matches!(
        terminal_of(&log, "app"),
        TaskStatus::Success { cached: false, forced: false, .. }
    ));
}

#[rstest]
#[tokio::test]
async fn test_second_invocation_is_fully_cached(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "dependencies": {"lib": "*"},
            "esy": {"build": "touch $cur__install/out"},
        }),
    );
    write_dependency(
        &root_dir,
        "lib",
        &serde_json::json!({
            "name": "lib",
            "version": "1.0.0",
            "_resolved": "https://registry.invalid/lib-1.0.0.tgz",
            "esy": {"build": "touch $cur__install/lib-out"},
        }),
    );
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (first, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();
    assert!(matches!(
        terminal_of(&first, "lib"),
        TaskStatus::Success { cached: false, .. }
    ));

    let (second, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();
    for name in ["app", "lib"] {
        assert!(
            matches!(
                terminal_of(&second, name),
                TaskStatus::Success { cached: true, forced: false, .. }
            ),
            "{name} should be cached on the second run"
        );
    }
    // cached tasks never enter in-progress
    assert!(
        second
            .lock()
            .unwrap()
            .iter()
            .all(|(_, status)| !matches!(status, TaskStatus::InProgress))
    );
}

#[rstest]
#[tokio::test]
async fn test_touching_the_root_rebuilds_only_the_root(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "dependencies": {"lib": "*"},
            "esy": {"build": "touch $cur__install/out"},
        }),
    );
    write_dependency(
        &root_dir,
        "lib",
        &serde_json::json!({
            "name": "lib",
            "version": "1.0.0",
            "_resolved": "https://registry.invalid/lib-1.0.0.tgz",
        }),
    );
    std::fs::write(root_dir.join("main.ml"), "let () = ()").unwrap();
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (_, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    std::fs::write(root_dir.join("main.ml"), "let () = print_newline ()").unwrap();
    let (log, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();
    assert!(matches!(
        terminal_of(&log, "lib"),
        TaskStatus::Success { cached: true, .. }
    ));
    assert!(matches!(
        terminal_of(&log, "app"),
        TaskStatus::Success { cached: false, forced: true, .. }
    ));
}

#[rstest]
#[tokio::test]
async fn test_force_propagates_to_dependents(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "dependencies": {"a": "*"},
            "esy": {"build": "touch $cur__install/out"},
        }),
    );
    // a development dependency, tracked by mtime rather than the store
    let a_dir = write_dependency(
        &root_dir,
        "a",
        &serde_json::json!({
            "name": "a",
            "esy": {"build": "touch $cur__install/a-out"},
        }),
    );
    std::fs::write(a_dir.join("lib.ml"), "let x = 1").unwrap();
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (_, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();

    std::thread::sleep(std::time::Duration::from_millis(20));
    std::fs::write(a_dir.join("lib.ml"), "let x = 2").unwrap();
    let (log, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();
    assert!(matches!(
        terminal_of(&log, "a"),
        TaskStatus::Success { cached: false, forced: true, .. }
    ));
    assert!(matches!(
        terminal_of(&log, "app"),
        TaskStatus::Success { cached: false, forced: true, .. }
    ));
}

#[rstest]
#[tokio::test]
async fn test_failure_short_circuits_dependents(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "dependencies": {"broken": "*"},
            "esy": {"build": "touch $cur__install/out"},
        }),
    );
    write_dependency(
        &root_dir,
        "broken",
        &serde_json::json!({
            "name": "broken",
            "esy": {"build": "exit 1"},
        }),
    );
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (log, outcome) = run(&root_dir, &config).await;
    assert!(matches!(outcome, Err(Error::BuildFailed { .. })));

    let TaskStatus::Failure { error } = terminal_of(&log, "broken") else {
        panic!("broken should fail");
    };
    assert!(matches!(&*error, Error::CommandFailed { .. }));
    let TaskStatus::Failure { error } = terminal_of(&log, "app") else {
        panic!("app should fail");
    };
    assert!(matches!(&*error, Error::DependenciesNotBuilt));
    // the dependent never started
    assert!(
        !log.lock()
            .unwrap()
            .iter()
            .any(|(name, status)| name == "app" && matches!(status, TaskStatus::InProgress))
    );
}

#[rstest]
#[tokio::test]
async fn test_crawl_errors_fail_the_affected_task(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({"name": "app", "dependencies": {"nowhere": "*"}}),
    );
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (log, outcome) = run(&root_dir, &config).await;
    assert!(outcome.is_err());
    let TaskStatus::Failure { error } = terminal_of(&log, "app") else {
        panic!("app should fail");
    };
    assert!(matches!(&*error, Error::CrawlErrors { .. }));
}

#[rstest]
#[tokio::test]
async fn test_duplicated_references_join_one_execution(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({"name": "app", "dependencies": {"a": "*", "b": "*"}}),
    );
    write_dependency(
        &root_dir,
        "a",
        &serde_json::json!({"name": "a", "dependencies": {"shared": "*"}}),
    );
    write_dependency(
        &root_dir,
        "b",
        &serde_json::json!({"name": "b", "dependencies": {"shared": "*"}}),
    );
    write_dependency(
        &root_dir,
        "shared",
        &serde_json::json!({
            "name": "shared",
            "esy": {"build": "touch $cur__install/marker"},
        }),
    );
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let (log, outcome) = run(&root_dir, &config).await;
    outcome.unwrap();
    let shared_runs = log
        .lock()
        .unwrap()
        .iter()
        .filter(|(name, status)| name == "shared" && matches!(status, TaskStatus::InProgress))
        .count();
    assert_eq!(shared_runs, 1);
}
