// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::Path;

use esy_manifest::fixtures::*;
use esy_manifest::{BuildSandbox, NodeModulesResolver, crawl_sandbox};
use rstest::rstest;

use super::{eject_environment, parse, render};
use crate::StoreConfig;

async fn crawl(root_dir: &Path) -> BuildSandbox {
    crawl_sandbox(root_dir, &NodeModulesResolver::new())
        .await
        .unwrap()
}

#[rstest]
#[tokio::test]
async fn test_groups_are_in_dependency_order(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({"name": "app", "dependencies": {"lib": "*"}}),
    );
    write_dependency(&root_dir, "lib", &serde_json::json!({"name": "lib"}));
    let sandbox = crawl(&root_dir).await;
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let ejected = eject_environment(&sandbox, &config);
    let headers: Vec<&str> = ejected
        .groups
        .iter()
        .map(|group| group.header.as_str())
        .collect();
    assert_eq!(
        headers,
        vec![
            "Built-in variables for lib",
            "Built-in variables for app",
        ]
    );
    assert!(ejected.conflicts.is_empty());
}

#[rstest]
#[tokio::test]
async fn test_exclusive_conflict_names_both_manifests(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({"name": "app", "dependencies": {"a": "*", "b": "*"}}),
    );
    let a_dir = write_dependency(
        &root_dir,
        "a",
        &serde_json::json!({
            "name": "a",
            "esy": {"exportedEnv": {"CONFLICT": {"val": "from-a", "exclusive": true}}},
        }),
    );
    let b_dir = write_dependency(
        &root_dir,
        "b",
        &serde_json::json!({
            "name": "b",
            "esy": {"exportedEnv": {"CONFLICT": {"val": "from-b", "exclusive": true}}},
        }),
    );
    let sandbox = crawl(&root_dir).await;
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let ejected = eject_environment(&sandbox, &config);

    // both the incumbent and the challenger are exclusive, so both
    // detection rules fire, one message each
    let conflicts: Vec<_> = ejected
        .conflicts
        .iter()
        .filter(|conflict| conflict.variable == "CONFLICT")
        .collect();
    assert_eq!(conflicts.len(), 2);
    assert_ne!(conflicts[0].message, conflicts[1].message);
    let a_manifest = dunce::canonicalize(a_dir.join("package.json")).unwrap();
    let b_manifest = dunce::canonicalize(b_dir.join("package.json")).unwrap();
    for conflict in &conflicts {
        assert!(!conflict.builtin);
        assert!(conflict.message.contains(&a_manifest.display().to_string()));
        assert!(conflict.message.contains(&b_manifest.display().to_string()));
    }
}

#[rstest]
#[tokio::test]
async fn test_builtin_collision_is_distinguished(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "esy": {"exportedEnv": {"app__name": {"val": "impostor"}}},
        }),
    );
    let sandbox = crawl(&root_dir).await;
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let ejected = eject_environment(&sandbox, &config);
    let [conflict] = &ejected.conflicts[..] else {
        panic!("expected one conflict, got {:?}", ejected.conflicts);
    };
    assert!(conflict.builtin);
    assert!(conflict.message.contains("built-in variable app__name"));
}

#[rstest]
#[tokio::test]
async fn test_render_parse_round_trip(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "dependencies": {"lib": "*"},
            "esy": {"exportedEnv": {"app__flag": {"val": "on"}}},
        }),
    );
    write_dependency(&root_dir, "lib", &serde_json::json!({"name": "lib"}));
    let sandbox = crawl(&root_dir).await;
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let ejected = eject_environment(&sandbox, &config);

    let rendered = render(&ejected.groups);
    assert!(rendered.contains("# Built-in variables for lib"));
    assert!(rendered.contains("export app__flag=\"on\""));

    let parsed = parse(&rendered);
    let expected: Vec<(String, String)> = ejected
        .groups
        .iter()
        .flat_map(|group| {
            group
                .vars
                .iter()
                .map(|var| (var.name.clone(), var.value.clone()))
        })
        .collect();
    assert_eq!(parsed, expected);
}

#[rstest]
#[tokio::test]
async fn test_lints_are_surfaced(tmpdir: tempfile::TempDir) {
    let root_dir = tmpdir.path().join("app");
    write_package(
        &root_dir,
        &serde_json::json!({
            "name": "app",
            "esy": {"exportedEnv": {"ROGUE": {"val": "x"}}},
        }),
    );
    let sandbox = crawl(&root_dir).await;
    let config = StoreConfig::with_prefix(&tmpdir.path().join("prefix"), &root_dir);
    let ejected = eject_environment(&sandbox, &config);
    assert_eq!(ejected.lints.len(), 1);
    assert!(ejected.lints[0].to_string().contains("ROGUE"));
}
