// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use rstest::rstest;

use super::{NodeModulesResolver, PackageResolver};
use crate::fixtures::*;

#[rstest]
fn test_resolves_nested_then_hoisted(tmpdir: tempfile::TempDir) {
    let root = tmpdir.path();
    write_package(root, &serde_json::json!({"name": "root"}));
    let a_dir = write_dependency(root, "a", &serde_json::json!({"name": "a"}));
    write_dependency(&a_dir, "nested", &serde_json::json!({"name": "nested"}));
    write_dependency(root, "hoisted", &serde_json::json!({"name": "hoisted"}));

    let resolver = NodeModulesResolver::new();
    let nested = resolver.resolve(&a_dir, "nested").unwrap();
    assert_eq!(
        nested,
        a_dir.join("node_modules").join("nested").join("package.json")
    );
    // not present under a/node_modules, found by walking up
    let hoisted = resolver.resolve(&a_dir, "hoisted").unwrap();
    assert_eq!(
        hoisted,
        root.join("node_modules").join("hoisted").join("package.json")
    );
}

#[rstest]
fn test_unresolvable_name_errors(tmpdir: tempfile::TempDir) {
    let resolver = NodeModulesResolver::new();
    let err = resolver.resolve(tmpdir.path(), "missing").unwrap_err();
    assert!(err.to_string().contains("missing"));
}

#[rstest]
fn test_resolution_is_cached(tmpdir: tempfile::TempDir) {
    let root = tmpdir.path();
    write_dependency(root, "a", &serde_json::json!({"name": "a"}));
    let resolver = NodeModulesResolver::new();
    let first = resolver.resolve(root, "a").unwrap();
    // the cache answers even after the manifest disappears
    std::fs::remove_file(&first).unwrap();
    let second = resolver.resolve(root, "a").unwrap();
    assert_eq!(first, second);
}
