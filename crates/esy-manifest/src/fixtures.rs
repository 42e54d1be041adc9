// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

//! Helpers for authoring throwaway sandboxes in tests.

use std::path::{Path, PathBuf};

use rstest::fixture;

#[fixture]
pub fn tmpdir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("esy-test-")
        .tempdir()
        .expect("Failed to establish temporary directory for testing")
}

/// Write a `package.json` with the given content into `dir`, creating
/// the directory as needed. Returns the manifest path.
pub fn write_package(dir: &Path, manifest: &serde_json::Value) -> PathBuf {
    std::fs::create_dir_all(dir).expect("Failed to create package directory");
    let manifest_path = dir.join("package.json");
    std::fs::write(
        &manifest_path,
        serde_json::to_string_pretty(manifest).expect("Failed to serialize manifest"),
    )
    .expect("Failed to write manifest");
    manifest_path
}

/// Lay out a dependency package under `<parent>/node_modules/<name>`.
/// Returns the package directory.
pub fn write_dependency(parent: &Path, name: &str, manifest: &serde_json::Value) -> PathBuf {
    let dir = parent.join("node_modules").join(name);
    write_package(&dir, manifest);
    dir
}

/// An in-memory spec for unit tests that do not need a crawled
/// sandbox. Callers adjust fields before wrapping it in an `Arc`.
pub fn test_spec(name: &str) -> crate::BuildSpec {
    crate::BuildSpec {
        id: format!("{}-0.0.0-{}", crate::normalize_package_name(name), "0".repeat(40)),
        name: name.to_owned(),
        version: None,
        command: None,
        exported_env: Default::default(),
        source_path: PathBuf::from("/sandbox").join(name),
        manifest_path: PathBuf::from("/sandbox").join(name).join("package.json"),
        mutates_source_path: false,
        should_be_persisted: false,
        dependencies: Vec::new(),
        errors: Vec::new(),
    }
}
