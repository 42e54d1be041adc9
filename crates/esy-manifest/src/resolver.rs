// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./resolver_test.rs"]
mod resolver_test;

/// Resolution of a dependency name to its manifest on disk.
///
/// The algorithm itself is an external collaborator; the crawler only
/// relies on this seam. Implementations are expected to be cheap per
/// call or to cache internally, as the crawler asks once per
/// `(base_dir, name)` edge in the graph.
pub trait PackageResolver {
    /// Resolve `<name>/package.json` relative to the package directory
    /// `base_dir`, returning the absolute manifest path.
    fn resolve(&self, base_dir: &Path, name: &str) -> Result<PathBuf>;
}

/// The standard nested `node_modules` lookup: try
/// `<dir>/node_modules/<name>/package.json` for `base_dir` and each of
/// its ancestors. Results are cached by `(base_dir, name)`, including
/// failures.
#[derive(Default)]
pub struct NodeModulesResolver {
    cache: Mutex<HashMap<(PathBuf, String), Option<PathBuf>>>,
}

impl NodeModulesResolver {
    pub fn new() -> Self {
        Self::default()
    }

    fn lookup(base_dir: &Path, name: &str) -> Option<PathBuf> {
        let mut dir = Some(base_dir);
        while let Some(current) = dir {
            let candidate = current.join("node_modules").join(name).join("package.json");
            if candidate.is_file() {
                return Some(candidate);
            }
            dir = current.parent();
        }
        None
    }
}

impl PackageResolver for NodeModulesResolver {
    fn resolve(&self, base_dir: &Path, name: &str) -> Result<PathBuf> {
        let key = (base_dir.to_owned(), name.to_owned());
        let mut cache = self.cache.lock().expect("resolver cache poisoned");
        let resolved = cache
            .entry(key)
            .or_insert_with(|| Self::lookup(base_dir, name));
        resolved.clone().ok_or_else(|| Error::PackageNotFound {
            name: name.to_owned(),
            base_dir: base_dir.to_owned(),
        })
    }
}
