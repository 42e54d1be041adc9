// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::{Path, PathBuf};

use esy_manifest::BuildSpec;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./config_test.rs"]
mod config_test;

/// Variable overriding the default store prefix of `~/.esy`.
pub const PREFIX_VAR: &str = "ESY__PREFIX";

/// The three subtrees every store carries.
///
/// `_insttmp` and `_install` are intentionally the same length: the
/// in-place path rewriting of finished artifacts depends on the staging
/// and final install paths of a build having equal byte lengths.
pub const STORE_BUILD_TREE: &str = "_build";
pub const STORE_STAGE_TREE: &str = "_insttmp";
pub const STORE_INSTALL_TREE: &str = "_install";

/// The install subdirectories created for every build.
pub const INSTALL_TREES: [&str; 8] =
    ["lib", "bin", "sbin", "man", "doc", "share", "stublibs", "etc"];

/// Maps builds to their locations on disk.
///
/// All of the path functions are pure: given the same spec they always
/// return the same path, and for persisted specs the final install
/// path depends only on the build identifier. Persistence selects
/// between the shared store and the sandbox-local store.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    pub store_path: PathBuf,
    pub local_store_path: PathBuf,
    pub sandbox_path: PathBuf,
    /// Extra write locations allowed by the build sandbox profile, in
    /// addition to the build and staging trees.
    pub allowed_write_paths: Vec<PathBuf>,
}

impl StoreConfig {
    /// Configuration for a sandbox using the operator's store prefix:
    /// `ESY__PREFIX` when set, `~/.esy` otherwise.
    pub fn for_sandbox(sandbox_path: &Path) -> Result<Self> {
        let prefix = match std::env::var_os(PREFIX_VAR) {
            Some(prefix) => PathBuf::from(prefix),
            None => dirs::home_dir().ok_or(Error::NoStorePrefix)?.join(".esy"),
        };
        Ok(Self::with_prefix(&prefix, sandbox_path))
    }

    /// Configuration with an explicit store prefix.
    pub fn with_prefix(prefix: &Path, sandbox_path: &Path) -> Self {
        Self {
            store_path: prefix.join("store"),
            local_store_path: sandbox_path
                .join("node_modules")
                .join(".cache")
                .join("_esy")
                .join("store"),
            sandbox_path: sandbox_path.to_owned(),
            allowed_write_paths: vec![std::env::temp_dir()],
        }
    }

    fn store_for(&self, spec: &BuildSpec) -> &Path {
        if spec.should_be_persisted {
            &self.store_path
        } else {
            &self.local_store_path
        }
    }

    /// The package sources as laid out in the sandbox.
    pub fn source_path(&self, spec: &BuildSpec) -> PathBuf {
        spec.source_path.clone()
    }

    /// Where the build commands run: the source tree, unless the build
    /// mutates its sources and therefore runs against the build copy.
    pub fn root_path(&self, spec: &BuildSpec) -> PathBuf {
        if spec.mutates_source_path {
            self.build_path(spec)
        } else {
            self.source_path(spec)
        }
    }

    /// Build scratch, including the `_esy` control directory.
    pub fn build_path(&self, spec: &BuildSpec) -> PathBuf {
        self.store_for(spec).join(STORE_BUILD_TREE).join(&spec.id)
    }

    /// Staging area for artifacts, renamed into place on success.
    pub fn install_path(&self, spec: &BuildSpec) -> PathBuf {
        self.store_for(spec).join(STORE_STAGE_TREE).join(&spec.id)
    }

    /// The finalized artifacts; existence implies a completed build.
    pub fn final_install_path(&self, spec: &BuildSpec) -> PathBuf {
        self.store_for(spec).join(STORE_INSTALL_TREE).join(&spec.id)
    }

    /// Create the three store subtrees at both store prefixes.
    pub async fn initialize(&self) -> Result<()> {
        for store in [&self.store_path, &self.local_store_path] {
            for tree in [STORE_BUILD_TREE, STORE_STAGE_TREE, STORE_INSTALL_TREE] {
                let path = store.join(tree);
                tokio::fs::create_dir_all(&path)
                    .await
                    .map_err(|err| Error::DirectoryCreateError(path, err))?;
            }
        }
        Ok(())
    }

    /// Verify that both store prefixes carry the three subtrees.
    pub async fn verify(&self) -> Result<()> {
        for store in [&self.store_path, &self.local_store_path] {
            for tree in [STORE_BUILD_TREE, STORE_STAGE_TREE, STORE_INSTALL_TREE] {
                if !store.join(tree).is_dir() {
                    return Err(Error::StoreNotInitialized(store.clone()));
                }
            }
        }
        Ok(())
    }
}
