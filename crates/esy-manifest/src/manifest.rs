// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::{Error, Result};

#[cfg(test)]
#[path = "./manifest_test.rs"]
mod manifest_test;

/// A parsed `package.json`.
///
/// Only the fields that participate in the build graph are modeled;
/// everything else in the manifest is ignored. Mapping-typed fields
/// preserve the manifest's textual order.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: IndexMap<String, String>,
    #[serde(rename = "peerDependencies")]
    pub peer_dependencies: IndexMap<String, String>,
    pub esy: Option<BuildMetadata>,
    /// Set by the installer for packages fetched from an immutable
    /// source; its presence is what makes a build persistable.
    #[serde(rename = "_resolved")]
    pub resolved: Option<String>,
}

/// The `esy` extension block of a manifest.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct BuildMetadata {
    pub build: Option<CommandList>,
    #[serde(rename = "buildsInSource")]
    pub builds_in_source: bool,
    #[serde(rename = "exportedEnv")]
    pub exported_env: IndexMap<String, ExportedVar>,
}

/// One entry of `esy.exportedEnv`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct ExportedVar {
    pub val: Option<String>,
    pub scope: Option<String>,
    pub exclusive: bool,
}

/// Build commands: a single string promotes to a one-element sequence.
#[derive(Clone, Debug)]
pub struct CommandList(pub Vec<String>);

impl<'de> Deserialize<'de> for CommandList {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum OneOrMany {
            One(String),
            Many(Vec<String>),
        }
        Ok(match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(command) => CommandList(vec![command]),
            OneOrMany::Many(commands) => CommandList(commands),
        })
    }
}

impl Manifest {
    /// Read and parse the manifest at `path`.
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|err| Error::ManifestRead(path.to_owned(), err))?;
        serde_json::from_slice(&bytes).map_err(|err| Error::ManifestParse(path.to_owned(), err))
    }

    /// The dependency specs that participate in the build graph: the
    /// union of runtime and peer dependencies, order-preserved and
    /// deduplicated by `name@versionSpec`. Development and optional
    /// dependencies are excluded.
    pub fn build_dependencies(&self) -> Vec<(String, String)> {
        let mut seen = std::collections::HashSet::new();
        let mut specs = Vec::new();
        for (name, range) in self.dependencies.iter().chain(&self.peer_dependencies) {
            if seen.insert(format!("{name}@{range}")) {
                specs.push((name.clone(), range.clone()));
            }
        }
        specs
    }

    /// The build commands, if any, normalized to a sequence.
    pub fn build_commands(&self) -> Option<Vec<String>> {
        self.esy
            .as_ref()
            .and_then(|esy| esy.build.as_ref())
            .map(|commands| commands.0.clone())
    }

    pub fn builds_in_source(&self) -> bool {
        self.esy
            .as_ref()
            .map(|esy| esy.builds_in_source)
            .unwrap_or(false)
    }
}
