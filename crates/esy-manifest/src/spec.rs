// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::PathBuf;
use std::sync::Arc;

use indexmap::IndexMap;

/// One build in the sandbox graph, immutable after crawl.
///
/// Specs are shared by reference: a package reached through multiple
/// dependents is a single node, uniquely keyed by [`BuildSpec::id`].
#[derive(Clone, Debug)]
pub struct BuildSpec {
    /// Stable identifier; also the build's location in the store.
    pub id: String,
    pub name: String,
    pub version: Option<String>,
    /// Shell commands to run, in order. `None` means nothing to run.
    pub command: Option<Vec<String>>,
    /// Environment exported to consumers, in manifest order.
    pub exported_env: IndexMap<String, ExportDescriptor>,
    /// Absolute path of the package directory.
    pub source_path: PathBuf,
    /// Absolute path of the package's manifest, for diagnostics.
    pub manifest_path: PathBuf,
    /// The build writes into its own source tree and must therefore
    /// run against a throwaway copy.
    pub mutates_source_path: bool,
    /// Outputs go to the shared store and are reused across sandboxes.
    pub should_be_persisted: bool,
    pub dependencies: Vec<Arc<BuildSpec>>,
    /// Diagnostics gathered while crawling this package.
    pub errors: Vec<CrawlDiagnostic>,
}

impl BuildSpec {
    pub fn version_or_default(&self) -> &str {
        self.version.as_deref().unwrap_or("0.0.0")
    }

    /// This spec's diagnostics plus those of every transitive
    /// dependency, one entry per affected spec.
    pub fn all_errors(self: &Arc<Self>) -> Vec<(String, Vec<CrawlDiagnostic>)> {
        let mut collected = Vec::new();
        esy_graph::traverse_breadth_first(self, |spec: &Arc<BuildSpec>| {
            if !spec.errors.is_empty() {
                collected.push((spec.name.clone(), spec.errors.clone()));
            }
        });
        collected
    }
}

impl esy_graph::GraphNode for Arc<BuildSpec> {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[Self] {
        &self.dependencies
    }
}

/// How one exported environment variable behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportDescriptor {
    /// The value before `$var` substitution.
    pub value: String,
    pub scope: ExportScope,
    /// The declarer insists on being the sole producer of this
    /// variable; conflict detection fires if another binding appears.
    pub exclusive: bool,
    /// True only for auto-generated system variables, never for
    /// user-authored ones.
    pub builtin: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExportScope {
    /// Visible to direct dependents only.
    #[default]
    Local,
    /// Folded into every downstream build's environment.
    Global,
}

/// A diagnostic recorded on a spec during the crawl. Crawling never
/// aborts on these; the complete set is available for inspection.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CrawlDiagnostic {
    #[error("dependency cycle: {trace} -> {name}")]
    Cycle { name: String, trace: String },
    #[error("{0}")]
    UnresolvedDependencies(String),
    #[error("missing manifest for dependency {name} at {path}")]
    MissingManifest { name: String, path: PathBuf },
    #[error("unreadable manifest for dependency {name}: {detail}")]
    BrokenManifest { name: String, detail: String },
}

impl CrawlDiagnostic {
    /// Batch unresolved dependency names into a single diagnostic:
    /// the first three are named, the rest summarized.
    pub fn unresolved(names: &[String]) -> CrawlDiagnostic {
        let named: Vec<&str> = names.iter().take(3).map(String::as_str).collect();
        let message = if names.len() > named.len() {
            format!(
                "unable to resolve dependencies: {} (and {} more)",
                named.join(", "),
                names.len() - named.len()
            )
        } else {
            format!("unable to resolve dependencies: {}", named.join(", "))
        };
        CrawlDiagnostic::UnresolvedDependencies(message)
    }
}

/// A crawled sandbox: the root build plus the environment seeded from
/// the host process.
#[derive(Debug)]
pub struct BuildSandbox {
    pub root: Arc<BuildSpec>,
    /// Ordered name/value pairs: PATH, SHELL and the platform
    /// identifier variables.
    pub initial_env: Vec<(String, String)>,
}

/// Capture the seed environment from the host process.
pub fn host_seed_env() -> Vec<(String, String)> {
    let platform = match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win32",
        other => other,
    };
    let architecture = match std::env::consts::ARCH {
        "x86_64" => "x64",
        "aarch64" => "arm64",
        other => other,
    };
    vec![
        (
            "PATH".to_owned(),
            std::env::var("PATH").unwrap_or_default(),
        ),
        (
            "SHELL".to_owned(),
            std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_owned()),
        ),
        ("esy__platform".to_owned(), platform.to_owned()),
        ("esy__architecture".to_owned(), architecture.to_owned()),
        ("esy__target_platform".to_owned(), platform.to_owned()),
        ("esy__target_architecture".to_owned(), architecture.to_owned()),
    ]
}
