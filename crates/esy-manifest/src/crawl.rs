// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::manifest::Manifest;
use crate::resolver::PackageResolver;
use crate::spec::{
    BuildSandbox,
    BuildSpec,
    CrawlDiagnostic,
    ExportDescriptor,
    ExportScope,
    host_seed_env,
};
use crate::{Error, Result, ident};

#[cfg(test)]
#[path = "./crawl_test.rs"]
mod crawl_test;

/// Crawl the sandbox rooted at `sandbox_path` into an immutable build
/// graph.
///
/// Crawling walks `<sandbox_path>/package.json` and the transitive
/// dependency manifests reachable through `resolver`. Cycles,
/// unresolved names and broken dependency manifests are recorded as
/// diagnostics on the affected spec and never abort the walk; only a
/// missing or unreadable manifest at the root is fatal.
pub async fn crawl_sandbox<R>(sandbox_path: &Path, resolver: &R) -> Result<BuildSandbox>
where
    R: PackageResolver + Sync,
{
    let manifest_path = sandbox_path.join("package.json");
    let initial_env = host_seed_env();
    let mut crawler = Crawler {
        resolver,
        seed_env: initial_env.clone(),
        specs: HashMap::new(),
    };
    let root = crawler
        .crawl_package(manifest_path, Vec::new(), true)
        .await
        .map_err(|err| match err {
            Error::ManifestRead(path, io)
                if io.kind() == std::io::ErrorKind::NotFound =>
            {
                Error::SandboxManifestNotFound(path)
            }
            other => other,
        })?;
    Ok(BuildSandbox { root, initial_env })
}

struct Crawler<'r, R> {
    resolver: &'r R,
    seed_env: Vec<(String, String)>,
    /// Specs by canonical manifest path: a package reached through
    /// multiple paths is crawled exactly once.
    specs: HashMap<PathBuf, Arc<BuildSpec>>,
}

impl<R> Crawler<'_, R>
where
    R: PackageResolver + Sync,
{
    fn crawl_package(
        &mut self,
        manifest_path: PathBuf,
        trace: Vec<String>,
        is_root: bool,
    ) -> BoxFuture<'_, Result<Arc<BuildSpec>>> {
        async move {
            let manifest_path =
                dunce::canonicalize(&manifest_path).unwrap_or(manifest_path);
            if let Some(cached) = self.specs.get(&manifest_path) {
                return Ok(Arc::clone(cached));
            }

            let manifest = Manifest::read(&manifest_path).await?;
            let source_path = manifest_path
                .parent()
                .map(Path::to_owned)
                .unwrap_or_default();
            let name = manifest.name.clone().unwrap_or_else(|| {
                source_path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            tracing::debug!("crawling {name} at {}", source_path.display());

            let mut errors = Vec::new();
            let mut unresolved = Vec::new();
            let mut dependencies = Vec::new();
            let mut child_trace = trace;
            child_trace.push(name.clone());
            for (dep_name, _range) in manifest.build_dependencies() {
                if child_trace.contains(&dep_name) {
                    errors.push(CrawlDiagnostic::Cycle {
                        name: dep_name,
                        trace: child_trace.join(" -> "),
                    });
                    continue;
                }
                let resolved = match self.resolver.resolve(&source_path, &dep_name) {
                    Ok(path) => path,
                    Err(_) => {
                        unresolved.push(dep_name);
                        continue;
                    }
                };
                match self
                    .crawl_package(resolved, child_trace.clone(), false)
                    .await
                {
                    Ok(spec) => dependencies.push(spec),
                    Err(Error::ManifestRead(path, io))
                        if io.kind() == std::io::ErrorKind::NotFound =>
                    {
                        errors.push(CrawlDiagnostic::MissingManifest {
                            name: dep_name,
                            path,
                        });
                    }
                    Err(err) => {
                        errors.push(CrawlDiagnostic::BrokenManifest {
                            name: dep_name,
                            detail: err.to_string(),
                        });
                    }
                }
            }
            if !unresolved.is_empty() {
                errors.push(CrawlDiagnostic::unresolved(&unresolved));
            }

            let source = match &manifest.resolved {
                Some(url) => url.clone(),
                None => {
                    let real = dunce::canonicalize(&source_path)
                        .map_err(|err| Error::Canonicalize(source_path.clone(), err))?;
                    format!("local:{}", real.display())
                }
            };
            let dependency_ids: Vec<String> =
                dependencies.iter().map(|dep| dep.id.clone()).collect();
            let id = ident::build_id(
                &self.seed_env,
                &manifest,
                &name,
                manifest.version.as_deref(),
                &source,
                &dependency_ids,
            );

            let spec = Arc::new(BuildSpec {
                id,
                name,
                version: manifest.version.clone(),
                command: manifest.build_commands(),
                exported_env: exported_env(&manifest),
                source_path,
                manifest_path: manifest_path.clone(),
                mutates_source_path: manifest.builds_in_source(),
                should_be_persisted: !is_root && manifest.resolved.is_some(),
                dependencies,
                errors,
            });
            self.specs.insert(manifest_path, Arc::clone(&spec));
            Ok(spec)
        }
        .boxed()
    }
}

/// User-authored exports from the manifest. A null-valued export
/// contributes nothing.
fn exported_env(
    manifest: &Manifest,
) -> indexmap::IndexMap<String, ExportDescriptor> {
    let Some(esy) = &manifest.esy else {
        return Default::default();
    };
    esy.exported_env
        .iter()
        .filter_map(|(name, var)| {
            let value = var.val.clone()?;
            let scope = if var.scope.as_deref() == Some("global") {
                ExportScope::Global
            } else {
                ExportScope::Local
            };
            Some((
                name.clone(),
                ExportDescriptor {
                    value,
                    scope,
                    exclusive: var.exclusive,
                    builtin: false,
                },
            ))
        })
        .collect()
}
