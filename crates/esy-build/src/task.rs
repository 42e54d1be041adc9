// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::sync::Arc;

use esy_manifest::{BuildSandbox, BuildSpec};
use indexmap::IndexMap;

use crate::StoreConfig;
use crate::env::{self, EnvVar, PackageScopes};
use crate::expand::{shell_expand, substitute};

#[cfg(test)]
#[path = "./task_test.rs"]
mod task_test;

/// One schedulable build: a spec together with its fully-composed
/// environment and rendered commands.
///
/// Tasks are created once per spec by [`plan_build`], consumed by the
/// driver, and discarded when the root task completes.
#[derive(Debug)]
pub struct BuildTask {
    pub id: String,
    pub spec: Arc<BuildSpec>,
    /// The environment the commands run under, in composition order.
    pub env: IndexMap<String, EnvVar>,
    pub command: Vec<CommandLine>,
    pub dependencies: Vec<Arc<BuildTask>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandLine {
    pub raw: String,
    pub rendered: String,
}

impl BuildTask {
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env.get(name).map(|var| var.value.as_str())
    }
}

impl esy_graph::GraphNode for Arc<BuildTask> {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[Self] {
        &self.dependencies
    }
}

/// Compute the build plan for a crawled sandbox: one task per spec,
/// each carrying the environment of §task-assembly and its commands
/// rendered against that environment.
pub fn plan_build(sandbox: &BuildSandbox, config: &StoreConfig) -> Arc<BuildTask> {
    let config = config.clone();
    let initial_env = sandbox.initial_env.clone();
    let (root_task, _) = esy_graph::topological_fold(
        &sandbox.root,
        &mut |direct: &[(Arc<BuildTask>, PackageScopes)],
              all: &[(Arc<BuildTask>, PackageScopes)],
              spec: &Arc<BuildSpec>| {
            let direct_scopes: Vec<&PackageScopes> =
                direct.iter().map(|(_, scopes)| scopes).collect();
            let scopes = env::package_scopes(spec, &config, &direct_scopes);
            for lint in env::lint_exports(spec) {
                tracing::warn!("{lint}");
            }

            let transitive: Vec<&PackageScopes> =
                all.iter().map(|(_, scopes)| scopes).collect();
            let task_env =
                assemble_env(spec, &config, &initial_env, &direct_scopes, &transitive, &scopes);
            let command = spec
                .command
                .clone()
                .unwrap_or_default()
                .into_iter()
                .map(|raw| {
                    let rendered = shell_expand(&raw, |name| {
                        task_env.get(name).map(|var| var.value.clone())
                    });
                    CommandLine { raw, rendered }
                })
                .collect();

            let task = Arc::new(BuildTask {
                id: spec.id.clone(),
                spec: Arc::clone(spec),
                env: task_env,
                command,
                dependencies: direct.iter().map(|(task, _)| Arc::clone(task)).collect(),
            });
            (task, scopes)
        },
    );
    root_task
}

/// Assemble the environment a build runs under. Order matters; later
/// writes override earlier ones.
fn assemble_env(
    spec: &Arc<BuildSpec>,
    config: &StoreConfig,
    initial_env: &[(String, String)],
    direct: &[&PackageScopes],
    transitive: &[&PackageScopes],
    own: &PackageScopes,
) -> IndexMap<String, EnvVar> {
    let mut acc: IndexMap<String, EnvVar> = IndexMap::new();
    let mut insert = |acc: &mut IndexMap<String, EnvVar>, var: EnvVar| {
        acc.insert(var.name.clone(), var);
    };

    // the findlib configuration is written into the build scratch
    // before any command runs
    let findlib_conf = config
        .build_path(spec)
        .join("_esy")
        .join("findlib.conf")
        .display()
        .to_string();
    insert(
        &mut acc,
        EnvVar {
            name: "OCAMLFIND_CONF".to_owned(),
            value: findlib_conf,
            exclusive: false,
            builtin: true,
            origin: Some(env::EnvOrigin::of(spec)),
        },
    );

    // executable and man lookup across every transitive dependency
    let bins: Vec<&str> = transitive.iter().map(|dep| dep.bin_dir.as_str()).collect();
    let mans: Vec<&str> = transitive.iter().map(|dep| dep.man_dir.as_str()).collect();
    let search_path = |dirs: &[&str], tail: &str| {
        if dirs.is_empty() {
            tail.to_owned()
        } else {
            format!("{}:{tail}", dirs.join(":"))
        }
    };
    insert(
        &mut acc,
        EnvVar {
            name: "PATH".to_owned(),
            value: search_path(&bins, "$PATH"),
            exclusive: false,
            builtin: true,
            origin: None,
        },
    );
    insert(
        &mut acc,
        EnvVar {
            name: "MAN_PATH".to_owned(),
            value: search_path(&mans, "$MAN_PATH"),
            exclusive: false,
            builtin: true,
            origin: None,
        },
    );

    // the running build's own view of itself
    for var in env::builtin_scope(spec, config, true) {
        insert(&mut acc, var);
    }
    // direct dependencies' local exports, in dependency order
    for dep in direct {
        for var in &dep.local {
            insert(&mut acc, var.clone());
        }
    }
    // the build's own local exports
    for var in &own.local {
        insert(&mut acc, var.clone());
    }

    // global exports folded leaves-first: a downstream global shadows
    // an upstream one and may refer back to the shadowed value through
    // re-substitution against the accumulator
    for scope in transitive.iter().map(|dep| &dep.global).chain([&own.global]) {
        for var in scope {
            let value = substitute(&var.value, |name| {
                acc.get(name).map(|existing| existing.value.clone())
            });
            let mut var = var.clone();
            var.value = value;
            insert(&mut acc, var);
        }
    }

    // seed environment last: a seed for an already-bound name resolves
    // that binding's self-reference against the host value, everything
    // else is inserted as-is
    for (name, host_value) in initial_env {
        match acc.get(name).cloned() {
            Some(existing) => {
                let bound = existing.value.clone();
                let value = substitute(&bound, |reference| {
                    if reference == name {
                        Some(host_value.clone())
                    } else {
                        acc.get(reference).map(|var| var.value.clone())
                    }
                });
                let mut var = existing;
                var.value = value;
                insert(&mut acc, var);
            }
            None => insert(
                &mut acc,
                EnvVar {
                    name: name.clone(),
                    value: host_value.clone(),
                    exclusive: false,
                    builtin: false,
                    origin: None,
                },
            ),
        }
    }

    acc
}
