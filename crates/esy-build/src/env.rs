// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::collections::HashMap;
use std::path::PathBuf;

use esy_manifest::{BuildSpec, ExportScope, normalize_package_name};

use crate::StoreConfig;
use crate::expand::substitute;

#[cfg(test)]
#[path = "./env_test.rs"]
mod env_test;

/// The prefix under which a build sees its own variables while it is
/// the one currently running.
pub const CURRENT_PREFIX: &str = "cur";

/// A fully-substituted environment variable together with the metadata
/// needed for conflict detection and diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
    /// The declarer insists on being the sole producer.
    pub exclusive: bool,
    /// Auto-generated system variable, never user-authored.
    pub builtin: bool,
    pub origin: Option<EnvOrigin>,
}

/// The package a variable came from, for diagnostics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnvOrigin {
    pub package: String,
    pub manifest_path: PathBuf,
}

impl EnvOrigin {
    pub fn of(spec: &BuildSpec) -> Self {
        Self {
            package: spec.name.clone(),
            manifest_path: spec.manifest_path.clone(),
        }
    }
}

/// The computed environment scopes of one package, produced once per
/// spec by a topological fold and consumed both by the task planner
/// and by the environment eject.
#[derive(Clone, Debug)]
pub struct PackageScopes {
    pub id: String,
    pub name: String,
    /// Built-in variables under the package's own (non-`cur`) prefix.
    pub builtins: Vec<EnvVar>,
    /// Substituted exports visible to direct dependents.
    pub local: Vec<EnvVar>,
    /// Substituted exports folded into every downstream environment.
    pub global: Vec<EnvVar>,
    pub bin_dir: String,
    pub man_dir: String,
    pub lib_dir: String,
}

/// The built-in variable set describing `spec`, all exclusive.
///
/// `current` selects the perspective: the build currently running sees
/// itself under the `cur` prefix with its staging install path, while
/// consumers see it under its normalized name with the finalized
/// install path.
pub fn builtin_scope(spec: &BuildSpec, config: &StoreConfig, current: bool) -> Vec<EnvVar> {
    let prefix = if current {
        CURRENT_PREFIX.to_owned()
    } else {
        normalize_package_name(&spec.name)
    };
    let root = if current && spec.mutates_source_path {
        config.build_path(spec)
    } else {
        config.root_path(spec)
    };
    let install = if current {
        config.install_path(spec)
    } else {
        config.final_install_path(spec)
    };
    let install = install.display().to_string();
    let depends = spec
        .dependencies
        .iter()
        .map(|dep| dep.name.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    let origin = EnvOrigin::of(spec);
    let var = |name: &str, value: String| EnvVar {
        name: format!("{prefix}__{name}"),
        value,
        exclusive: true,
        builtin: true,
        origin: Some(origin.clone()),
    };
    vec![
        var("name", spec.name.clone()),
        var("version", spec.version_or_default().to_owned()),
        var("root", root.display().to_string()),
        var("depends", depends),
        var("target_dir", config.build_path(spec).display().to_string()),
        var("install", install.clone()),
        var("bin", format!("{install}/bin")),
        var("sbin", format!("{install}/sbin")),
        var("lib", format!("{install}/lib")),
        var("man", format!("{install}/man")),
        var("doc", format!("{install}/doc")),
        var("stublibs", format!("{install}/stublibs")),
        var("toplevel", format!("{install}/toplevel")),
        var("share", format!("{install}/share")),
        var("etc", format!("{install}/etc")),
    ]
}

/// Compute the scopes of `spec` given the scopes of its direct
/// dependencies.
///
/// The evaluation scope used to substitute `$var` references in the
/// spec's own exports is the union of each direct dependency's
/// built-in scope and local exports, plus the spec's own built-in
/// scope under its non-`cur` prefix. Transitive dependencies' global
/// exports are deliberately not part of it.
pub fn package_scopes(
    spec: &BuildSpec,
    config: &StoreConfig,
    direct_deps: &[&PackageScopes],
) -> PackageScopes {
    let builtins = builtin_scope(spec, config, false);

    let mut evaluation: HashMap<String, String> = HashMap::new();
    for dep in direct_deps {
        for var in dep.builtins.iter().chain(&dep.local) {
            evaluation.insert(var.name.clone(), var.value.clone());
        }
    }
    for var in &builtins {
        evaluation.insert(var.name.clone(), var.value.clone());
    }

    let origin = EnvOrigin::of(spec);
    let mut local = Vec::new();
    let mut global = Vec::new();
    for (name, descriptor) in &spec.exported_env {
        let value = substitute(&descriptor.value, |reference| {
            evaluation.get(reference).cloned()
        });
        let var = EnvVar {
            name: name.clone(),
            value,
            exclusive: descriptor.exclusive,
            builtin: false,
            origin: Some(origin.clone()),
        };
        match descriptor.scope {
            ExportScope::Global => global.push(var),
            ExportScope::Local => local.push(var),
        }
    }

    let final_install = config.final_install_path(spec).display().to_string();
    PackageScopes {
        id: spec.id.clone(),
        name: spec.name.clone(),
        builtins,
        local,
        global,
        bin_dir: format!("{final_install}/bin"),
        man_dir: format!("{final_install}/man"),
        lib_dir: format!("{final_install}/lib"),
    }
}

/// Naming lints for user-authored exports.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum NamespaceLint {
    #[error(
        "{package} exports non-global variable {variable} outside its {prefix}__ namespace"
    )]
    NotPrefixed {
        package: String,
        variable: String,
        prefix: String,
    },
    #[error("{package} exports {variable} with incorrect casing of the {prefix}__ prefix")]
    WrongCase {
        package: String,
        variable: String,
        prefix: String,
    },
    #[error(
        "{package} exports global variable {variable} which may clobber another package's namespace"
    )]
    GlobalNamespaceClash {
        package: String,
        variable: String,
        prefix: String,
    },
}

/// Check the user-authored exports of `spec` against the namespacing
/// conventions.
pub fn lint_exports(spec: &BuildSpec) -> Vec<NamespaceLint> {
    let prefix = normalize_package_name(&spec.name);
    let mut lints = Vec::new();
    for (name, descriptor) in &spec.exported_env {
        match descriptor.scope {
            ExportScope::Local if !name.starts_with(&prefix) => {
                if name.to_lowercase().starts_with(&prefix) {
                    lints.push(NamespaceLint::WrongCase {
                        package: spec.name.clone(),
                        variable: name.clone(),
                        prefix: prefix.clone(),
                    });
                } else {
                    lints.push(NamespaceLint::NotPrefixed {
                        package: spec.name.clone(),
                        variable: name.clone(),
                        prefix: prefix.clone(),
                    });
                }
            }
            ExportScope::Global if name.contains("__") && !name.starts_with(&prefix) => {
                lints.push(NamespaceLint::GlobalNamespaceClash {
                    package: spec.name.clone(),
                    variable: name.clone(),
                    prefix: prefix.clone(),
                });
            }
            _ => (),
        }
    }
    lints
}
