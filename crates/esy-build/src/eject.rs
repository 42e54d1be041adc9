// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::collections::HashMap;
use std::sync::Arc;

use esy_manifest::{BuildSandbox, BuildSpec};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::StoreConfig;
use crate::env::{self, EnvVar, NamespaceLint, PackageScopes};

#[cfg(test)]
#[path = "./eject_test.rs"]
mod eject_test;

#[cfg(windows)]
const EOL: &str = "\r\n";
#[cfg(unix)]
const EOL: &str = "\n";

/// One commented group of an ejected environment.
#[derive(Clone, Debug)]
pub struct EnvGroup {
    pub header: String,
    pub vars: Vec<EnvVar>,
}

/// A human-readable environment dump for consumption outside the
/// orchestrator, together with the diagnostics discovered while
/// flattening it.
#[derive(Debug)]
pub struct EjectedEnvironment {
    pub groups: Vec<EnvGroup>,
    pub conflicts: Vec<ConflictDiagnostic>,
    pub lints: Vec<NamespaceLint>,
}

/// An exclusivity violation between two bindings of one variable.
#[derive(Clone, Debug)]
pub struct ConflictDiagnostic {
    pub variable: String,
    /// True when the overridden binding was an auto-generated system
    /// variable rather than a user-authored export.
    pub builtin: bool,
    pub message: String,
}

/// Compute the ejected environment of a crawled sandbox: one group of
/// built-in variables and one group of exports per package, dependency
/// order, root last.
pub fn eject_environment(sandbox: &BuildSandbox, config: &StoreConfig) -> EjectedEnvironment {
    let config = config.clone();
    let mut ordered: Vec<PackageScopes> = Vec::new();
    let mut lints = Vec::new();
    esy_graph::topological_fold(
        &sandbox.root,
        &mut |direct: &[PackageScopes], _all: &[PackageScopes], spec: &Arc<BuildSpec>| {
            let direct: Vec<&PackageScopes> = direct.iter().collect();
            let scopes = env::package_scopes(spec, &config, &direct);
            lints.extend(env::lint_exports(spec));
            ordered.push(scopes.clone());
            scopes
        },
    );

    let mut groups = Vec::new();
    for scopes in &ordered {
        groups.push(EnvGroup {
            header: format!("Built-in variables for {}", scopes.name),
            vars: scopes.builtins.clone(),
        });
        if !scopes.local.is_empty() || !scopes.global.is_empty() {
            groups.push(EnvGroup {
                header: format!("Variables exported by {}", scopes.name),
                vars: scopes
                    .local
                    .iter()
                    .chain(&scopes.global)
                    .cloned()
                    .collect(),
            });
        }
    }

    let conflicts = detect_conflicts(&groups);
    EjectedEnvironment {
        groups,
        conflicts,
        lints,
    }
}

fn describe(var: &EnvVar) -> String {
    match &var.origin {
        Some(origin) => format!(
            "{} ({})",
            origin.package,
            origin.manifest_path.display()
        ),
        None => "the environment".to_owned(),
    }
}

/// Track every variable ever set while flattening `groups`; report a
/// diagnostic when a binding overrides an exclusive incumbent, and
/// another when an exclusive challenger lands on an existing name.
/// Both fire when both sides are exclusive.
fn detect_conflicts(groups: &[EnvGroup]) -> Vec<ConflictDiagnostic> {
    let mut seen: HashMap<String, EnvVar> = HashMap::new();
    let mut conflicts = Vec::new();
    for group in groups {
        for var in &group.vars {
            if let Some(incumbent) = seen.get(&var.name) {
                if incumbent.exclusive {
                    let message = if incumbent.builtin {
                        format!(
                            "built-in variable {} cannot be overridden by {}",
                            var.name,
                            describe(var),
                        )
                    } else {
                        format!(
                            "{} is declared exclusive by {} but overridden by {}",
                            var.name,
                            describe(incumbent),
                            describe(var),
                        )
                    };
                    conflicts.push(ConflictDiagnostic {
                        variable: var.name.clone(),
                        builtin: incumbent.builtin,
                        message,
                    });
                }
                if var.exclusive {
                    conflicts.push(ConflictDiagnostic {
                        variable: var.name.clone(),
                        builtin: var.builtin,
                        message: format!(
                            "{} declares {} exclusive but it is already set by {}",
                            describe(var),
                            var.name,
                            describe(incumbent),
                        ),
                    });
                }
            }
            seen.insert(var.name.clone(), var.clone());
        }
    }
    conflicts
}

/// Render groups as a sourceable shell fragment.
pub fn render(groups: &[EnvGroup]) -> String {
    let blocks: Vec<String> = groups
        .iter()
        .map(|group| {
            let mut lines = vec![format!("# {}", group.header)];
            lines.extend(
                group
                    .vars
                    .iter()
                    .map(|var| format!("export {}=\"{}\"", var.name, var.value)),
            );
            lines.join(EOL)
        })
        .collect();
    let mut rendered = blocks.join(&format!("{EOL}{EOL}"));
    rendered.push_str(EOL);
    rendered
}

static EXPORT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^export ([A-Za-z0-9_]+)="(.*)"$"#).expect("invalid export regex"));

/// Recover the name/value pairs of a rendered dump.
pub fn parse(rendered: &str) -> Vec<(String, String)> {
    rendered
        .lines()
        .filter_map(|line| {
            let captures = EXPORT_LINE.captures(line.trim_end())?;
            Some((captures[1].to_owned(), captures[2].to_owned()))
        })
        .collect()
}
