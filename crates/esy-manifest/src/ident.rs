// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use data_encoding::HEXLOWER;
use ring::digest::{SHA1_FOR_LEGACY_USE_ONLY, digest};
use serde_json::{Value, json};

use crate::Manifest;

#[cfg(test)]
#[path = "./ident_test.rs"]
mod ident_test;

/// When this variable is set, identifiers omit their hash suffix so
/// that fixture output stays diffable. Never used in production.
pub const TEST_MODE_VAR: &str = "ESY__TEST";

pub fn test_mode_enabled() -> bool {
    std::env::var_os(TEST_MODE_VAR).is_some()
}

/// Normalize a package name into a valid POSIX path component and
/// environment variable prefix.
pub fn normalize_package_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '@' => {}
            '/' => normalized.push_str("__slash__"),
            '.' => normalized.push_str("__dot__"),
            '-' => normalized.push('_'),
            '_' => normalized.push_str("__"),
            _ => normalized.extend(ch.to_lowercase()),
        }
    }
    normalized
}

/// Compute the stable identifier of a build.
///
/// The identifier covers the seeded environment, the package's own
/// build definition, its source, and the identifiers of its direct
/// dependencies, so it transitively pins the entire build definition.
/// It is stable under permutations of mapping iteration and dependency
/// orderings so long as the dependency ids themselves are unchanged.
pub fn build_id(
    seed_env: &[(String, String)],
    manifest: &Manifest,
    name: &str,
    version: Option<&str>,
    source: &str,
    dependency_ids: &[String],
) -> String {
    let normalized = normalize_package_name(name);
    let version = version.unwrap_or("0.0.0");
    if test_mode_enabled() {
        return format!("{normalized}-{version}");
    }

    let env: serde_json::Map<String, Value> = seed_env
        .iter()
        .map(|(name, value)| (name.clone(), Value::String(value.clone())))
        .collect();
    let build = match &manifest.esy {
        Some(esy) => json!({
            "build": esy.build.as_ref().map(|commands| commands.0.clone()),
            "buildsInSource": esy.builds_in_source,
            "exportedEnv": esy
                .exported_env
                .iter()
                .map(|(name, var)| {
                    (
                        name.clone(),
                        json!({
                            "val": var.val,
                            "scope": var.scope,
                            "exclusive": var.exclusive,
                        }),
                    )
                })
                .collect::<serde_json::Map<String, Value>>(),
        }),
        None => Value::Null,
    };
    let description = json!({
        "env": env,
        "name": name,
        "version": version,
        "esy": build,
        "source": source,
        "dependencies": dependency_ids,
    });

    let mut serialized = String::new();
    write_canonical(&description, &mut serialized);
    let hash = digest(&SHA1_FOR_LEGACY_USE_ONLY, serialized.as_bytes());
    format!("{normalized}-{version}-{}", HEXLOWER.encode(hash.as_ref()))
}

/// Serialize a value so that equivalent inputs hash identically:
/// mappings sorted by key, sequences in order, booleans and numbers as
/// literals, strings as-is.
fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(boolean) => out.push_str(if *boolean { "true" } else { "false" }),
        Value::Number(number) => out.push_str(&number.to_string()),
        Value::String(string) => out.push_str(string),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        Value::Object(entries) => {
            let mut keys: Vec<&String> = entries.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(key);
                out.push(':');
                write_canonical(&entries[key], out);
            }
            out.push('}');
        }
    }
}
