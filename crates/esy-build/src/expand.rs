// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

#[cfg(test)]
#[path = "./expand_test.rs"]
mod expand_test;

static VAR_REFERENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$([A-Za-z0-9_]+)").expect("invalid variable regex"));

/// Substitute `$var` references through `lookup`.
///
/// An unresolved name passes through literally, so substitution is a
/// left fixed point: a value without references renders to itself.
pub fn substitute<L>(value: &str, lookup: L) -> String
where
    L: Fn(&str) -> Option<String>,
{
    VAR_REFERENCE
        .replace_all(value, |captures: &Captures| {
            let name = &captures[1];
            lookup(name).unwrap_or_else(|| format!("${name}"))
        })
        .into_owned()
}

/// Shell-style expansion (`${name}`, `${name:-default}`, …) used when
/// rendering command strings at execution time.
pub fn shell_expand<L>(value: &str, lookup: L) -> String
where
    L: Fn(&str) -> Option<String>,
{
    shellexpand::env_with_context_no_errors(value, |name: &str| lookup(name)).into_owned()
}
