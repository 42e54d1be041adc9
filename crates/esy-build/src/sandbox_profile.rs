// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::Path;

#[cfg(test)]
#[path = "./sandbox_profile_test.rs"]
mod sandbox_profile_test;

/// Render the `sandbox-exec` policy confining a build's writes to its
/// own scratch and staging trees, `/dev/null`, and the operator's
/// allow list.
pub fn sandbox_profile<'a>(
    build_path: &Path,
    install_path: &Path,
    allowed_write_paths: impl IntoIterator<Item = &'a Path>,
) -> String {
    let mut profile = String::from(
        "(version 1)\n\
         (allow default)\n\
         (deny file-write*\n    (subpath \"/\"))\n\
         (allow file-write*\n    (literal \"/dev/null\")\n",
    );
    for path in [build_path, install_path]
        .into_iter()
        .chain(allowed_write_paths)
    {
        profile.push_str(&format!("    (subpath \"{}\")\n", path.display()));
    }
    profile.push_str(")\n");
    profile
}
