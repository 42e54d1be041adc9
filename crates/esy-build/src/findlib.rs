// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::Path;

use itertools::Itertools;

#[cfg(test)]
#[path = "./findlib_test.rs"]
mod findlib_test;

/// Render a `findlib.conf` for a build.
///
/// While the build runs, `destdir` points at the staging lib tree so
/// that installed artifacts land in the pre-rename location; once the
/// build is finalized the configuration is rewritten with the final
/// install paths so that consumers see finalized artifacts.
pub fn findlib_conf<'a>(
    dependency_lib_dirs: impl IntoIterator<Item = &'a Path>,
    own_lib_dir: &Path,
) -> String {
    let path = dependency_lib_dirs
        .into_iter()
        .map(|dir| dir.display().to_string())
        .chain([own_lib_dir.display().to_string()])
        .join(":");
    format!(
        concat!(
            "path = \"{path}\"\n",
            "destdir = \"{destdir}\"\n",
            "ldconf = \"ignore\"\n",
            "ocamlc = \"ocamlc.opt\"\n",
            "ocamlopt = \"ocamlopt.opt\"\n",
            "ocamlcp = \"ocamlcp.opt\"\n",
            "ocamldep = \"ocamldep.opt\"\n",
            "ocamldoc = \"ocamldoc.opt\"\n",
            "ocamllex = \"ocamllex.opt\"\n",
        ),
        path = path,
        destdir = own_lib_dir.display(),
    )
}
