// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::Path;

use data_encoding::HEXLOWER;
use ring::digest::{Context, SHA1_FOR_LEGACY_USE_ONLY};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./checksum_test.rs"]
mod checksum_test;

/// Directories that never participate in change detection.
const IGNORED: [&str; 4] = ["node_modules", "_build", "_install", "_esy"];

/// Checksum the modification times of a source tree.
///
/// Walks every regular file under `source`, skipping the ignored
/// directories, and hashes `<path>:<mtime>` records sorted by path, so
/// the result is independent of directory iteration order. Identical
/// trees (same mtimes) produce identical checksums; any mtime change
/// produces a different one.
pub fn source_mtime_checksum(source: &Path) -> Result<String> {
    let mut records = Vec::new();
    collect(source, source, &mut records)?;
    records.sort();
    let mut context = Context::new(&SHA1_FOR_LEGACY_USE_ONLY);
    for (path, mtime) in records {
        context.update(path.as_bytes());
        context.update(b":");
        context.update(mtime.as_bytes());
        context.update(b"\n");
    }
    Ok(HEXLOWER.encode(context.finish().as_ref()))
}

fn collect(root: &Path, dir: &Path, records: &mut Vec<(String, String)>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).map_err(|err| Error::FileReadError(dir.to_owned(), err))?;
    for entry in entries {
        let entry = entry.map_err(|err| Error::FileReadError(dir.to_owned(), err))?;
        let path = entry.path();
        let file_type = entry
            .file_type()
            .map_err(|err| Error::FileReadError(path.clone(), err))?;
        if file_type.is_dir() {
            let name = entry.file_name();
            if IGNORED.iter().any(|ignored| name == *ignored) {
                continue;
            }
            collect(root, &path, records)?;
        } else if file_type.is_file() {
            let metadata = entry
                .metadata()
                .map_err(|err| Error::FileReadError(path.clone(), err))?;
            let mtime = metadata
                .modified()
                .map_err(|err| Error::FileReadError(path.clone(), err))?
                .duration_since(std::time::UNIX_EPOCH)
                .map(|elapsed| elapsed.as_nanos().to_string())
                .unwrap_or_else(|_| "0".to_owned());
            let relative = path
                .strip_prefix(root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            records.push((relative, mtime));
        }
    }
    Ok(())
}
