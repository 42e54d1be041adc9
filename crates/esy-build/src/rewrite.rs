// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::{Path, PathBuf};

use futures::{StreamExt, TryStreamExt};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./rewrite_test.rs"]
mod rewrite_test;

/// How many files may be rewritten concurrently.
const REWRITE_WIDTH: usize = 20;

/// Replace every occurrence of the staging path with the final install
/// path in the regular files under `root`.
///
/// Artifacts frequently embed their own install location; finalization
/// renames the tree, so the embedded bytes must move with it. `from`
/// and `to` must have equal byte lengths to keep offsets within
/// binaries valid. Returns the number of files that changed.
pub async fn rewrite_tree(root: &Path, from: &str, to: &str) -> Result<usize> {
    assert_eq!(
        from.len(),
        to.len(),
        "staging and final install paths must have equal lengths"
    );
    let mut files = Vec::new();
    collect_files(root, &mut files)?;
    let rewritten: Vec<bool> = futures::stream::iter(
        files
            .into_iter()
            .map(|file| async move { rewrite_file(file, from, to).await }),
    )
    .buffer_unordered(REWRITE_WIDTH)
    .try_collect()
    .await?;
    Ok(rewritten.into_iter().filter(|changed| *changed).count())
}

async fn rewrite_file(path: PathBuf, from: &str, to: &str) -> Result<bool> {
    let mut bytes = tokio::fs::read(&path)
        .await
        .map_err(|err| Error::FileReadError(path.clone(), err))?;
    let replaced = replace_in_place(&mut bytes, from.as_bytes(), to.as_bytes());
    if replaced == 0 {
        return Ok(false);
    }
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|err| Error::FileWriteError(path, err))?;
    Ok(true)
}

fn replace_in_place(buffer: &mut [u8], from: &[u8], to: &[u8]) -> usize {
    debug_assert_eq!(from.len(), to.len());
    if from.is_empty() || buffer.len() < from.len() {
        return 0;
    }
    let mut replaced = 0;
    let mut index = 0;
    while index + from.len() <= buffer.len() {
        if &buffer[index..index + from.len()] == from {
            buffer[index..index + from.len()].copy_from_slice(to);
            replaced += 1;
            index += from.len();
        } else {
            index += 1;
        }
    }
    replaced
}

fn collect_files(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
    let entries =
        std::fs::read_dir(dir).map_err(|err| Error::FileReadError(dir.to_owned(), err))?;
    for entry in entries {
        let entry = entry.map_err(|err| Error::FileReadError(dir.to_owned(), err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| Error::FileReadError(entry.path(), err))?;
        if file_type.is_dir() {
            collect_files(&entry.path(), files)?;
        } else if file_type.is_file() {
            files.push(entry.path());
        }
    }
    Ok(())
}
