// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
pub enum Error {
    #[error("Failed to create directory {0}")]
    DirectoryCreateError(PathBuf, #[source] std::io::Error),
    #[error("Failed to remove {0}")]
    RemoveError(PathBuf, #[source] std::io::Error),
    #[error("Failed to open file {0}")]
    FileOpenError(PathBuf, #[source] std::io::Error),
    #[error("Failed to read file {0}")]
    FileReadError(PathBuf, #[source] std::io::Error),
    #[error("Failed to write file {0}")]
    FileWriteError(PathBuf, #[source] std::io::Error),
    #[error("Failed to rename {from} to {to}")]
    RenameError {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to link {0}")]
    SymlinkError(PathBuf, #[source] std::io::Error),
    #[error("Failed to spawn build command `{command}`")]
    ProcessSpawnError {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Build command `{command}` failed with {status}")]
    #[diagnostic(help("the complete build output is kept in the _esy/log file of the build"))]
    CommandFailed {
        command: String,
        status: String,
        log_path: PathBuf,
    },
    #[error("dependencies are not built")]
    DependenciesNotBuilt,
    #[error("build of {id} failed")]
    BuildFailed { id: String },
    #[error("Package {name} has unrecoverable crawl errors")]
    #[diagnostic(help("inspect the crawl diagnostics recorded on the build graph"))]
    CrawlErrors { name: String },
    #[error("No home directory to place the store in")]
    NoStorePrefix,
    #[error("Store at {0} is not initialized")]
    StoreNotInitialized(PathBuf),
    #[error(transparent)]
    #[diagnostic(forward(0))]
    Manifest(#[from] esy_manifest::Error),
}
