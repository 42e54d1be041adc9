// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Diagnostic, Debug, Error)]
pub enum Error {
    #[error("No package manifest found at {0}")]
    #[diagnostic(help("the sandbox root must contain a package.json"))]
    SandboxManifestNotFound(PathBuf),
    #[error("Failed to read manifest {0}")]
    ManifestRead(PathBuf, #[source] std::io::Error),
    #[error("Failed to parse manifest {0}")]
    ManifestParse(PathBuf, #[source] serde_json::Error),
    #[error("Unable to resolve package {name} from {base_dir}")]
    PackageNotFound { name: String, base_dir: PathBuf },
    #[error("Failed to resolve real path of {0}")]
    Canonicalize(PathBuf, #[source] std::io::Error),
}
