// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

//! The package manifest model and the sandbox crawler.
//!
//! A sandbox is a directory tree rooted at a `package.json` whose
//! transitive dependencies, resolved through the standard nested
//! module-resolution rule, form the build graph. Crawling a sandbox
//! produces an immutable graph of [`BuildSpec`] nodes with stable,
//! content-derived identifiers.

mod crawl;
mod error;
pub mod fixtures;
mod ident;
mod manifest;
mod resolver;
mod spec;

pub use crawl::crawl_sandbox;
pub use error::{Error, Result};
pub use ident::{build_id, normalize_package_name, test_mode_enabled, TEST_MODE_VAR};
pub use manifest::{BuildMetadata, CommandList, ExportedVar, Manifest};
pub use resolver::{NodeModulesResolver, PackageResolver};
pub use spec::{
    BuildSandbox,
    BuildSpec,
    CrawlDiagnostic,
    ExportDescriptor,
    ExportScope,
    host_seed_env,
};
