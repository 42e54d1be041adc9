// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

//! Build planning and execution for crawled sandboxes.
//!
//! A crawled [`esy_manifest::BuildSandbox`] is turned into a plan of
//! [`BuildTask`]s by [`plan_build`], each carrying its fully-composed
//! environment and rendered commands. [`build`] then executes the plan
//! in dependency order against the content-addressed store described
//! by [`StoreConfig`].

mod checksum;
mod config;
mod driver;
mod eject;
mod env;
mod error;
mod exec;
mod expand;
mod findlib;
mod rewrite;
mod sandbox_profile;
mod task;

pub use checksum::source_mtime_checksum;
pub use config::{
    INSTALL_TREES,
    PREFIX_VAR,
    STORE_BUILD_TREE,
    STORE_INSTALL_TREE,
    STORE_STAGE_TREE,
    StoreConfig,
};
pub use driver::{TaskStatus, build};
pub use eject::{ConflictDiagnostic, EjectedEnvironment, EnvGroup, eject_environment, parse, render};
pub use env::{
    CURRENT_PREFIX,
    EnvOrigin,
    EnvVar,
    NamespaceLint,
    PackageScopes,
    builtin_scope,
    lint_exports,
    package_scopes,
};
pub use error::{Error, Result};
pub use expand::{shell_expand, substitute};
pub use findlib::findlib_conf;
pub use rewrite::rewrite_tree;
pub use sandbox_profile::sandbox_profile;
pub use task::{BuildTask, CommandLine, plan_build};
