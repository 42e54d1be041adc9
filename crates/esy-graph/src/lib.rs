// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

//! Graph primitives shared by the sandbox crawler, the task planner
//! and the build driver.
//!
//! Everything in this crate is generic over [`GraphNode`], so the same
//! traversal and fold machinery serves build specs during planning and
//! build tasks during execution.

mod fold;
mod node;
mod walk;

pub use fold::{topological_fold, topological_fold_async};
pub use node::GraphNode;
pub use walk::{collect_transitive_dependencies, traverse_breadth_first, traverse_depth_first};
