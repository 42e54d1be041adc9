// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

/// A node in a dependency graph.
///
/// The graph must be a directed acyclic graph in which every node is
/// uniquely identified by [`GraphNode::id`]. Two nodes with the same id
/// are treated as the same node everywhere in this crate, which is what
/// allows shared subgraphs to be visited and folded exactly once.
pub trait GraphNode {
    /// The unique identifier of this node.
    fn id(&self) -> &str;

    /// The direct dependencies of this node, in declaration order.
    fn dependencies(&self) -> &[Self]
    where
        Self: Sized;
}
