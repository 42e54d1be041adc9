// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use crate::GraphNode;

#[cfg(test)]
#[path = "./fold_test.rs"]
mod fold_test;

/// Fold a dependency graph bottom-up, computing exactly one value per
/// distinct node id.
///
/// For every node, `f` receives the values of the node's direct
/// dependencies in declaration order, the values of all of its
/// transitive dependencies de-duplicated by id in a leaves-first
/// topological order, and the node itself. Results are memoized by id:
/// a node whose value was computed through one parent is reused when
/// reached through another.
///
/// Panics when a back-edge is encountered. Cycles must have been
/// rejected while the graph was constructed.
pub fn topological_fold<N, V, F>(root: &N, f: &mut F) -> V
where
    N: GraphNode,
    V: Clone,
    F: FnMut(&[V], &[V], &N) -> V,
{
    let mut memo = HashMap::new();
    let mut in_progress = HashSet::new();
    let (value, _) = fold_node(root, f, &mut memo, &mut in_progress);
    value
}

type Contributions<V> = Vec<(String, V)>;

fn fold_node<N, V, F>(
    node: &N,
    f: &mut F,
    memo: &mut HashMap<String, (V, Contributions<V>)>,
    in_progress: &mut HashSet<String>,
) -> (V, Contributions<V>)
where
    N: GraphNode,
    V: Clone,
    F: FnMut(&[V], &[V], &N) -> V,
{
    if let Some(cached) = memo.get(node.id()) {
        return cached.clone();
    }
    if !in_progress.insert(node.id().to_owned()) {
        panic!("dependency graph contains a cycle at {}", node.id());
    }

    let mut direct = Vec::new();
    let mut all: Contributions<V> = Vec::new();
    let mut seen = HashSet::new();
    for dep in node.dependencies() {
        let (value, contributions) = fold_node(dep, f, memo, in_progress);
        direct.push(value);
        for (id, value) in contributions {
            if seen.insert(id.clone()) {
                all.push((id, value));
            }
        }
    }

    let all_values: Vec<V> = all.iter().map(|(_, v)| v.clone()).collect();
    let value = f(&direct, &all_values, node);

    let mut contributions = all;
    contributions.push((node.id().to_owned(), value.clone()));
    in_progress.remove(node.id());
    memo.insert(node.id().to_owned(), (value.clone(), contributions.clone()));
    (value, contributions)
}

type FoldCell<V> = Shared<BoxFuture<'static, (V, Arc<Contributions<V>>)>>;
type FoldMemo<V> = Arc<Mutex<HashMap<String, FoldCell<V>>>>;

/// The suspending form of [`topological_fold`].
///
/// The contract is the same, but `f` returns a future and the memo
/// cell stores the in-flight computation rather than only the resolved
/// value: a second reference to the same node awaits the computation
/// already underway instead of starting another one. Direct
/// dependencies of a node are awaited concurrently; `f` itself decides
/// how much of its own work may overlap by suspending.
pub async fn topological_fold_async<N, V, F, Fut>(root: N, f: F) -> V
where
    N: GraphNode + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(Vec<V>, Vec<V>, N) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
{
    let memo: FoldMemo<V> = Arc::new(Mutex::new(HashMap::new()));
    let (value, _) = fold_cell(root, Arc::new(f), memo).await;
    value
}

fn fold_cell<N, V, F, Fut>(node: N, f: Arc<F>, memo: FoldMemo<V>) -> FoldCell<V>
where
    N: GraphNode + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    F: Fn(Vec<V>, Vec<V>, N) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = V> + Send + 'static,
{
    let mut cells = memo.lock().expect("fold memo poisoned");
    if let Some(cell) = cells.get(node.id()) {
        return cell.clone();
    }

    let key = node.id().to_owned();
    let cell = {
        let id = key.clone();
        let f = Arc::clone(&f);
        let memo = Arc::clone(&memo);
        async move {
            let deps: Vec<N> = node.dependencies().to_vec();
            let pending: Vec<FoldCell<V>> = deps
                .into_iter()
                .map(|dep| fold_cell(dep, Arc::clone(&f), Arc::clone(&memo)))
                .collect();
            let resolved = futures::future::join_all(pending).await;

            let mut direct = Vec::new();
            let mut all: Contributions<V> = Vec::new();
            let mut seen = HashSet::new();
            for (value, contributions) in resolved {
                direct.push(value);
                for (id, value) in contributions.iter() {
                    if seen.insert(id.clone()) {
                        all.push((id.clone(), value.clone()));
                    }
                }
            }

            let all_values: Vec<V> = all.iter().map(|(_, v)| v.clone()).collect();
            let value = f(direct, all_values, node).await;

            let mut contributions = all;
            contributions.push((id, value.clone()));
            (value, Arc::new(contributions))
        }
        .boxed()
        .shared()
    };
    cells.insert(key, cell.clone());
    cell
}
