// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rstest::rstest;

use super::{topological_fold, topological_fold_async};
use crate::walk::walk_test::{TestNode, diamond, node};

#[rstest]
fn test_fold_invokes_once_per_id() {
    let root = diamond();
    let mut calls: HashMap<String, usize> = HashMap::new();
    topological_fold(&root, &mut |_direct: &[String], _all: &[String], n: &TestNode| {
        *calls.entry(n.id.clone()).or_default() += 1;
        n.id.clone()
    });
    assert!(calls.values().all(|count| *count == 1), "{calls:?}");
    assert_eq!(calls.len(), 4);
}

#[rstest]
fn test_fold_distinguishes_direct_from_transitive() {
    let root = diamond();
    let mut seen_at_root = None;
    topological_fold(&root, &mut |direct: &[String], all: &[String], n: &TestNode| {
        if n.id == "root" {
            seen_at_root = Some((direct.to_vec(), all.to_vec()));
        }
        n.id.clone()
    });
    let (direct, all) = seen_at_root.unwrap();
    assert_eq!(direct, vec!["a", "b"]);
    // c contributes once even though it is reachable through both a and b
    assert_eq!(all, vec!["c", "a", "b"]);
}

#[rstest]
#[should_panic(expected = "cycle")]
fn test_fold_panics_on_back_edge() {
    // the crawler never produces this shape; the fold treats it as a
    // programming error
    let mut a = node("a", vec![]);
    a.deps.push(node("a", vec![]));
    topological_fold(&a, &mut |_: &[u32], _: &[u32], _n: &TestNode| 0u32);
}

#[rstest]
#[tokio::test]
async fn test_async_fold_invokes_once_per_id() {
    let root = diamond();
    let calls = Arc::new(AtomicUsize::new(0));
    let observed = {
        let calls = Arc::clone(&calls);
        topological_fold_async(root, move |direct: Vec<usize>, _all: Vec<usize>, _n: TestNode| {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                direct.iter().sum::<usize>() + 1
            }
        })
        .await
    };
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    // root = a + b + 1 where a = b = c + 1 = 2
    assert_eq!(observed, 5);
}

#[rstest]
#[tokio::test]
async fn test_async_fold_joins_duplicate_references() {
    // a wide graph in which every branch shares the same leaf; the leaf
    // computation must run once no matter how many branches await it
    let leaf = node("leaf", vec![]);
    let branches: Vec<TestNode> = (0..16)
        .map(|i| node(&format!("branch-{i}"), vec![leaf.clone()]))
        .collect();
    let root = node("root", branches);
    let leaf_runs = Arc::new(AtomicUsize::new(0));
    {
        let leaf_runs = Arc::clone(&leaf_runs);
        topological_fold_async(root, move |_direct: Vec<()>, _all: Vec<()>, n: TestNode| {
            let leaf_runs = Arc::clone(&leaf_runs);
            async move {
                if n.id == "leaf" {
                    leaf_runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
            }
        })
        .await;
    }
    assert_eq!(leaf_runs.load(Ordering::SeqCst), 1);
}
