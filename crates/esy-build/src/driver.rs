// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::sync::Arc;
use std::time::Instant;

use esy_manifest::BuildSandbox;
use tokio::sync::Semaphore;

use crate::task::BuildTask;
use crate::{Error, Result, StoreConfig, checksum, exec};

#[cfg(test)]
#[path = "./driver_test.rs"]
mod driver_test;

/// Observable task lifecycle: `pending → in-progress → terminal`.
#[derive(Clone, Debug)]
pub enum TaskStatus {
    InProgress,
    Success {
        time_ms: u128,
        /// An existing artifact was reused; nothing ran.
        cached: bool,
        /// A dependency re-executed, so any cached artifact was
        /// invalidated.
        forced: bool,
    },
    Failure {
        error: Arc<Error>,
    },
}

/// The outcome a dependent observes for one of its dependencies.
#[derive(Clone, Copy, Debug)]
enum TaskOutcome {
    Built { cached: bool, forced: bool },
    Failed,
}

struct Driver<F> {
    config: StoreConfig,
    workers: Arc<Semaphore>,
    on_status: F,
    root_id: String,
}

/// Execute the plan rooted at `root` in dependency order.
///
/// Tasks run under a worker pool sized to the logical CPU count; a
/// task enters in-progress only after every direct dependency has
/// completed, and duplicated references to one build join the same
/// execution. `on_status` observes every state transition. The driver
/// drains in-flight work before returning; the result reflects the
/// root task.
pub async fn build<F>(
    root: Arc<BuildTask>,
    sandbox: &BuildSandbox,
    config: &StoreConfig,
    on_status: F,
) -> Result<()>
where
    F: Fn(&Arc<BuildTask>, TaskStatus) + Send + Sync + 'static,
{
    debug_assert_eq!(root.id, sandbox.root.id, "plan does not match sandbox");
    let workers = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    let driver = Arc::new(Driver {
        config: config.clone(),
        workers: Arc::new(Semaphore::new(workers)),
        on_status,
        root_id: root.id.clone(),
    });
    driver.config.initialize().await?;

    let root_id = root.id.clone();
    let outcome = esy_graph::topological_fold_async(root, {
        let driver = Arc::clone(&driver);
        move |direct: Vec<TaskOutcome>, _all: Vec<TaskOutcome>, task: Arc<BuildTask>| {
            let driver = Arc::clone(&driver);
            async move { run_task(driver, task, direct).await }
        }
    })
    .await;

    match outcome {
        TaskOutcome::Built { .. } => Ok(()),
        TaskOutcome::Failed => Err(Error::BuildFailed { id: root_id }),
    }
}

async fn run_task<F>(
    driver: Arc<Driver<F>>,
    task: Arc<BuildTask>,
    direct: Vec<TaskOutcome>,
) -> TaskOutcome
where
    F: Fn(&Arc<BuildTask>, TaskStatus) + Send + Sync + 'static,
{
    let report = |status: TaskStatus| (driver.on_status)(&task, status);

    if !task.spec.errors.is_empty() {
        report(TaskStatus::Failure {
            error: Arc::new(Error::CrawlErrors {
                name: task.spec.name.clone(),
            }),
        });
        return TaskOutcome::Failed;
    }
    if direct
        .iter()
        .any(|outcome| matches!(outcome, TaskOutcome::Failed))
    {
        report(TaskStatus::Failure {
            error: Arc::new(Error::DependenciesNotBuilt),
        });
        return TaskOutcome::Failed;
    }

    // a dependency that re-executed invalidates our cached artifact:
    // finished paths embed dependency references
    let mut forced = direct.iter().any(|outcome| {
        matches!(
            outcome,
            TaskOutcome::Built { cached: false, .. } | TaskOutcome::Built { forced: true, .. }
        )
    });

    let final_install = driver.config.final_install_path(&task.spec);
    let mut checksum = None;
    if task.spec.should_be_persisted {
        if !forced && final_install.is_dir() {
            tracing::debug!("{} is already in the store", task.id);
            report(TaskStatus::Success {
                time_ms: 0,
                cached: true,
                forced: false,
            });
            return TaskOutcome::Built {
                cached: true,
                forced: false,
            };
        }
    } else {
        // development builds are tracked by source modification times
        let current = match checksum::source_mtime_checksum(&task.spec.source_path) {
            Ok(current) => current,
            Err(err) => {
                report(TaskStatus::Failure {
                    error: Arc::new(err),
                });
                return TaskOutcome::Failed;
            }
        };
        let checksum_path = driver
            .config
            .build_path(&task.spec)
            .join("_esy")
            .join("checksum");
        let stored = tokio::fs::read_to_string(&checksum_path).await.ok();
        let unchanged = stored.as_deref() == Some(current.as_str());
        if !forced && final_install.is_dir() && unchanged {
            tracing::debug!("{} is unchanged", task.id);
            report(TaskStatus::Success {
                time_ms: 0,
                cached: true,
                forced: false,
            });
            return TaskOutcome::Built {
                cached: true,
                forced: false,
            };
        }
        if stored.is_some() && !unchanged {
            forced = true;
        }
        checksum = Some((checksum_path, current));
    }

    let _permit = driver
        .workers
        .acquire()
        .await
        .expect("worker pool closed while tasks are pending");
    report(TaskStatus::InProgress);
    tracing::info!("building {}", task.id);
    let started = Instant::now();
    let is_root = task.id == driver.root_id;
    match exec::execute(&driver.config, &task, is_root).await {
        Ok(()) => {
            if let Some((checksum_path, current)) = checksum {
                if let Err(err) = tokio::fs::write(&checksum_path, &current).await {
                    report(TaskStatus::Failure {
                        error: Arc::new(Error::FileWriteError(checksum_path, err)),
                    });
                    return TaskOutcome::Failed;
                }
            }
            report(TaskStatus::Success {
                time_ms: started.elapsed().as_millis(),
                cached: false,
                forced,
            });
            TaskOutcome::Built {
                cached: false,
                forced,
            }
        }
        Err(err) => {
            tracing::warn!("build of {} failed: {err}", task.id);
            report(TaskStatus::Failure {
                error: Arc::new(err),
            });
            TaskOutcome::Failed
        }
    }
}
