// Copyright (c) Contributors to the esy-core project.
// SPDX-License-Identifier: Apache-2.0
// https://github.com/esy/esy-core

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use crate::task::BuildTask;
use crate::{Error, Result, StoreConfig, config, findlib, rewrite, sandbox_profile};

#[cfg(test)]
#[path = "./exec_test.rs"]
mod exec_test;

/// Directories never copied into the build scratch of a
/// source-mutating build.
const COPY_EXCLUDES: [&str; 3] = ["_build", "_install", "node_modules"];

/// Run one build to completion: scaffold the scratch and staging
/// trees, run the commands, rewrite embedded staging paths and rename
/// the artifacts into their final, id-addressed location.
pub(crate) async fn execute(
    config: &StoreConfig,
    task: &Arc<BuildTask>,
    is_root: bool,
) -> Result<()> {
    let spec = &task.spec;
    let build_path = config.build_path(spec);
    let install_path = config.install_path(spec);
    let final_install_path = config.final_install_path(spec);
    let root_path = config.root_path(spec);
    let control_dir = build_path.join("_esy");

    for residue in [&final_install_path, &install_path, &build_path] {
        match tokio::fs::remove_dir_all(residue).await {
            Ok(()) => (),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => (),
            Err(err) => return Err(Error::RemoveError(residue.clone(), err)),
        }
    }

    tokio::fs::create_dir_all(&control_dir)
        .await
        .map_err(|err| Error::DirectoryCreateError(control_dir.clone(), err))?;
    for tree in config::INSTALL_TREES {
        let dir = install_path.join(tree);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| Error::DirectoryCreateError(dir, err))?;
    }

    if spec.mutates_source_path {
        copy_tree(&spec.source_path, &build_path)?;
    }

    write_env_file(&control_dir.join("env"), task)?;

    let dependency_libs: Vec<PathBuf> = task
        .dependencies
        .iter()
        .map(|dep| config.final_install_path(&dep.spec).join("lib"))
        .collect();
    let findlib_path = control_dir.join("findlib.conf");
    let staging = findlib::findlib_conf(
        dependency_libs.iter().map(PathBuf::as_path),
        &install_path.join("lib"),
    );
    tokio::fs::write(&findlib_path, staging)
        .await
        .map_err(|err| Error::FileWriteError(findlib_path.clone(), err))?;

    let profile_path = control_dir.join("sandbox.sb");
    if cfg!(target_os = "macos") {
        let profile = sandbox_profile::sandbox_profile(
            &build_path,
            &install_path,
            config.allowed_write_paths.iter().map(PathBuf::as_path),
        );
        tokio::fs::write(&profile_path, profile)
            .await
            .map_err(|err| Error::FileWriteError(profile_path.clone(), err))?;
    }

    if !task.command.is_empty() {
        run_commands(task, &root_path, &control_dir, &profile_path).await?;
    }

    let rewritten = rewrite::rewrite_tree(
        &install_path,
        &install_path.display().to_string(),
        &final_install_path.display().to_string(),
    )
    .await?;
    if rewritten > 0 {
        tracing::debug!("{}: rewrote staging paths in {rewritten} files", task.id);
    }

    let finalized = findlib::findlib_conf(
        dependency_libs.iter().map(PathBuf::as_path),
        &final_install_path.join("lib"),
    );
    tokio::fs::write(&findlib_path, finalized)
        .await
        .map_err(|err| Error::FileWriteError(findlib_path.clone(), err))?;

    tokio::fs::rename(&install_path, &final_install_path)
        .await
        .map_err(|err| Error::RenameError {
            from: install_path.clone(),
            to: final_install_path.clone(),
            source: err,
        })?;

    if is_root {
        refresh_symlink(&config.sandbox_path.join("_install"), &final_install_path).await?;
        refresh_symlink(&config.sandbox_path.join("_build"), &build_path).await?;
    }
    Ok(())
}

async fn run_commands(
    task: &Arc<BuildTask>,
    root_path: &Path,
    control_dir: &Path,
    profile_path: &Path,
) -> Result<()> {
    let log_path = control_dir.join("log");
    let log = std::fs::File::create(&log_path)
        .map_err(|err| Error::FileOpenError(log_path.clone(), err))?;

    for line in &task.command {
        let mut command = if cfg!(target_os = "macos") {
            let mut command = tokio::process::Command::new("sandbox-exec");
            command
                .arg("-f")
                .arg(profile_path)
                .arg("--")
                .arg("sh")
                .arg("-c")
                .arg(&line.rendered);
            command
        } else {
            let mut command = tokio::process::Command::new("sh");
            command.arg("-c").arg(&line.rendered);
            command
        };
        command
            .current_dir(root_path)
            .env_clear()
            .envs(task.env.values().map(|var| (&var.name, &var.value)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|err| Error::ProcessSpawnError {
            command: line.raw.clone(),
            source: err,
        })?;
        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let clone_log = || {
            log.try_clone()
                .map(tokio::fs::File::from_std)
                .map_err(|err| Error::FileOpenError(log_path.clone(), err))
        };
        let mut stdout_log = clone_log()?;
        let mut stderr_log = clone_log()?;
        let status = async {
            let (_, _, status) = tokio::try_join!(
                tokio::io::copy(&mut stdout, &mut stdout_log),
                tokio::io::copy(&mut stderr, &mut stderr_log),
                child.wait(),
            )?;
            Ok::<_, std::io::Error>(status)
        }
        .await
        .map_err(|err| Error::FileWriteError(log_path.clone(), err))?;

        if !status.success() {
            return Err(Error::CommandFailed {
                command: line.raw.clone(),
                status: status.to_string(),
                log_path,
            });
        }
    }

    log.sync_all()
        .map_err(|err| Error::FileWriteError(log_path, err))?;
    Ok(())
}

fn write_env_file(path: &Path, task: &Arc<BuildTask>) -> Result<()> {
    use std::io::Write;
    let mut file =
        std::fs::File::create(path).map_err(|err| Error::FileOpenError(path.to_owned(), err))?;
    for var in task.env.values() {
        let value = var.value.replace('\\', "\\\\").replace('"', "\\\"");
        writeln!(file, "export {}=\"{value}\";", var.name)
            .map_err(|err| Error::FileWriteError(path.to_owned(), err))?;
    }
    Ok(())
}

fn copy_tree(source: &Path, target: &Path) -> Result<()> {
    std::fs::create_dir_all(target)
        .map_err(|err| Error::DirectoryCreateError(target.to_owned(), err))?;
    let entries =
        std::fs::read_dir(source).map_err(|err| Error::FileReadError(source.to_owned(), err))?;
    for entry in entries {
        let entry = entry.map_err(|err| Error::FileReadError(source.to_owned(), err))?;
        let name = entry.file_name();
        let from = entry.path();
        let to = target.join(&name);
        let file_type = entry
            .file_type()
            .map_err(|err| Error::FileReadError(from.clone(), err))?;
        if file_type.is_dir() {
            if COPY_EXCLUDES.iter().any(|excluded| name == *excluded) {
                continue;
            }
            copy_tree(&from, &to)?;
        } else if file_type.is_file() {
            std::fs::copy(&from, &to).map_err(|err| Error::FileWriteError(to.clone(), err))?;
        }
    }
    Ok(())
}

async fn refresh_symlink(link: &Path, target: &Path) -> Result<()> {
    match tokio::fs::remove_file(link).await {
        Ok(()) => (),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => (),
        Err(err) => return Err(Error::RemoveError(link.to_owned(), err)),
    }
    #[cfg(unix)]
    tokio::fs::symlink(target, link)
        .await
        .map_err(|err| Error::SymlinkError(link.to_owned(), err))?;
    #[cfg(windows)]
    tokio::fs::symlink_dir(target, link)
        .await
        .map_err(|err| Error::SymlinkError(link.to_owned(), err))?;
    Ok(())
}
