/// Block list command handlers
use anyhow::Result;
use std::path::Path;
use warden_core::ipc::{IpcRequest, IpcResponse};

use super::helpers::{notify_daemon, open_database};

fn with_added(current: &[String], packages: &[String]) -> Vec<String> {
    current.iter().chain(packages).cloned().collect()
}

fn without(current: &[String], packages: &[String]) -> Vec<String> {
    current
        .iter()
        .filter(|p| !packages.iter().any(|r| r.trim() == p.as_str()))
        .cloned()
        .collect()
}

async fn store(data_dir: &Path, packages: &[String]) -> Result<()> {
    let db = open_database(data_dir)?;
    let count = db.set_blocked_apps(packages)?;
    let saved = db.get_settings()?.blocked_apps;
    println!("Block list saved ({count} packages)");

    match notify_daemon(data_dir, IpcRequest::SetBlocked(saved)).await {
        Some(IpcResponse::BlockedCount(n)) => log::info!("Running daemon now blocks {n} packages"),
        Some(other) => log::warn!("Unexpected response from daemon: {other:?}"),
        None => {}
    }
    Ok(())
}

pub async fn add(data_dir: &Path, packages: &[String]) -> Result<()> {
    let current = open_database(data_dir)?.get_settings()?.blocked_apps;
    store(data_dir, &with_added(&current, packages)).await
}

pub async fn remove(data_dir: &Path, packages: &[String]) -> Result<()> {
    let current = open_database(data_dir)?.get_settings()?.blocked_apps;
    let remaining = without(&current, packages);
    if remaining.len() == current.len() {
        println!("None of the given packages were blocked");
        return Ok(());
    }
    store(data_dir, &remaining).await
}

pub async fn set(data_dir: &Path, packages: &[String]) -> Result<()> {
    store(data_dir, packages).await
}

/// Show the running daemon's live list, or the saved one when it is not running
pub async fn list(data_dir: &Path) -> Result<()> {
    let blocked = match notify_daemon(data_dir, IpcRequest::ListBlocked).await {
        Some(IpcResponse::Blocked(packages)) => packages,
        Some(other) => {
            log::warn!("Unexpected response from daemon: {other:?}");
            open_database(data_dir)?.get_settings()?.blocked_apps
        }
        None => open_database(data_dir)?.get_settings()?.blocked_apps,
    };

    if blocked.is_empty() {
        println!("Block list is empty");
        return Ok(());
    }

    println!("Blocked packages:");
    for package in blocked {
        println!("  {package}");
    }
    Ok(())
}
