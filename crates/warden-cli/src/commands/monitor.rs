use anyhow::Result;
use std::path::Path;
use warden_core::ipc::{IpcRequest, IpcResponse};

use super::helpers::{notify_daemon, open_database};

pub async fn set_monitoring(data_dir: &Path, enabled: bool) -> Result<()> {
    open_database(data_dir)?.set_monitoring(enabled)?;
    println!("Monitoring {}", if enabled { "on" } else { "off" });

    match notify_daemon(data_dir, IpcRequest::SetMonitoring(enabled)).await {
        Some(IpcResponse::Monitoring(_)) | None => {}
        Some(other) => log::warn!("Unexpected response from daemon: {other:?}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_monitoring_persists() {
        let dir = tempfile::tempdir().unwrap();

        set_monitoring(dir.path(), true).await.unwrap();
        assert!(open_database(dir.path()).unwrap().get_settings().unwrap().is_monitoring);

        set_monitoring(dir.path(), false).await.unwrap();
        assert!(!open_database(dir.path()).unwrap().get_settings().unwrap().is_monitoring);
    }
}
