use crate::config::WardenConfig;

/// Renders the blocking overlay
///
/// Calls are fire-and-forget. Render failures stay inside the presenter; the
/// engine treats every request as shown. Dismissals come back through the
/// feed or the IPC `Dismiss` request.
pub trait OverlayPresenter: Send + Sync {
    fn show_overlay(&self, package: &str);
}

/// Only logs the request
pub struct LogPresenter;

impl OverlayPresenter for LogPresenter {
    fn show_overlay(&self, package: &str) {
        log::info!("Overlay requested for {package}");
    }
}

/// Launches an external program with the package id as its last argument
pub struct CommandPresenter {
    program: String,
    args: Vec<String>,
}

impl CommandPresenter {
    /// Build from `[program, args...]`; `None` if `argv` is empty
    #[must_use]
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

impl OverlayPresenter for CommandPresenter {
    fn show_overlay(&self, package: &str) {
        let spawned = tokio::process::Command::new(&self.program)
            .args(&self.args)
            .arg(package)
            .spawn();

        match spawned {
            Ok(mut child) => {
                let program = self.program.clone();
                tokio::spawn(async move {
                    match child.wait().await {
                        Ok(status) if !status.success() => {
                            log::warn!("Overlay command {program} exited with {status}");
                        }
                        Err(e) => log::warn!("Failed to wait for overlay command {program}: {e}"),
                        Ok(_) => {}
                    }
                });
            }
            Err(e) => log::warn!("Failed to launch overlay command {}: {e}", self.program),
        }
    }
}

/// Presenter selected by configuration
#[must_use]
pub fn create_presenter(config: &WardenConfig) -> Box<dyn OverlayPresenter> {
    match config
        .overlay_command
        .as_deref()
        .and_then(CommandPresenter::from_argv)
    {
        Some(presenter) => Box::new(presenter),
        None => Box::new(LogPresenter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_argv_splits_program() {
        let argv = vec!["notify-send".to_string(), "Blocked".to_string()];
        let presenter = CommandPresenter::from_argv(&argv).unwrap();
        assert_eq!(presenter.program, "notify-send");
        assert_eq!(presenter.args, vec!["Blocked"]);
        assert!(CommandPresenter::from_argv(&[]).is_none());
    }

    #[tokio::test]
    async fn test_missing_program_does_not_panic() {
        let argv = vec!["/nonexistent/warden-overlay".to_string()];
        let presenter = CommandPresenter::from_argv(&argv).unwrap();
        presenter.show_overlay("com.x");
    }
}
