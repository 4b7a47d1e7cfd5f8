/// Daemon lifecycle management commands
use anyhow::{Context, Result};
use std::{
    env, fs, io,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    sync::{Arc, Mutex},
    time::Duration,
};
use sysinfo::{Pid, System};
use warden_core::{
    ipc::{IpcClient, IpcRequest, IpcResponse},
    monitor::create_source,
    presenter::create_presenter,
    sink::LogSink,
    BlockList, Daemon, DaemonStatus,
};

use super::helpers::{load_config, open_database, socket_path, PID_FILE};

fn running_pid(pid_file_path: &Path) -> Option<usize> {
    let pid = fs::read_to_string(pid_file_path)
        .ok()?
        .trim()
        .parse::<usize>()
        .ok()?;
    let mut sys = System::new();
    sys.refresh_process(Pid::from(pid)).then_some(pid)
}

/// Command line for the detached daemon
///
/// The child gets a null stdin so it never competes with the shell for the
/// terminal; its feed always comes from `input`.
fn daemon_command(exe: &Path, working_dir: &Path, input: &Path) -> Command {
    let mut command = Command::new(exe);
    command
        .arg("daemon-internal-start")
        .arg("--input")
        .arg(input)
        .current_dir(working_dir)
        .stdin(Stdio::null());
    command
}

pub fn start_daemon(data_dir: &Path, input: &Path) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    let sock_path = socket_path(data_dir);

    // 1. Check if daemon is already running
    if pid_file_path.exists() {
        if let Some(pid) = running_pid(&pid_file_path) {
            log::info!("Daemon is already running (PID: {pid}).");
            return Ok(());
        }
        log::warn!("Removing stale PID file.");
        let _ = fs::remove_file(&pid_file_path);
    }

    // 2. Clean up old socket if it exists
    if sock_path.exists() {
        log::warn!("Removing stale socket file.");
        fs::remove_file(&sock_path)?;
    }

    // Fail here rather than inside the detached process
    load_config().context("Refusing to start with an invalid config")?;
    let input = fs::canonicalize(input)
        .with_context(|| format!("Event feed {} not found", input.display()))?;

    log::info!("Starting Warden daemon...");

    // 3. Spawn a new process for the daemon
    let current_exe = env::current_exe()?;
    let current_dir = env::current_dir()?;
    let child = daemon_command(&current_exe, &current_dir, &input).spawn()?;

    // 4. In parent process, write PID and exit
    log::info!("Daemon process started with PID: {}", child.id());
    fs::create_dir_all(data_dir)?;
    fs::write(&pid_file_path, child.id().to_string())?;

    Ok(())
}

pub async fn run_daemon_process(data_dir: &Path, input: &Path) -> Result<()> {
    // This is the detached daemon process; it has no terminal to log to
    setup_daemon_logging(data_dir)?;
    log::info!("Daemon process started internally.");

    if let Err(e) = daemon_main_logic(data_dir, Some(input.to_path_buf()), false).await {
        log::error!("Daemon main logic exited with a fatal error: {e:#}");
        return Err(e);
    }

    Ok(())
}

/// Run in this process with logs on stderr
pub async fn run_foreground(data_dir: &Path, input: Option<PathBuf>, ephemeral: bool) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    if let Some(pid) = running_pid(&pid_file_path) {
        anyhow::bail!("A background daemon is already running (PID: {pid}). Run `warden stop` first.");
    }

    daemon_main_logic(data_dir, input, ephemeral).await
}

async fn daemon_main_logic(data_dir: &Path, input: Option<PathBuf>, ephemeral: bool) -> Result<()> {
    let config = load_config()?;
    let database = Arc::new(Mutex::new(open_database(data_dir)?));

    let mut daemon = if ephemeral {
        let settings = database
            .lock()
            .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?
            .get_settings()?;
        Daemon::new(
            &config,
            BlockList::new(settings.blocked_apps),
            settings.is_monitoring,
            create_presenter(&config),
            Box::new(LogSink),
        )
    } else {
        Daemon::from_database(&config, database)?
    };

    let source = create_source(input.as_deref()).await?;
    let sock_path = socket_path(data_dir);
    let result = daemon.run_with_signals(source, Some(sock_path.clone())).await;

    if sock_path.exists() {
        let _ = fs::remove_file(&sock_path);
    }
    result
}

pub async fn stop_daemon(data_dir: &Path) -> Result<()> {
    let pid_file_path = data_dir.join(PID_FILE);
    let sock_path = socket_path(data_dir);

    if !pid_file_path.exists() {
        log::info!("Daemon is not running (no PID file).");
        if sock_path.exists() {
            fs::remove_file(&sock_path)?;
        }
        return Ok(());
    }

    let pid_str = fs::read_to_string(&pid_file_path)?;
    let pid = pid_str
        .trim()
        .parse::<usize>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    log::info!("Stopping Warden daemon (PID: {pid})...");
    let client = IpcClient::new(&sock_path);

    match client.send_command(IpcRequest::Shutdown).await {
        Ok(IpcResponse::Shutdown) => {
            log::info!("Daemon shutdown signal sent. Waiting for process to exit...");
            tokio::time::sleep(Duration::from_secs(2)).await;

            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                log::warn!("Daemon did not stop gracefully. Force killing...");
                if let Some(process) = sys.process(Pid::from(pid)) {
                    process.kill();
                }
            } else {
                log::info!("Daemon stopped successfully.");
            }
        }
        Ok(resp) => log::error!("Received unexpected response from daemon: {resp:?}"),
        Err(e) => {
            log::error!("Failed to send shutdown command: {e}. Forcing cleanup.");
            let mut sys = System::new();
            if sys.refresh_process(Pid::from(pid)) {
                if let Some(process) = sys.process(Pid::from(pid)) {
                    process.kill();
                    log::info!("Process killed.");
                }
            }
        }
    }

    // Cleanup
    fs::remove_file(&pid_file_path)?;
    if sock_path.exists() {
        fs::remove_file(&sock_path)?;
    }

    Ok(())
}

pub async fn show_status(data_dir: &Path) -> Result<()> {
    let sock_path = socket_path(data_dir);

    if !sock_path.exists() {
        println!("Daemon Status: Not running");
        return Ok(());
    }

    let client = IpcClient::new(&sock_path);
    match client.send_command(IpcRequest::Status).await {
        Ok(IpcResponse::Status(status)) => print_status(&status),
        Ok(IpcResponse::Error(message)) => anyhow::bail!("Daemon error: {message}"),
        Ok(_) => anyhow::bail!("Unexpected response from daemon"),
        Err(e) => {
            log::error!("Failed to get status: {e}");
            println!("Daemon Status: Not running (or not responding)");
        }
    }
    Ok(())
}

fn print_status(status: &DaemonStatus) {
    let none = || "None".to_string();

    println!("Daemon Status: Running");
    println!(
        "  Monitoring: {}",
        if status.monitoring { "on" } else { "off" }
    );
    println!("  Blocked packages: {}", status.blocked_count);
    println!("\nCurrent State:");
    println!(
        "  Foreground: {}",
        status.current_foreground.clone().unwrap_or_else(none)
    );
    println!(
        "  Pending block: {}",
        status.pending_package.clone().unwrap_or_else(none)
    );
    println!(
        "  Blocked: {}",
        status.last_blocked_package.clone().unwrap_or_else(none)
    );
    println!(
        "  Counting usage for: {}",
        status.usage_package.clone().unwrap_or_else(none)
    );

    let uptime = status.uptime_seconds;
    let hours = uptime / 3600;
    let minutes = (uptime % 3600) / 60;
    let seconds = uptime % 60;
    println!("\nUptime: {hours:02}:{minutes:02}:{seconds:02}");
}

pub async fn dismiss(data_dir: &Path) -> Result<()> {
    let client = IpcClient::new(&socket_path(data_dir));
    match client.send_command(IpcRequest::Dismiss).await? {
        IpcResponse::Dismissed => {
            println!("Overlay dismissed");
            Ok(())
        }
        IpcResponse::Error(message) => anyhow::bail!("Daemon error: {message}"),
        other => anyhow::bail!("Unexpected response from daemon: {other:?}"),
    }
}

fn setup_daemon_logging(data_dir: &Path) -> Result<()> {
    use std::fs::{create_dir_all, OpenOptions};

    let log_path = data_dir.join("warden.log");
    create_dir_all(data_dir)?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("Failed to open {}", log_path.display()))?;

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .filter_level(log::LevelFilter::Debug)
        .init();

    Ok(())
}
