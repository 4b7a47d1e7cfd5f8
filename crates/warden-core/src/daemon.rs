use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
};
use tokio::{
    sync::{mpsc, oneshot},
    time::Instant,
};
use warden_storage::Database;

use crate::{
    block_list::BlockList,
    config::WardenConfig,
    engine::{Action, BlockEngine, EngineState},
    event::FeedRecord,
    ipc::{listen, DaemonIpcHandler},
    monitor::EventSource,
    presenter::{create_presenter, OverlayPresenter},
    sink::{DatabaseSink, UsageSink},
    timer::DebounceTimer,
    usage::UsageTracker,
};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Inputs to the daemon loop that do not come from the feed
#[derive(Debug)]
pub enum DaemonEvent {
    TimerFired { token: u64 },
    /// Dismissal reported over IPC; stamped on the feed clock when handled
    OverlayDismissed,
    Status(oneshot::Sender<DaemonStatus>),
    Shutdown,
}

/// Snapshot reported over IPC
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub monitoring: bool,
    pub current_foreground: Option<String>,
    pub last_blocked_package: Option<String>,
    pub pending_package: Option<String>,
    /// Package whose dwell interval is open
    pub usage_package: Option<String>,
    pub blocked_count: usize,
    pub uptime_seconds: u64,
}

/// The daemon's single time base
///
/// Instants not carried by a feed record (timer fires, IPC dismissals, the
/// shutdown flush) are the last feed timestamp plus monotonic time elapsed
/// since that record arrived. The host clock is only used before the first
/// record.
#[derive(Debug, Default)]
struct FeedClock {
    anchor: Option<(DateTime<Utc>, Instant)>,
}

impl FeedClock {
    fn observe(&mut self, at: DateTime<Utc>) {
        self.anchor = Some((at, Instant::now()));
    }

    fn now(&self) -> DateTime<Utc> {
        match self.anchor {
            Some((at, arrived)) => {
                at + chrono::Duration::from_std(arrived.elapsed())
                    .unwrap_or_else(|_| chrono::Duration::zero())
            }
            None => Utc::now(),
        }
    }
}

/// Owns the engine and the usage tracker and feeds both from one ordered stream
///
/// Feed records, timer fires, dismissals and IPC requests are all handled on the
/// task running [`Daemon::run_with_signals`], one at a time.
pub struct Daemon {
    engine: BlockEngine,
    tracker: UsageTracker,
    block_list: BlockList,
    monitoring: Arc<AtomicBool>,
    presenter: Box<dyn OverlayPresenter>,
    sink: Box<dyn UsageSink>,
    timer: DebounceTimer,
    clock: FeedClock,
    events_tx: mpsc::Sender<DaemonEvent>,
    events_rx: mpsc::Receiver<DaemonEvent>,
    shutdown_signal: Arc<AtomicBool>,
    started_at: DateTime<Utc>,
}

impl Daemon {
    #[must_use]
    pub fn new(
        config: &WardenConfig,
        block_list: BlockList,
        monitoring: bool,
        presenter: Box<dyn OverlayPresenter>,
        sink: Box<dyn UsageSink>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            engine: BlockEngine::new(config, block_list.clone()),
            tracker: UsageTracker::new(config.usage_min_duration_ms),
            block_list,
            monitoring: Arc::new(AtomicBool::new(monitoring)),
            presenter,
            sink,
            timer: DebounceTimer::new(events_tx.clone()),
            clock: FeedClock::default(),
            events_tx,
            events_rx,
            shutdown_signal: Arc::new(AtomicBool::new(false)),
            started_at: Utc::now(),
        }
    }

    /// Build a daemon from persisted settings, storing usage in the same database
    ///
    /// # Errors
    ///
    /// Returns an error if the settings cannot be read
    pub fn from_database(config: &WardenConfig, database: Arc<Mutex<Database>>) -> Result<Self> {
        let settings = {
            let db = database
                .lock()
                .map_err(|_| anyhow::anyhow!("database mutex poisoned"))?;
            db.get_settings()?
        };
        log::info!(
            "Loaded {} blocked packages (monitoring: {})",
            settings.blocked_apps.len(),
            settings.is_monitoring
        );

        Ok(Self::new(
            config,
            BlockList::new(settings.blocked_apps),
            settings.is_monitoring,
            create_presenter(config),
            Box::new(DatabaseSink::new(database)),
        ))
    }

    /// Sender for dismissals and other out-of-feed inputs
    #[must_use]
    pub fn event_sender(&self) -> mpsc::Sender<DaemonEvent> {
        self.events_tx.clone()
    }

    #[must_use]
    pub fn engine_state(&self) -> &EngineState {
        self.engine.state()
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.monitoring.store(enabled, Ordering::SeqCst);
    }

    #[must_use]
    pub fn ipc_handler(&self) -> DaemonIpcHandler {
        DaemonIpcHandler::new(
            self.events_tx.clone(),
            self.block_list.clone(),
            self.monitoring.clone(),
            self.shutdown_signal.clone(),
        )
    }

    /// Run until ctrl-c or an IPC shutdown
    ///
    /// If the feed ends or fails, the engine keeps its state and the daemon keeps
    /// serving timers, dismissals and IPC.
    ///
    /// # Errors
    ///
    /// Currently always succeeds once started; returns `Result` so callers can `?` it
    pub async fn run_with_signals(
        &mut self,
        mut source: Box<dyn EventSource>,
        sock_path: Option<PathBuf>,
    ) -> Result<()> {
        if let Some(sock_path) = sock_path {
            let ipc_handler = Arc::new(self.ipc_handler());
            tokio::spawn(async move {
                if let Err(e) = listen(ipc_handler, &sock_path).await {
                    log::error!("IPC listener failed: {e}");
                }
            });
        }

        log::info!(
            "Daemon started (monitoring: {}, {} blocked packages)",
            self.monitoring.load(Ordering::SeqCst),
            self.block_list.len()
        );

        let mut feed_open = true;
        loop {
            tokio::select! {
                record = source.next_record(), if feed_open => match record {
                    Ok(Some(record)) => self.handle_record(record),
                    Ok(None) => {
                        log::warn!("Event feed ended, holding last state");
                        feed_open = false;
                    }
                    Err(e) => {
                        log::error!("Event feed failed: {e:#}, holding last state");
                        feed_open = false;
                    }
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event),
                _ = tokio::signal::ctrl_c() => {
                    log::info!("Received Ctrl-C, shutting down...");
                    self.shutdown_signal.store(true, Ordering::SeqCst);
                }
            }

            if self.shutdown_signal.load(Ordering::SeqCst) {
                break;
            }
        }

        self.finish();
        log::info!("Daemon shut down gracefully.");
        Ok(())
    }

    /// Process one feed record: usage first, then the block decision
    pub fn handle_record(&mut self, record: FeedRecord) {
        self.clock.observe(record.timestamp());

        match record {
            FeedRecord::Foreground(event) => {
                if !self.monitoring.load(Ordering::SeqCst) {
                    log::trace!("Monitoring off, dropping event for {:?}", event.package);
                    return;
                }
                if let Some(sample) = self.tracker.on_event(&event) {
                    self.sink.record(&sample, event.timestamp);
                }
                let action = self.engine.on_event(&event);
                self.apply(action);
            }
            FeedRecord::OverlayDismissed { timestamp } => {
                let action = self.engine.on_overlay_dismissed(timestamp);
                self.apply(action);
            }
        }
    }

    pub fn handle_event(&mut self, event: DaemonEvent) {
        match event {
            DaemonEvent::TimerFired { token } => {
                let action = self.engine.on_timer_fired(token, self.clock.now());
                self.apply(action);
            }
            DaemonEvent::OverlayDismissed => {
                let action = self.engine.on_overlay_dismissed(self.clock.now());
                self.apply(action);
            }
            DaemonEvent::Status(reply) => {
                if reply.send(self.status()).is_err() {
                    log::debug!("Status requester went away");
                }
            }
            DaemonEvent::Shutdown => {
                self.shutdown_signal.store(true, Ordering::SeqCst);
            }
        }
    }

    #[must_use]
    pub fn status(&self) -> DaemonStatus {
        let state = self.engine.state();
        let uptime = Utc::now().signed_duration_since(self.started_at).num_seconds();

        DaemonStatus {
            monitoring: self.monitoring.load(Ordering::SeqCst),
            current_foreground: state.current_foreground.clone(),
            last_blocked_package: state.last_blocked_package.clone(),
            pending_package: state.pending_block.as_ref().map(|p| p.package.clone()),
            usage_package: self.tracker.current_package().map(str::to_string),
            blocked_count: self.block_list.len(),
            uptime_seconds: u64::try_from(uptime).unwrap_or(0),
        }
    }

    /// Cancel the timer and flush the in-progress usage interval
    pub fn finish(&mut self) {
        self.timer.cancel();
        let now = self.clock.now();
        if let Some(sample) = self.tracker.flush(now) {
            self.sink.record(&sample, now);
        }
    }

    fn apply(&mut self, action: Action) {
        match action {
            Action::None => {}
            Action::ScheduleBlock {
                package: _,
                delay,
                token,
            } => self.timer.arm(token, delay),
            Action::CancelBlock => self.timer.cancel(),
            Action::CommitBlock(package) => {
                log::info!("Showing overlay for {package}");
                self.presenter.show_overlay(&package);
            }
        }
    }
}
