//! Block decision state machine.
//!
//! Classifies each foreground event, debounces block candidates and gates the
//! overlay behind a post-dismissal cooldown. The engine never performs I/O and
//! never sleeps: it returns an [`Action`] and the caller arms or cancels the
//! timer and talks to the overlay presenter.
//!
//! Conceptual states:
//! - Idle: nothing pending, nothing blocked
//! - Pending: a debounce timer is running for one candidate
//! - Blocked: the overlay was committed for `last_blocked_package`
//! - Cooldown: a dismissal happened less than `cooldown` ago; gates commits only

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

use crate::block_list::BlockList;
use crate::config::WardenConfig;
use crate::event::{EventKind, ForegroundChangeEvent};

/// What the caller must do after feeding the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    None,
    /// (Re)arm the single debounce timer; when it elapses call
    /// [`BlockEngine::on_timer_fired`] with `token`. Any previous timer is void.
    ScheduleBlock {
        package: String,
        delay: Duration,
        token: u64,
    },
    /// Cancel the debounce timer
    CancelBlock,
    /// Show the overlay for the package
    CommitBlock(String),
}

/// A debounce timer in flight
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBlock {
    pub package: String,
    pub scheduled_at: DateTime<Utc>,
    /// Generation of the arm; fires carrying any other token are stale
    pub token: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineState {
    pub current_foreground: Option<String>,
    pub last_foreground_change_at: Option<DateTime<Utc>>,
    pub last_blocked_package: Option<String>,
    pub pending_block: Option<PendingBlock>,
    pub last_dismissed_at: Option<DateTime<Utc>>,
}

pub struct BlockEngine {
    state: EngineState,
    block_list: BlockList,
    self_app_id: String,
    launcher_packages: HashSet<String>,
    transient_packages: HashSet<String>,
    debounce_delay: Duration,
    cooldown: chrono::Duration,
    notifications_start_block: bool,
    next_token: u64,
}

impl BlockEngine {
    #[must_use]
    pub fn new(config: &WardenConfig, block_list: BlockList) -> Self {
        Self {
            state: EngineState::default(),
            block_list,
            self_app_id: config.self_app_id.clone(),
            launcher_packages: config.launcher_packages.iter().cloned().collect(),
            transient_packages: config.transient_packages.iter().cloned().collect(),
            debounce_delay: config.debounce_delay(),
            cooldown: config.cooldown(),
            notifications_start_block: config.notifications_start_block,
            next_token: 1,
        }
    }

    #[must_use]
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    #[must_use]
    pub fn pending_package(&self) -> Option<&str> {
        self.state.pending_block.as_ref().map(|p| p.package.as_str())
    }

    #[must_use]
    pub fn last_blocked_package(&self) -> Option<&str> {
        self.state.last_blocked_package.as_deref()
    }

    /// Feed one foreground event
    pub fn on_event(&mut self, event: &ForegroundChangeEvent) -> Action {
        let Some(package) = event.package_id() else {
            return Action::None;
        };

        if event.is_window_change() {
            self.state.current_foreground = Some(package.to_string());
            self.state.last_foreground_change_at = Some(event.timestamp);
        }

        // Home screen or our own app: always start over
        if package == self.self_app_id || self.launcher_packages.contains(package) {
            log::debug!("{package} is self/launcher, resetting block state");
            return self.reset();
        }

        if self.block_list.contains(package) {
            return self.on_blocked_package(package, event);
        }

        match event.kind {
            EventKind::WindowChanged if self.transient_packages.contains(package) => {
                log::debug!("Ignoring transient system window {package}");
                Action::None
            }
            EventKind::WindowChanged => self.reset(),
            EventKind::NotificationOnly => Action::None,
        }
    }

    fn on_blocked_package(&mut self, package: &str, event: &ForegroundChangeEvent) -> Action {
        // A background app's notification must not block it
        if event.kind == EventKind::NotificationOnly && !self.notifications_start_block {
            return Action::None;
        }

        let already_pending = self.pending_package() == Some(package);
        if already_pending || self.last_blocked_package() != Some(package) {
            return self.schedule(package, event.timestamp);
        }

        Action::None
    }

    fn schedule(&mut self, package: &str, now: DateTime<Utc>) -> Action {
        let token = self.next_token;
        self.next_token += 1;

        self.state.pending_block = Some(PendingBlock {
            package: package.to_string(),
            scheduled_at: now,
            token,
        });
        log::debug!(
            "Scheduling block for {package} in {}ms (token {token})",
            self.debounce_delay.as_millis()
        );

        Action::ScheduleBlock {
            package: package.to_string(),
            delay: self.debounce_delay,
            token,
        }
    }

    fn reset(&mut self) -> Action {
        self.state.last_blocked_package = None;
        self.cancel_pending()
    }

    fn cancel_pending(&mut self) -> Action {
        match self.state.pending_block.take() {
            Some(pending) => {
                log::debug!("Cancelled pending block for {}", pending.package);
                Action::CancelBlock
            }
            None => Action::None,
        }
    }

    fn in_cooldown(&self, now: DateTime<Utc>) -> bool {
        self.state
            .last_dismissed_at
            .is_some_and(|dismissed| now.signed_duration_since(dismissed) < self.cooldown)
    }

    /// The debounce timer armed with `token` elapsed at `now`
    pub fn on_timer_fired(&mut self, token: u64, now: DateTime<Utc>) -> Action {
        match &self.state.pending_block {
            Some(pending) if pending.token == token => {}
            _ => {
                log::debug!("Ignoring stale timer (token {token})");
                return Action::None;
            }
        }
        let Some(pending) = self.state.pending_block.take() else {
            return Action::None;
        };

        if self.in_cooldown(now) {
            log::info!(
                "Overlay for {} suppressed, dismissal cooldown still active",
                pending.package
            );
            return Action::None;
        }

        log::info!("Committing block for {}", pending.package);
        self.state.last_blocked_package = Some(pending.package.clone());
        Action::CommitBlock(pending.package)
    }

    /// The presenter reported the overlay was dismissed at `at`
    pub fn on_overlay_dismissed(&mut self, at: DateTime<Utc>) -> Action {
        log::info!("Overlay dismissed, cooldown starts");
        self.state.last_dismissed_at = Some(at);
        self.reset()
    }
}
