//! Single-slot debounce timer.
//!
//! The timer is a tokio task that sleeps and then posts
//! `DaemonEvent::TimerFired` to the daemon's event channel. Arming aborts the
//! previous task. A fire that was already queued before the abort still
//! carries the old token, which the engine rejects.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::daemon::DaemonEvent;

pub struct DebounceTimer {
    handle: Option<JoinHandle<()>>,
    event_tx: mpsc::Sender<DaemonEvent>,
}

impl DebounceTimer {
    #[must_use]
    pub fn new(event_tx: mpsc::Sender<DaemonEvent>) -> Self {
        Self {
            handle: None,
            event_tx,
        }
    }

    /// Arm the timer, cancelling any previous one
    pub fn arm(&mut self, token: u64, delay: Duration) {
        self.cancel();

        let event_tx = self.event_tx.clone();
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if event_tx.send(DaemonEvent::TimerFired { token }).await.is_err() {
                log::debug!("Timer {token} fired after the daemon stopped");
            }
        }));
        log::trace!("Debounce timer armed (token {token}, {}ms)", delay.as_millis());
    }

    /// Cancel the armed timer. No-op if nothing is armed or it already fired.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            log::trace!("Debounce timer cancelled");
        }
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}
