//! Deterministic replay of a recorded feed.
//!
//! Runs the same engine and usage tracker as the daemon, but on virtual time:
//! a pending timer fires at its due instant as soon as a later (or equal)
//! record shows that instant has passed. Nothing sleeps.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::{
    block_list::BlockList,
    config::WardenConfig,
    engine::{Action, BlockEngine},
    event::FeedRecord,
    usage::{UsageSample, UsageTracker},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayOutput {
    Scheduled {
        package: String,
        at: DateTime<Utc>,
        due: DateTime<Utc>,
    },
    Cancelled {
        at: DateTime<Utc>,
    },
    Committed {
        package: String,
        at: DateTime<Utc>,
    },
    Usage {
        package: String,
        duration_ms: i64,
        at: DateTime<Utc>,
    },
}

impl fmt::Display for ReplayOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ts = |at: &DateTime<Utc>| at.format("%H:%M:%S%.3f").to_string();
        match self {
            Self::Scheduled { package, at, due } => {
                write!(f, "{} schedule {package} (due {})", ts(at), ts(due))
            }
            Self::Cancelled { at } => write!(f, "{} cancel", ts(at)),
            Self::Committed { package, at } => write!(f, "{} BLOCK {package}", ts(at)),
            Self::Usage {
                package,
                duration_ms,
                at,
            } => write!(f, "{} usage {package} {duration_ms}ms", ts(at)),
        }
    }
}

struct ArmedTimer {
    token: u64,
    due: DateTime<Utc>,
}

pub struct Simulator {
    engine: BlockEngine,
    tracker: UsageTracker,
    timer: Option<ArmedTimer>,
    clock: Option<DateTime<Utc>>,
    outputs: Vec<ReplayOutput>,
}

impl Simulator {
    #[must_use]
    pub fn new(config: &WardenConfig, block_list: BlockList) -> Self {
        Self {
            engine: BlockEngine::new(config, block_list),
            tracker: UsageTracker::new(config.usage_min_duration_ms),
            timer: None,
            clock: None,
            outputs: Vec::new(),
        }
    }

    /// Feed one record, first firing a timer that fell due before it
    pub fn feed(&mut self, record: &FeedRecord) {
        let at = record.timestamp();
        self.advance_to(at);
        self.clock = Some(self.clock.map_or(at, |clock| clock.max(at)));

        match record {
            FeedRecord::Foreground(event) => {
                if let Some(sample) = self.tracker.on_event(event) {
                    self.push_usage(sample, at);
                }
                let action = self.engine.on_event(event);
                self.apply(action, at);
            }
            FeedRecord::OverlayDismissed { timestamp } => {
                let action = self.engine.on_overlay_dismissed(*timestamp);
                self.apply(action, at);
            }
        }
    }

    /// Fire any remaining timer and flush the open usage interval
    #[must_use]
    pub fn finish(mut self) -> Vec<ReplayOutput> {
        if let Some(timer) = self.timer.take() {
            self.fire(timer);
        }
        if let Some(end) = self.clock {
            if let Some(sample) = self.tracker.flush(end) {
                self.push_usage(sample, end);
            }
        }
        self.outputs
    }

    fn advance_to(&mut self, at: DateTime<Utc>) {
        if self.timer.as_ref().is_some_and(|timer| timer.due <= at) {
            if let Some(timer) = self.timer.take() {
                self.fire(timer);
            }
        }
    }

    fn fire(&mut self, timer: ArmedTimer) {
        self.clock = Some(self.clock.map_or(timer.due, |clock| clock.max(timer.due)));
        let action = self.engine.on_timer_fired(timer.token, timer.due);
        self.apply(action, timer.due);
    }

    fn apply(&mut self, action: Action, at: DateTime<Utc>) {
        match action {
            Action::None => {}
            Action::ScheduleBlock {
                package,
                delay,
                token,
            } => {
                let delay = chrono::Duration::from_std(delay).unwrap_or(chrono::Duration::zero());
                let due = at + delay;
                self.timer = Some(ArmedTimer { token, due });
                self.outputs
                    .push(ReplayOutput::Scheduled { package, at, due });
            }
            Action::CancelBlock => {
                self.timer = None;
                self.outputs.push(ReplayOutput::Cancelled { at });
            }
            Action::CommitBlock(package) => {
                self.outputs.push(ReplayOutput::Committed { package, at });
            }
        }
    }

    fn push_usage(&mut self, sample: UsageSample, at: DateTime<Utc>) {
        self.outputs.push(ReplayOutput::Usage {
            package: sample.package,
            duration_ms: sample.duration_ms,
            at,
        });
    }
}

/// Run `records` through a fresh simulator and collect everything it did
#[must_use]
pub fn replay<'a, I>(records: I, config: &WardenConfig, block_list: BlockList) -> Vec<ReplayOutput>
where
    I: IntoIterator<Item = &'a FeedRecord>,
{
    let mut simulator = Simulator::new(config, block_list);
    for record in records {
        simulator.feed(record);
    }
    simulator.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ForegroundChangeEvent;
    use chrono::TimeZone;

    fn t(ms: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(ms)
    }

    fn window(package: &str, ms: i64) -> FeedRecord {
        ForegroundChangeEvent::window_changed(package, t(ms)).into()
    }

    fn dismissed(ms: i64) -> FeedRecord {
        FeedRecord::OverlayDismissed { timestamp: t(ms) }
    }

    fn config() -> WardenConfig {
        WardenConfig {
            debounce_delay_ms: 50,
            cooldown_ms: 2000,
            ..WardenConfig::default()
        }
    }

    fn commits(outputs: &[ReplayOutput]) -> Vec<(String, DateTime<Utc>)> {
        outputs
            .iter()
            .filter_map(|o| match o {
                ReplayOutput::Committed { package, at } => Some((package.clone(), *at)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_repeated_window_events_commit_once_after_last_debounce() {
        let records = [window("com.x", 0), window("com.x", 40)];
        let outputs = replay(&records, &config(), BlockList::new(["com.x"]));

        assert_eq!(commits(&outputs), vec![("com.x".to_string(), t(90))]);
    }

    #[test]
    fn test_dismissal_cooldown_suppresses_then_allows() {
        let records = [
            window("com.x", 0),
            dismissed(100),
            window("com.x", 150),
            window("com.x", 2200),
        ];
        let outputs = replay(&records, &config(), BlockList::new(["com.x"]));

        // t=50 commit, t=200 suppressed, t=2250 commit
        assert_eq!(
            commits(&outputs),
            vec![("com.x".to_string(), t(50)), ("com.x".to_string(), t(2250))]
        );
    }

    #[test]
    fn test_system_ui_does_not_cancel_pending_block() {
        let records = [
            window("com.x", 0),
            window("com.android.systemui", 10),
            window("com.x", 20),
        ];
        let outputs = replay(&records, &config(), BlockList::new(["com.x"]));

        assert!(!outputs
            .iter()
            .any(|o| matches!(o, ReplayOutput::Cancelled { .. })));
        assert_eq!(commits(&outputs), vec![("com.x".to_string(), t(70))]);
    }

    #[test]
    fn test_switching_away_cancels() {
        let records = [window("com.x", 0), window("com.free", 30), window("com.free", 500)];
        let outputs = replay(&records, &config(), BlockList::new(["com.x"]));

        assert!(commits(&outputs).is_empty());
        assert!(outputs.contains(&ReplayOutput::Cancelled { at: t(30) }));
    }

    #[test]
    fn test_timer_due_at_record_time_fires_first() {
        let records = [window("com.x", 0), window("com.free", 50)];
        let outputs = replay(&records, &config(), BlockList::new(["com.x"]));

        assert_eq!(commits(&outputs), vec![("com.x".to_string(), t(50))]);
    }

    #[test]
    fn test_usage_samples_and_final_flush() {
        let records = [
            window("com.a", 0),
            window("com.b", 1000),
            window("com.c", 2500),
            window("com.c", 6000),
        ];
        let outputs = replay(&records, &config(), BlockList::default());

        let usage: Vec<_> = outputs
            .iter()
            .filter_map(|o| match o {
                ReplayOutput::Usage {
                    package,
                    duration_ms,
                    ..
                } => Some((package.as_str(), *duration_ms)),
                _ => None,
            })
            .collect();

        // com.a lasted exactly 1000ms and is dropped
        assert_eq!(usage, vec![("com.b", 1500), ("com.c", 3500)]);
    }

    #[test]
    fn test_display_is_human_readable() {
        let line = ReplayOutput::Committed {
            package: "com.x".to_string(),
            at: t(90),
        }
        .to_string();
        assert_eq!(line, "12:00:00.090 BLOCK com.x");
    }
}
