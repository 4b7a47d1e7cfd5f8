pub mod block_list;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod event;
pub mod ipc;
pub mod monitor;
pub mod presenter;
pub mod replay;
pub mod sink;
pub mod timer;
pub mod usage;

pub use block_list::BlockList;
pub use config::WardenConfig;
pub use daemon::{Daemon, DaemonEvent, DaemonStatus};
pub use engine::{Action, BlockEngine, EngineState};
pub use event::{EventKind, FeedRecord, ForegroundChangeEvent};
pub use usage::{UsageSample, UsageTracker};
