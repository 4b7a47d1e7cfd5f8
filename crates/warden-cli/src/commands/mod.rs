pub mod block;
pub mod config;
pub mod daemon;
pub mod helpers;
pub mod monitor;
pub mod replay;
pub mod usage;
