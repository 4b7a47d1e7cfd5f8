/// Replay a recorded feed through the engine on virtual time
use anyhow::{Context, Result};
use std::{fs, path::Path};
use warden_core::{event::FeedRecord, replay::replay, BlockList};

use super::helpers::{load_config, open_database};

fn load_feed(file: &Path) -> Result<Vec<FeedRecord>> {
    let contents = fs::read_to_string(file)
        .with_context(|| format!("Failed to read feed {}", file.display()))?;

    let mut records = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        match FeedRecord::parse_line(line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => {}
            Err(e) => log::warn!("Skipping line {}: {e}", index + 1),
        }
    }
    Ok(records)
}

pub fn handle_replay_command(
    data_dir: &Path,
    file: &Path,
    blocked: Vec<String>,
    json: bool,
) -> Result<()> {
    let config = load_config()?;
    let blocked = if blocked.is_empty() {
        open_database(data_dir)?.get_settings()?.blocked_apps
    } else {
        blocked
    };
    let records = load_feed(file)?;

    let outputs = replay(&records, &config, BlockList::new(blocked));
    for output in &outputs {
        if json {
            println!("{}", serde_json::to_string(output)?);
        } else {
            println!("{output}");
        }
    }

    if !json {
        println!("\n{} records, {} outputs", records.len(), outputs.len());
    }
    Ok(())
}
