/// Usage report command handler
use anyhow::Result;
use chrono::Utc;
use std::path::Path;
use tabled::{Table, Tabled};
use warden_storage::UsageTotal;

use super::helpers::{format_duration_ms, open_database, period_start, truncate_str};

#[derive(Tabled)]
struct UsageRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Sessions")]
    sessions: u32,
    #[tabled(rename = "Share")]
    share: String,
}

fn usage_rows(totals: Vec<UsageTotal>) -> Vec<UsageRow> {
    let grand_total: i64 = totals.iter().map(|t| t.total_ms).sum();

    totals
        .into_iter()
        .map(|total| {
            #[allow(clippy::cast_precision_loss)]
            let share = if grand_total > 0 {
                format!(
                    "{:.1}%",
                    (total.total_ms as f64 / grand_total as f64) * 100.0
                )
            } else {
                String::from("0%")
            };
            UsageRow {
                package: truncate_str(&total.package, 40),
                time: format_duration_ms(total.total_ms),
                sessions: total.sample_count,
                share,
            }
        })
        .collect()
}

pub fn handle_usage_command(data_dir: &Path, period: &str) -> Result<()> {
    let since = period_start(period, Utc::now())?;
    let totals = open_database(data_dir)?.get_usage_totals(since)?;

    if totals.is_empty() {
        println!("No usage recorded for period: {period}");
        return Ok(());
    }

    let grand_total: i64 = totals.iter().map(|t| t.total_ms).sum();

    println!("\nForeground Usage: {period}");
    println!("{}", Table::new(usage_rows(totals)));
    println!("\nTotal: {}", format_duration_ms(grand_total));
    Ok(())
}
