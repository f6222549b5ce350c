use crate::config::GovernorConfig;
use crate::governor::{Usage, UsageLevel};
use crate::storage::RunRecord;

/// Prints today's search quota usage and the latest run
pub fn print_usage(usage: &Usage, limits: &GovernorConfig, latest: Option<&RunRecord>) {
    println!("=== Search Quota Usage ===\n");

    println!("Today:");
    println!("  Calls used: {}/{}", usage.used, usage.limit);
    println!("  Remaining: {}", usage.remaining());
    println!("  Usage: {:.1}%", usage.percent());
    match usage.level {
        UsageLevel::Normal => println!("  Level: normal"),
        UsageLevel::Warning => println!(
            "  Level: WARNING (>= {}%)",
            limits.warning_threshold
        ),
        UsageLevel::Critical => println!("  Level: CRITICAL"),
    }
    println!();

    println!("Limits:");
    println!("  Per minute: {}", limits.rate_limit_per_minute);
    println!("  Per second: {}", limits.rate_limit_per_second);
    println!(
        "  Mode: {}",
        if limits.strict_mode { "strict" } else { "soft" }
    );
    println!();

    match latest {
        Some(run) => {
            println!("Latest run:");
            println!("  ID: {}", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status);
            if let Some(detail) = &run.detail {
                println!("  Detail: {}", detail);
            }
        }
        None => println!("No runs recorded yet."),
    }
}
