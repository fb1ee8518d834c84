//! Human-facing progress output, emitted through `tracing`.

use super::RunSummary;
use crate::engine::RunStats;
use std::time::Duration;
use tracing::info;

const BAR_WIDTH: usize = 40;

/// `30.5s`, `2m 15.3s` or `1h 30m 45.2s`.
pub fn format_duration(duration: Duration) -> String {
    let seconds = duration.as_secs_f64();
    if seconds < 60.0 {
        return format!("{seconds:.1}s");
    }
    let whole = duration.as_secs();
    let secs = seconds % 60.0;
    if seconds < 3600.0 {
        return format!("{}m {secs:.1}s", whole / 60);
    }
    format!("{}h {}m {secs:.1}s", whole / 3600, (whole % 3600) / 60)
}

/// 40-cell bar, filled in proportion to `current / total`.
pub fn progress_bar(current: usize, total: usize) -> String {
    let filled = if total == 0 {
        0
    } else {
        (BAR_WIDTH * current.min(total)) / total
    };
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// `[idx/to_test] (#actual/total) Testing group: path`
pub fn group_banner(
    index: usize,
    to_test: usize,
    absolute: usize,
    total: usize,
    group_path: &str,
) -> String {
    format!("[{index}/{to_test}] (#{absolute}/{total}) Testing group: {group_path}")
}

/// Log `title` framed by rules of its own width.
pub fn title(title: &str) {
    let rule = "=".repeat(title.chars().count());
    info!("{rule}");
    info!("{title}");
    info!("{rule}");
}

pub fn progress(
    current: usize,
    total: usize,
    stats: &RunStats,
    case_duration: Duration,
    total_duration: Duration,
) {
    let pct = if total == 0 {
        0.0
    } else {
        current as f64 / total as f64 * 100.0
    };
    info!(
        "Progress: [{}] {current}/{total} ({pct:.1}%)",
        progress_bar(current, total)
    );
    info!(
        "Results:  Passed: {}  Failed: {}  Timeout: {}  Hang: {}  Crash: {}",
        stats.passed, stats.failed, stats.timeout, stats.hang, stats.crash
    );
    info!(
        "Time:     Case: {}  Total: {}",
        format_duration(case_duration),
        format_duration(total_duration)
    );
}

pub fn final_summary(summary: &RunSummary, report: Option<&std::path::Path>) {
    let rule = "=".repeat(60);
    info!("{rule}");
    info!("FINAL TEST SUMMARY");
    info!("{rule}");
    info!(
        "Total Groups:  {} (skipped: {}, to test: {})",
        summary.total_groups, summary.skipped, summary.to_test
    );
    info!("Completed:     {}", summary.completed);
    info!("Passed:        {}", summary.stats.passed);
    info!("Failed:        {}", summary.stats.failed);
    info!("Timeout:       {}", summary.stats.timeout);
    info!("Hung:          {}", summary.stats.hang);
    info!("Crash:         {}", summary.stats.crash);
    if let Some(rate) = summary.pass_rate {
        info!("Pass Rate:     {rate:.1}%");
    }
    info!(
        "Total Time:    {}",
        format_duration(Duration::from_secs_f64(summary.total_time_secs))
    );
    if let Some(avg) = summary.avg_time_per_group_secs {
        info!("Avg Time:      {} per group", format_duration(Duration::from_secs_f64(avg)));
    }
    if summary.interrupted {
        info!("Run interrupted before all groups were tested");
    }
    info!("{rule}");
    if let Some(path) = report {
        info!("Report:        {}", path.display());
    }
}
