use std::fmt;

use taskbridge_config::TaskbridgeConfig;
use taskbridge_domain::{parse_timestamp, ItemCategory, MappingTable};
use time::OffsetDateTime;

use crate::daemon_process::DaemonState;

const TITLES_PER_CATEGORY: usize = 5;

const CATEGORY_SECTIONS: [(ItemCategory, &str); 4] = [
    (ItemCategory::PrReview, "PR Reviews"),
    (ItemCategory::PrCreated, "Your PRs"),
    (ItemCategory::IssueAssigned, "Assigned Issues"),
    (ItemCategory::IssueCreated, "Your Issues"),
];

pub fn render_status(
    config: &TaskbridgeConfig,
    table: &MappingTable,
    daemon: DaemonState,
    now: OffsetDateTime,
) -> String {
    StatusReport {
        config,
        table,
        daemon,
        now,
    }
    .to_string()
}

struct StatusReport<'a> {
    config: &'a TaskbridgeConfig,
    table: &'a MappingTable,
    daemon: DaemonState,
    now: OffsetDateTime,
}

impl fmt::Display for StatusReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Daemon")?;
        match self.daemon {
            DaemonState::Running { pid } => writeln!(f, "  Status:   running (PID {pid})")?,
            DaemonState::Stopped => writeln!(f, "  Status:   stopped")?,
        }
        writeln!(f, "  Interval: {}s", self.config.poll_interval().as_secs())?;
        writeln!(f, "  Project:  {}", self.config.things.project)?;

        writeln!(f)?;
        writeln!(f, "Sync")?;
        let last_sync = match self.table.last_sync_at.as_deref() {
            Some(raw) => match parse_timestamp(raw) {
                Some(at) => format_time_ago((self.now - at).whole_seconds()),
                None => raw.to_owned(),
            },
            None => "never".to_owned(),
        };
        writeln!(f, "  Last sync:  {last_sync}")?;
        if let Some(error) = self.table.last_error.as_deref() {
            writeln!(f, "  Last error: {error}")?;
        }

        writeln!(f)?;
        writeln!(f, "Tracked tasks: {}", self.table.mappings.len())?;
        for (category, label) in CATEGORY_SECTIONS {
            let mappings = self.table.mappings_in(category);
            if mappings.is_empty() {
                continue;
            }
            writeln!(f, "  {label} ({})", mappings.len())?;
            for mapping in mappings.iter().take(TITLES_PER_CATEGORY) {
                writeln!(f, "    - {}", mapping.title)?;
            }
            if mappings.len() > TITLES_PER_CATEGORY {
                writeln!(f, "    ... and {} more", mappings.len() - TITLES_PER_CATEGORY)?;
            }
        }
        Ok(())
    }
}

/// Coarse relative age, rounded to the nearest unit.
pub fn format_time_ago(seconds: i64) -> String {
    let seconds = seconds.max(0);
    if seconds < 60 {
        return format!("{seconds}s ago");
    }
    if seconds < 3_600 {
        return format!("{}m ago", rounded_div(seconds, 60));
    }
    if seconds < 86_400 {
        return format!("{}h ago", rounded_div(seconds, 3_600));
    }
    format!("{}d ago", rounded_div(seconds, 86_400))
}

fn rounded_div(value: i64, unit: i64) -> i64 {
    (value + unit / 2) / unit
}
