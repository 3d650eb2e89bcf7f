use chrono::{DateTime, Local};
use evidence_core::{BatchViewModel, JobRowView, Notification, Severity};

/// One line per document, in backend order.
pub fn render_rows(view: &BatchViewModel) -> Vec<String> {
    if view.jobs.is_empty() {
        return vec!["No documents in this project".to_string()];
    }
    view.jobs.iter().map(render_row).collect()
}

fn render_row(row: &JobRowView) -> String {
    let mut line = format!("[{}] {}", row.id, row.status);
    if row.optimistic {
        line.push('*');
    }
    if let Some(units) = row.units {
        line.push_str(&format!(" {}/{}", units.current, units.total));
        if let Some(percent) = row.unit_percent {
            line.push_str(&format!(" ({percent}%)"));
        }
    }
    line.push_str(" - ");
    line.push_str(&row.display_name);
    if let Some(error) = &row.error_message {
        line.push_str(&format!(" ({error})"));
    }
    line
}

/// Aggregate progress line; `None` until the first snapshot arrived.
pub fn render_progress(view: &BatchViewModel) -> Option<String> {
    let counts = view.counts?;
    let percent = view.progress_percent.unwrap_or(0.0);
    let mut line = format!(
        "Progress {:.0}%: {} completed, {} failed, {} active of {}",
        percent,
        counts.completed,
        counts.failed,
        counts.active(),
        counts.total
    );
    if let Some(current) = &view.current {
        line.push_str(&format!(" | {}", current.display_name));
        if current.units.total > 0 {
            line.push_str(&format!(
                " page {}/{}",
                current.units.current, current.units.total
            ));
        }
    }
    Some(line)
}

pub fn render_notification(notification: &Notification, at: DateTime<Local>) -> String {
    let tag = match notification.severity {
        Severity::Info => "info",
        Severity::Warning => "warning",
        Severity::Error => "error",
    };
    format!("[{}] {}: {}", at.format("%H:%M:%S"), tag, notification.text)
}
