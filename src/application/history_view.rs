use std::time::{Duration, SystemTime};

use colored::Colorize;

use crate::archive::ArchivedModification;
use crate::modification::{Modification, ModificationKind};

/// One history line: age, kind, then the path(s).
pub fn render_record(record: &ArchivedModification, now: SystemTime) -> String {
    let age = now
        .duration_since(record.recorded_at())
        .unwrap_or(Duration::ZERO);
    let kind = ModificationKind::from(&record.modification);
    let label = format!("{:<7}", kind.to_string());
    let label = match kind {
        ModificationKind::Updated => label.green(),
        ModificationKind::Deleted => label.red(),
        ModificationKind::Moved => label.yellow(),
    };

    let target = match &record.modification {
        Modification::Updated { path } | Modification::Deleted { path } => {
            path.to_tagged_string()
        }
        Modification::Moved { from, to } => {
            format!("{} -> {}", from.to_tagged_string(), to.to_tagged_string())
        }
    };

    let age = format!("{:>9}", format_age(age)).dimmed();
    format!("{} {} {}", age, label, target)
}

pub fn format_age(age: Duration) -> String {
    let seconds = age.as_secs();
    match seconds {
        0..60 => format!("{seconds}s ago"),
        60..3_600 => format!("{}m ago", seconds / 60),
        3_600..86_400 => format!("{}h ago", seconds / 3_600),
        _ => format!("{}d ago", seconds / 86_400),
    }
}
