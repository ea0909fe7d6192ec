//! Version diffing and report rendering

use std::collections::{BTreeSet, HashSet};

use crate::version::{Version, sort_versions};

pub const REPORT_TITLE: &str = "📢 iOS firmware signing report";

pub const NO_DOWNGRADE_LINE: &str = "⚠️ No downgrade channel currently available";

/// Outcome of diffing one device's current versions against its record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Versions not previously recorded, ascending
    pub new_versions: Vec<String>,
    pub summary_line: String,
}

/// One device's line in the report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PerDeviceResult {
    pub device_id: String,
    pub new_versions: Vec<String>,
    pub summary_line: String,
}

impl PerDeviceResult {
    pub fn checked(device_id: &str, reconciliation: Reconciliation) -> Self {
        Self {
            device_id: device_id.to_string(),
            new_versions: reconciliation.new_versions,
            summary_line: reconciliation.summary_line,
        }
    }

    /// A device whose firmware query failed
    pub fn failed(device_id: &str, display_name: &str) -> Self {
        Self {
            device_id: device_id.to_string(),
            new_versions: Vec::new(),
            summary_line: format!(
                "⚠️ {} ({}): query failed, previous record kept",
                display_name, device_id
            ),
        }
    }

    pub fn has_new_versions(&self) -> bool {
        !self.new_versions.is_empty()
    }
}

/// Diff `current` against `previous` for one device.
///
/// A current version is new when no previous version is numerically equal to
/// it, so "17.0" and "17.0.0" are the same release. Unparseable versions on
/// either side are ignored.
pub fn reconcile(
    device_id: &str,
    display_name: &str,
    current: &BTreeSet<String>,
    previous: &BTreeSet<String>,
) -> Reconciliation {
    let seen: HashSet<Version> = previous
        .iter()
        .filter_map(|v| Version::parse(v).ok())
        .collect();

    let new_versions = sort_versions(current.iter().filter(|v| {
        Version::parse(v)
            .map(|parsed| !seen.contains(&parsed))
            .unwrap_or(false)
    }));

    let summary_line = if !new_versions.is_empty() {
        let listed: Vec<String> = new_versions.iter().map(|v| format!("iOS {}", v)).collect();
        format!(
            "✅ {} ({}): downgrade available: {}",
            display_name,
            device_id,
            listed.join(", ")
        )
    } else if let Some(latest) = sort_versions(current).last() {
        format!(
            "ℹ️ {} ({}): no new signed firmware (latest signed iOS {})",
            display_name, device_id, latest
        )
    } else {
        format!("ℹ️ {} ({}): no new signed firmware", display_name, device_id)
    };

    Reconciliation {
        new_versions,
        summary_line,
    }
}

/// Render the full report.
///
/// Device lines are sorted by device id. When no device has anything new the
/// device block collapses to [`NO_DOWNGRADE_LINE`].
pub fn build_report(results: &[PerDeviceResult], timestamp: &str) -> String {
    let body = if results.iter().any(PerDeviceResult::has_new_versions) {
        let mut sorted: Vec<&PerDeviceResult> = results.iter().collect();
        sorted.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        sorted
            .iter()
            .map(|r| r.summary_line.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    } else {
        NO_DOWNGRADE_LINE.to_string()
    };

    format!("{}\n\n{}\n\nUpdated: {}", REPORT_TITLE, body, timestamp)
}
