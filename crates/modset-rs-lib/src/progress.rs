//! Session progress aggregation.
//!
//! Progress is always recomputed in full from current state, never accumulated
//! incrementally. Combined with a total size that is fixed at session start this
//! keeps the reported percentage monotonic while external download and install
//! events interleave arbitrarily.

use crate::bundle::DependencyRule;
use crate::host::DownloadState;
use crate::host::InstalledPackage;
use crate::host::PendingDownload;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
	/// No matching download or package yet.
	Pending,
	Downloading { received: u64 },
	/// Download complete, package not yet present.
	Installing { received: u64 },
	Installed,
}

#[derive(Debug, Clone, Copy)]
pub struct EntryProgress {
	/// Whether the entry counts toward totals.
	pub relevant: bool,
	/// Declared file size in bytes.
	pub size: u64,
	pub state: EntryState,
}

/// Total bytes across the full relevant rule set.
///
/// Computed once at session start and cached for the whole session so that
/// progress never regresses as better size estimates arrive.
pub fn total_size(rules: &[DependencyRule]) -> u64 {
	rules
		.iter()
		.filter(|r| r.is_required())
		.filter_map(|r| r.reference.file_size)
		.sum()
}

/// Builds the current per-rule progress snapshot from external state.
pub fn snapshot(
	rules: &[DependencyRule],
	installed: &[InstalledPackage],
	downloads: &[PendingDownload],
) -> Vec<EntryProgress> {
	rules
		.iter()
		.map(|rule| {
			let state = if installed.iter().any(|p| rule.reference.matches(p)) {
				EntryState::Installed
			} else if let Some(dl) = downloads.iter().find(|d| rule.reference.matches(*d)) {
				match dl.state {
					DownloadState::Finished => EntryState::Installing { received: dl.received_bytes },
					_ => EntryState::Downloading { received: dl.received_bytes },
				}
			} else {
				EntryState::Pending
			};
			EntryProgress {
				relevant: rule.is_required(),
				size: rule.reference.file_size.unwrap_or(0),
				state,
			}
		})
		.collect()
}

/// Single 0..=100 completion percentage for a session.
///
/// Download and install phases are weighted equally; the result saturates at
/// 100 once both fractions reach 1.0. `total_size` is the cached value from
/// session start, not recomputed here.
pub fn progress(entries: &[EntryProgress], total_size: u64) -> u8 {
	let mut relevant_count: usize = 0;
	let mut installed_count: usize = 0;
	let mut download_progress: u64 = 0;

	for entry in entries.iter().filter(|e| e.relevant) {
		relevant_count += 1;
		match entry.state {
			EntryState::Pending => {}
			EntryState::Downloading { received } | EntryState::Installing { received } => {
				download_progress += received;
			}
			EntryState::Installed => {
				/* Once installed the entry counts at its full declared size. */
				download_progress += entry.size;
				installed_count += 1;
			}
		}
	}

	/* Guard both divisions, an empty session reports 0 rather than NaN. */
	let download_fraction = if total_size == 0 {
		0.0
	} else {
		download_progress as f64 / total_size as f64
	};
	let install_fraction = if relevant_count == 0 {
		0.0
	} else {
		installed_count as f64 / relevant_count as f64
	};

	let percent = (download_fraction + install_fraction) * 50.0;
	percent.min(100.0).max(0.0) as u8
}
