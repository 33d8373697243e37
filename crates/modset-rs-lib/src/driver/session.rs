//! State of one active bundle installation.

use crate::bundle::ArchiveId;
use crate::bundle::Bundle;
use crate::bundle::CollectionInfo;
use crate::bundle::DependencyRule;
use crate::bundle::PackageId;
use crate::bundle::ProfileId;
use crate::bundle::RevisionInfo;
use crate::progress;

/// Where the driver currently is in a bundle's lifecycle.
///
/// `Prepare` means no session exists; a live session is always in one of the
/// other phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Prepare,
	Query,
	Start,
	Disclaimer,
	Installing,
	Recommendations,
	Review,
}

/// The driver's single active installation attempt for one bundle/profile pair.
///
/// Created whole on `start`/`query`, mutated only by the driver's own handlers,
/// dropped whole on teardown.
#[derive(Debug, Clone)]
pub struct Session {
	pub profile: ProfileId,
	pub bundle: Bundle,
	pub phase: Phase,
	/// Packages installed during this session that matched a required rule.
	pub installed_packages: Vec<PackageId>,
	/// Required rules still missing or unfulfilled, recomputed on batch events.
	pub required_rules: Vec<DependencyRule>,
	/// Archive the install subsystem reported as currently installing.
	pub installing_archive: Option<ArchiveId>,
	/// Byte total over the full relevant rule set, fixed at session start.
	pub total_size: u64,
	pub revision_info: Option<RevisionInfo>,
	pub collection_info: Option<CollectionInfo>,
}

impl Session {
	pub fn new(profile: ProfileId, bundle: Bundle) -> Self {
		let total_size = progress::total_size(&bundle.rules);
		Session {
			profile,
			bundle,
			phase: Phase::Query,
			installed_packages: Default::default(),
			required_rules: Default::default(),
			installing_archive: None,
			total_size,
			revision_info: None,
			collection_info: None,
		}
	}
}
