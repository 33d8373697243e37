//! Matching package references against real packages and pending downloads.

use serde::*;

use super::PackageId;

/// Catalog coordinates of a published file. Both ids are kept as strings to
/// avoid numeric-type mismatches between metadata sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
	pub mod_id: String,
	pub file_id: String,
}

/// A descriptor matching zero or more real packages.
///
/// A reference matches at most one installed package but may transiently match
/// several pending downloads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageReference {
	pub content_hash: Option<String>,
	pub repo: Option<RepoRef>,
	pub logical_name: Option<String>,
	pub id: Option<PackageId>,
	/// Free-form regular expression tested against the candidate's logical name.
	pub match_expression: Option<String>,
	/// Declared download size in bytes, used for progress totals.
	pub file_size: Option<u64>,
}

/// Anything a [`PackageReference`] can be tested against.
pub trait Matchable {
	fn content_hash(&self) -> Option<&str>;
	fn repo(&self) -> Option<&RepoRef>;
	fn logical_name(&self) -> Option<&str>;
	fn id(&self) -> Option<&PackageId>;
}

impl PackageReference {
	/// Decides whether `candidate` is the package/download this reference points at.
	///
	/// A discriminator present on both sides that agrees is a match. A
	/// discriminator absent on either side is skipped, never treated as a
	/// mismatch. Deterministic, total, no side effects.
	pub fn matches(&self, candidate: &impl Matchable) -> bool {
		if let (Some(lhs), Some(rhs)) = (self.content_hash.as_deref(), candidate.content_hash()) {
			if lhs == rhs {
				return true;
			}
		}

		if let (Some(lhs), Some(rhs)) = (self.repo.as_ref(), candidate.repo()) {
			if lhs.mod_id == rhs.mod_id && lhs.file_id == rhs.file_id {
				return true;
			}
		}

		if let (Some(lhs), Some(rhs)) = (self.logical_name.as_deref(), candidate.logical_name()) {
			if lhs == rhs {
				return true;
			}
		}

		if let (Some(lhs), Some(rhs)) = (self.id.as_ref(), candidate.id()) {
			if lhs == rhs {
				return true;
			}
		}

		if let (Some(expr), Some(name)) = (self.match_expression.as_deref(), candidate.logical_name()) {
			/* An expression that fails to compile acts as an absent discriminator. */
			if let Ok(re) = regex::Regex::new(expr) {
				if re.is_match(name) {
					return true;
				}
			}
		}

		false
	}
}
