//! Types making up a bundle definition and its dependency rules.

use serde::*;

macro_rules! string_id {
	($(#[$meta:meta])* $name:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
		pub struct $name(pub String);

		impl std::fmt::Display for $name {
			fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
				self.0.fmt(f)
			}
		}

		impl From<&str> for $name {
			fn from(s: &str) -> Self {
				Self(s.to_owned())
			}
		}
	};
}

string_id!(
	/// Identifies a package in the user's managed collection.
	PackageId
);
string_id!(
	/// Identifies a download artifact.
	ArchiveId
);
string_id!(
	/// Identifies a profile packages are enabled in.
	ProfileId
);
string_id!(GameId);
string_id!(UserId);
string_id!(RevisionId);

/// A curated, versioned set of interdependent packages to install together.
///
/// Owned by the install subsystem once present; the driver works on a snapshot
/// taken at session start.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Bundle {
	pub id: PackageId,
	pub name: String,
	pub game_id: GameId,
	/// Links the bundle to its download artifact.
	pub archive_id: ArchiveId,
	pub author_id: Option<UserId>,
	/// Catalog slug, present when the bundle was published remotely.
	pub slug: Option<String>,
	pub revision_number: Option<u32>,
	/// Game versions the bundle declares compatibility with. Empty means any.
	pub game_versions: Vec<String>,
	pub rules: Vec<rule::DependencyRule>,
	/// Revision metadata shipped inside the bundle archive, used when the
	/// remote lookup fails.
	pub embedded_revision: Option<revision::RevisionInfo>,
}

impl Bundle {
	/// The `requires` rules that count toward installation, ignoring disabled ones.
	pub fn required_rules(&self) -> impl Iterator<Item = &rule::DependencyRule> {
		self.rules.iter().filter(|r| r.is_required())
	}

	pub fn has_recommendations(&self) -> bool {
		self.rules.iter().any(|r| r.rule_type == rule::RuleType::Recommends && !r.ignored)
	}
}

pub mod rule;
pub use rule::DependencyRule;
pub use rule::RuleType;
pub use rule::RuleExtra;
pub use rule::FileManifestEntry;

pub mod reference;
pub use reference::PackageReference;
pub use reference::RepoRef;
pub use reference::Matchable;

pub mod revision;
pub use revision::RevisionInfo;
pub use revision::RevisionFileInfo;
pub use revision::CollectionInfo;
