//! Remote, read-only metadata for published bundle revisions.

use serde::*;

use super::RevisionId;
use super::UserId;

/// One file record inside a published revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisionFileInfo {
	pub file_id: String,
	/// Concrete filename as served by the catalog.
	pub name: String,
	pub owner: Option<UserId>,
	pub hash: Option<String>,
	pub size: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
	pub average: f64,
	pub total: u32,
}

/// Metadata for one immutable published version of a bundle.
///
/// Never mutated locally; cached read-through and only replaced by a fresher
/// successful fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionInfo {
	pub id: RevisionId,
	pub revision_number: u32,
	pub collection_slug: String,
	/// Game versions this revision requires. Empty means any.
	pub game_versions: Vec<String>,
	pub files: Vec<RevisionFileInfo>,
	pub rating: Option<Rating>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
	pub slug: String,
	pub name: String,
	pub author: Option<UserId>,
}
