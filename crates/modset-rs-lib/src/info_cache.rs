//! Read-through cache for remote revision and collection metadata.
//!
//! Entries are keyed by slug/revision, backed by bincode files on disk and
//! never invalidated automatically: only a fresher successful fetch replaces
//! them. When everything fails the bundle's locally embedded copy is used.

use std::collections::HashMap;

use crate::bundle::Bundle;
use crate::bundle::CollectionInfo;
use crate::bundle::RevisionInfo;
use crate::host::Catalog;

pub struct InfoCache {
	dir: std::path::PathBuf,
	revisions: HashMap<(String, u32), RevisionInfo>,
	collections: HashMap<String, CollectionInfo>,
}

impl InfoCache {
	pub fn new(dir: std::path::PathBuf) -> Self {
		InfoCache {
			dir,
			revisions: Default::default(),
			collections: Default::default(),
		}
	}

	fn revision_path(&self, slug: &str, revision: u32) -> std::path::PathBuf {
		self.dir.join(format!("{slug}-rev{revision}.bin"))
	}

	/// Revision metadata for a bundle: memory, then disk, then remote fetch,
	/// then the bundle's embedded copy. A fetch failure is logged, not fatal.
	pub async fn revision_info(&mut self, catalog: &dyn Catalog, bundle: &Bundle) -> Option<RevisionInfo> {
		let (slug, revision) = match (bundle.slug.as_deref(), bundle.revision_number) {
			(Some(slug), Some(revision)) => (slug.to_owned(), revision),
			/* Never published, only the embedded copy can exist. */
			_ => return bundle.embedded_revision.clone(),
		};

		if let Some(info) = self.revisions.get(&(slug.clone(), revision)) {
			return Some(info.clone());
		}

		if let Ok(data) = std::fs::read(self.revision_path(&slug, revision)) {
			if let Ok(info) = bincode::deserialize::<RevisionInfo>(&data) {
				self.revisions.insert((slug, revision), info.clone());
				return Some(info);
			}
		}

		match catalog.fetch_revision_info(&slug, revision).await {
			Ok(info) => {
				self.store_revision(&slug, revision, &info);
				Some(info)
			}
			Err(e) => {
				log::warn!("revision metadata fetch failed for {slug} rev {revision}: {e}");
				bundle.embedded_revision.clone()
			}
		}
	}

	/// Replaces the cached entry with a fresh fetch, keeping the old one when
	/// the fetch fails.
	pub async fn refresh_revision(&mut self, catalog: &dyn Catalog, bundle: &Bundle) -> Option<RevisionInfo> {
		let (slug, revision) = match (bundle.slug.as_deref(), bundle.revision_number) {
			(Some(slug), Some(revision)) => (slug.to_owned(), revision),
			_ => return bundle.embedded_revision.clone(),
		};

		match catalog.fetch_revision_info(&slug, revision).await {
			Ok(info) => {
				self.store_revision(&slug, revision, &info);
				Some(info)
			}
			Err(e) => {
				log::warn!("revision metadata refresh failed for {slug} rev {revision}: {e}");
				self.revisions.get(&(slug, revision)).cloned().or_else(|| bundle.embedded_revision.clone())
			}
		}
	}

	fn store_revision(&mut self, slug: &str, revision: u32, info: &RevisionInfo) {
		let path = self.revision_path(slug, revision);
		match bincode::serialize(info) {
			Ok(data) => {
				if let Err(e) = std::fs::create_dir_all(&self.dir).and_then(|_| std::fs::write(&path, data)) {
					log::warn!("failed to write revision cache {}: {e}", path.display());
				}
			}
			Err(e) => log::warn!("failed to serialize revision cache entry: {e}"),
		}
		self.revisions.insert((slug.to_owned(), revision), info.clone());
	}

	/// Collection metadata, memory-cached per slug.
	pub async fn collection_info(&mut self, catalog: &dyn Catalog, bundle: &Bundle) -> Option<CollectionInfo> {
		let slug = bundle.slug.as_deref()?;

		if let Some(info) = self.collections.get(slug) {
			return Some(info.clone());
		}

		match catalog.fetch_collection_info(slug).await {
			Ok(info) => {
				self.collections.insert(slug.to_owned(), info.clone());
				Some(info)
			}
			Err(e) => {
				log::warn!("collection metadata fetch failed for {slug}: {e}");
				None
			}
		}
	}
}
