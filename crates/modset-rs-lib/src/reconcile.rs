//! Upgrades an installed bundle to a newer published revision.
//!
//! A one-shot workflow triggered by the "newer revision available" signal. It
//! downloads and installs the new revision, works out which of the old
//! revision's dependencies nothing needs anymore, asks the user what to do with
//! them, and removes the old bundle package together with whatever the user let
//! go of in one atomic batch.

use std::sync::Arc;

use crate::bundle::PackageId;
use crate::bundle::DependencyRule;
use crate::host::Catalog;
use crate::host::ConfirmAction;
use crate::host::ConfirmRequest;
use crate::host::Downloader;
use crate::host::Frontend;
use crate::host::InstalledPackage;
use crate::host::Notification;
use crate::host::PackageStore;
use crate::host::RevisionUpdateRequest;
use crate::Error;
use crate::Result;

/// Source tag of the catalog this workflow reacts to.
pub const CATALOG_SOURCE: &str = "catalog";

pub struct Reconciler {
	catalog: Arc<dyn Catalog>,
	downloads: Arc<dyn Downloader>,
	store: Arc<dyn PackageStore>,
	frontend: Arc<dyn Frontend>,
}

impl Reconciler {
	pub fn new(
		catalog: Arc<dyn Catalog>,
		downloads: Arc<dyn Downloader>,
		store: Arc<dyn PackageStore>,
		frontend: Arc<dyn Frontend>,
	) -> Reconciler {
		Reconciler { catalog, downloads, store, frontend }
	}

	/// Entry point for the "newer revision available" signal.
	///
	/// Ignores signals from other sources or without a revision number. Any
	/// failure except a user cancellation surfaces as a single notification.
	pub async fn on_revision_available(&self, request: &RevisionUpdateRequest) -> Result<()> {
		if request.source_tag != CATALOG_SOURCE {
			log::trace!("ignoring revision signal from source {}", request.source_tag);
			return Ok(());
		}
		let Some(revision) = request.revision_number else {
			log::trace!("ignoring revision signal without a revision number for {}", request.slug);
			return Ok(());
		};

		match self.apply_update(request, revision).await {
			Ok(()) => Ok(()),
			Err(e) if e.is_cancellation() => {
				log::debug!("revision update for {} cancelled", request.slug);
				Ok(())
			}
			Err(e) => {
				self.frontend.notify(Notification::error(
					"Bundle update failed",
					format!("{}: {e}", request.slug),
				));
				Err(e)
			}
		}
	}

	async fn apply_update(&self, request: &RevisionUpdateRequest, revision: u32) -> Result<()> {
		let info = self.catalog.fetch_revision_info(&request.slug, revision).await?;
		if info.collection_slug != request.slug {
			return Err(Error::SlugMismatch {
				expected: request.slug.clone(),
				got: info.collection_slug.clone(),
			});
		}

		let profile = self
			.store
			.active_profile(&request.game_id)
			.ok_or_else(|| Error::Other(format!("no active profile for game {}", request.game_id)))?;

		let url = self.catalog.resolve_revision_url(&info).await;
		let url = self.classify(&request.slug, url)?;

		let archive = match self.downloads.start_download(&url, &request.slug).await {
			Err(Error::AlreadyDownloaded(archive)) => {
				log::debug!("revision archive for {} already downloaded, reusing {archive}", request.slug);
				archive
			}
			other => self.classify(&request.slug, other)?,
		};

		let new_package = self.store.install_archive(&profile, &archive).await?;
		self.store.enable_package(&profile, &new_package);
		log::info!("installed {} rev {revision} as {new_package}", request.slug);

		let installed = self.store.installed_packages(&profile);
		let old_rules = rules_of(&installed, &request.old_package_id);
		let new_rules = rules_of(&installed, &new_package);
		let obsolete = compute_obsolete(&old_rules, &new_rules, &installed, &request.old_package_id, &new_package);

		let mut to_remove = vec![request.old_package_id.clone()];
		if !obsolete.is_empty() {
			to_remove.extend(self.resolve_disposition(&obsolete).await?);
		}

		/* The old bundle package always goes, in the same atomic batch. */
		self.store.remove_packages(to_remove).await?;
		self.frontend.view_bundle(&new_package);
		Ok(())
	}

	/// Asks the user what to do with the obsolete packages and returns the ones
	/// to remove. Kept packages are re-flagged as not installed-as-dependency so
	/// a future reconciliation does not offer them again.
	async fn resolve_disposition(&self, obsolete: &[PackageId]) -> Result<Vec<PackageId>> {
		let action = self
			.frontend
			.confirm(ConfirmRequest {
				title: "Obsolete dependencies".to_owned(),
				message: format!(
					"{} package(s) were installed as dependencies of the previous revision and nothing requires them anymore.",
					obsolete.len()
				),
				actions: vec![ConfirmAction::KeepAll, ConfirmAction::RemoveAll, ConfirmAction::Review],
			})
			.await?;

		match action {
			ConfirmAction::RemoveAll => Ok(obsolete.to_vec()),
			ConfirmAction::Review => {
				let mut removals = Vec::new();
				for package in obsolete {
					let choice = self
						.frontend
						.confirm(ConfirmRequest {
							title: "Obsolete dependency".to_owned(),
							message: format!("{package} is no longer required. Remove it?"),
							actions: vec![ConfirmAction::Remove, ConfirmAction::Keep],
						})
						.await?;
					if choice == ConfirmAction::Remove {
						removals.push(package.clone());
					} else {
						self.store.set_installed_as_dependency(package, false);
					}
				}
				Ok(removals)
			}
			/* KeepAll and anything else keeps everything. */
			_ => {
				for package in obsolete {
					self.store.set_installed_as_dependency(package, false);
				}
				Ok(Vec::new())
			}
		}
	}

	/// Turns classified server failures into a targeted notification and a
	/// generic cancellation so callers don't treat them as unexpected crashes.
	fn classify<T>(&self, entry: &str, result: Result<T>) -> Result<T> {
		match result {
			Err(e @ Error::FileNotFound(_)) | Err(e @ Error::Rejected(_)) => {
				self.frontend.notify(Notification::error("Bundle update failed", format!("{entry}: {e}")));
				Err(Error::Cancelled)
			}
			other => other,
		}
	}
}

fn rules_of(installed: &[InstalledPackage], package: &PackageId) -> Vec<DependencyRule> {
	installed
		.iter()
		.find(|p| p.id == *package)
		.map(|p| p.rules.clone())
		.unwrap_or_default()
}

/// Former dependencies of the old bundle that nothing needs anymore.
///
/// Candidates are installed-as-dependency packages the old rule set referenced.
/// A candidate is obsolete when the new rule set does not reference it and no
/// other installed package (outside the old and new bundle packages) references
/// it either.
pub fn compute_obsolete(
	old_rules: &[DependencyRule],
	new_rules: &[DependencyRule],
	installed: &[InstalledPackage],
	old_bundle: &PackageId,
	new_bundle: &PackageId,
) -> Vec<PackageId> {
	let others: Vec<&InstalledPackage> = installed
		.iter()
		.filter(|p| p.id != *old_bundle && p.id != *new_bundle)
		.collect();

	let (candidates, not_candidates): (Vec<&InstalledPackage>, Vec<&InstalledPackage>) =
		others.into_iter().partition(|p| {
			p.installed_as_dependency && old_rules.iter().any(|r| r.reference.matches(*p))
		});

	candidates
		.into_iter()
		.filter(|candidate| {
			let needed_by_new = new_rules.iter().any(|r| r.reference.matches(*candidate));
			let needed_by_other = not_candidates
				.iter()
				.any(|other| other.rules.iter().any(|r| r.reference.matches(*candidate)));
			!needed_by_new && !needed_by_other
		})
		.map(|p| p.id.clone())
		.collect()
}
