//! Test fixtures: an in-memory recording host plus bundle builders.
//!
//! `MockHost` implements every collaborator trait at once and records all
//! outbound calls so tests can assert on exactly what the orchestrator emitted.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use modset_rs::bundle::*;
use modset_rs::host::*;
use modset_rs::Error;
use modset_rs::Result;

/// One outbound call recorded by the mock host.
#[derive(Debug, Clone, PartialEq)]
pub enum Emitted {
	BeginDependencyInstall { profile: ProfileId, game: GameId, bundles: Vec<PackageId>, optional: bool },
	ViewBundle(PackageId),
	EnablePackage { profile: ProfileId, package: PackageId },
	RuleMutations { bundle: PackageId, mutations: Vec<RuleMutation> },
	RemovePackages(Vec<PackageId>),
	SetInstalledAsDependency { package: PackageId, flag: bool },
	PendingVote(RevisionId),
	PatchApplied(PackageId),
	Notify(String),
	Dismiss(String),
}

/// What a configured download resolves to.
pub enum DownloadOutcome {
	Ok(ArchiveId),
	AlreadyDownloaded(ArchiveId),
	FileNotFound,
	Rejected,
}

#[derive(Default)]
struct HostState {
	installed: Vec<InstalledPackage>,
	downloads: Vec<PendingDownload>,
	bundles: HashMap<PackageId, Bundle>,
	revisions: HashMap<(String, u32), RevisionInfo>,
	collections: HashMap<String, CollectionInfo>,
	download_outcomes: HashMap<String, DownloadOutcome>,
	install_outcomes: HashMap<ArchiveId, InstalledPackage>,
	game_versions: HashMap<GameId, String>,
	active_profiles: HashMap<GameId, ProfileId>,
	current_user: Option<UserId>,
	confirm_answers: VecDeque<ConfirmAction>,
	confirms_seen: Vec<String>,
	notifications: Vec<Notification>,
	emitted: Vec<Emitted>,
	updates: usize,
}

#[derive(Default)]
pub struct MockHost {
	state: Mutex<HostState>,
}

impl MockHost {
	pub fn new() -> Self {
		Default::default()
	}

	fn with<R>(&self, f: impl FnOnce(&mut HostState) -> R) -> R {
		f(&mut self.state.lock().expect("mock host state poisoned"))
	}

	/* Fixture setup */

	pub fn add_installed(&self, package: InstalledPackage) {
		self.with(|s| s.installed.push(package));
	}

	pub fn add_download(&self, download: PendingDownload) {
		self.with(|s| s.downloads.push(download));
	}

	pub fn add_bundle_definition(&self, bundle: Bundle) {
		self.with(|s| s.bundles.insert(bundle.id.clone(), bundle));
	}

	pub fn add_revision(&self, info: RevisionInfo) {
		self.with(|s| s.revisions.insert((info.collection_slug.clone(), info.revision_number), info));
	}

	/// Registers revision metadata under a lookup key of its own, regardless of
	/// the slug the metadata itself claims.
	pub fn add_revision_as(&self, slug: &str, revision: u32, info: RevisionInfo) {
		self.with(|s| s.revisions.insert((slug.to_owned(), revision), info));
	}

	pub fn add_collection(&self, info: CollectionInfo) {
		self.with(|s| s.collections.insert(info.slug.clone(), info));
	}

	pub fn set_download_outcome(&self, url: &str, outcome: DownloadOutcome) {
		self.with(|s| s.download_outcomes.insert(url.to_owned(), outcome));
	}

	/// Configures the package an archive unpacks into; it is appended to the
	/// installed set when `install_archive` runs.
	pub fn set_install_outcome(&self, archive: ArchiveId, package: InstalledPackage) {
		self.with(|s| s.install_outcomes.insert(archive, package));
	}

	pub fn set_game_version(&self, game: GameId, version: &str) {
		self.with(|s| s.game_versions.insert(game, version.to_owned()));
	}

	pub fn set_active_profile(&self, game: GameId, profile: ProfileId) {
		self.with(|s| s.active_profiles.insert(game, profile));
	}

	pub fn set_current_user(&self, user: Option<UserId>) {
		self.with(|s| s.current_user = user);
	}

	/// Queues the answer for the next blocking confirmation. Unanswered
	/// confirmations resolve to `Continue`.
	pub fn push_confirm_answer(&self, action: ConfirmAction) {
		self.with(|s| s.confirm_answers.push_back(action));
	}

	/* Assertions */

	pub fn emitted(&self) -> Vec<Emitted> {
		self.with(|s| s.emitted.clone())
	}

	pub fn begin_install_signals(&self) -> Vec<Emitted> {
		self.with(|s| {
			s.emitted
				.iter()
				.filter(|e| matches!(e, Emitted::BeginDependencyInstall { .. }))
				.cloned()
				.collect()
		})
	}

	pub fn notifications(&self) -> Vec<Notification> {
		self.with(|s| s.notifications.clone())
	}

	pub fn confirms_seen(&self) -> Vec<String> {
		self.with(|s| s.confirms_seen.clone())
	}

	pub fn installed_ids(&self) -> Vec<PackageId> {
		self.with(|s| s.installed.iter().map(|p| p.id.clone()).collect())
	}

	pub fn installed_package(&self, id: &PackageId) -> Option<InstalledPackage> {
		self.with(|s| s.installed.iter().find(|p| p.id == *id).cloned())
	}

	pub fn update_count(&self) -> usize {
		self.with(|s| s.updates)
	}
}

#[async_trait]
impl Catalog for MockHost {
	async fn fetch_revision_info(&self, slug: &str, revision: u32) -> Result<RevisionInfo> {
		self.with(|s| {
			s.revisions
				.get(&(slug.to_owned(), revision))
				.cloned()
				.ok_or_else(|| Error::RemoteFetch(format!("no revision {revision} for {slug}")))
		})
	}

	async fn fetch_collection_info(&self, slug: &str) -> Result<CollectionInfo> {
		self.with(|s| {
			s.collections
				.get(slug)
				.cloned()
				.ok_or_else(|| Error::RemoteFetch(format!("no collection {slug}")))
		})
	}

	async fn resolve_revision_url(&self, revision: &RevisionInfo) -> Result<String> {
		Ok(format!("https://catalog.invalid/{}/rev{}", revision.collection_slug, revision.revision_number))
	}

	fn current_user(&self) -> Option<UserId> {
		self.with(|s| s.current_user.clone())
	}
}

#[async_trait]
impl Downloader for MockHost {
	async fn start_download(&self, url: &str, name: &str) -> Result<ArchiveId> {
		self.with(|s| match s.download_outcomes.get(url) {
			Some(DownloadOutcome::Ok(archive)) => Ok(archive.clone()),
			Some(DownloadOutcome::AlreadyDownloaded(archive)) => Err(Error::AlreadyDownloaded(archive.clone())),
			Some(DownloadOutcome::FileNotFound) => Err(Error::FileNotFound(name.to_owned())),
			Some(DownloadOutcome::Rejected) => Err(Error::Rejected(name.to_owned())),
			None => Ok(ArchiveId(format!("archive-{name}"))),
		})
	}

	fn pending_downloads(&self) -> Vec<PendingDownload> {
		self.with(|s| s.downloads.clone())
	}
}

#[async_trait]
impl PackageStore for MockHost {
	fn installed_packages(&self, _profile: &ProfileId) -> Vec<InstalledPackage> {
		self.with(|s| s.installed.clone())
	}

	async fn install_archive(&self, _profile: &ProfileId, archive: &ArchiveId) -> Result<PackageId> {
		self.with(|s| {
			let package = s
				.install_outcomes
				.get(archive)
				.cloned()
				.ok_or_else(|| Error::Other(format!("no install outcome configured for {archive}")))?;
			let id = package.id.clone();
			s.installed.push(package);
			Ok(id)
		})
	}

	fn bundle_definition(&self, package: &PackageId) -> Option<Bundle> {
		self.with(|s| s.bundles.get(package).cloned())
	}

	fn apply_rule_mutations(&self, bundle: &PackageId, mutations: Vec<RuleMutation>) {
		self.with(|s| s.emitted.push(Emitted::RuleMutations { bundle: bundle.clone(), mutations }));
	}

	fn enable_package(&self, profile: &ProfileId, package: &PackageId) {
		self.with(|s| {
			s.emitted.push(Emitted::EnablePackage { profile: profile.clone(), package: package.clone() })
		});
	}

	fn set_installed_as_dependency(&self, package: &PackageId, flag: bool) {
		self.with(|s| {
			if let Some(p) = s.installed.iter_mut().find(|p| p.id == *package) {
				p.installed_as_dependency = flag;
			}
			s.emitted.push(Emitted::SetInstalledAsDependency { package: package.clone(), flag });
		});
	}

	async fn remove_packages(&self, packages: Vec<PackageId>) -> Result<()> {
		self.with(|s| {
			s.installed.retain(|p| !packages.contains(&p.id));
			s.emitted.push(Emitted::RemovePackages(packages));
			Ok(())
		})
	}

	async fn apply_patch(&self, package: &PackageId, _patches: &serde_json::Value) -> Result<()> {
		self.with(|s| {
			s.emitted.push(Emitted::PatchApplied(package.clone()));
			Ok(())
		})
	}

	fn installed_game_version(&self, game: &GameId) -> Option<String> {
		self.with(|s| s.game_versions.get(game).cloned())
	}

	fn active_profile(&self, game: &GameId) -> Option<ProfileId> {
		self.with(|s| s.active_profiles.get(game).cloned())
	}

	fn register_pending_vote(&self, revision: &RevisionId) {
		self.with(|s| {
			let marker = Emitted::PendingVote(revision.clone());
			/* Idempotent, keyed by revision. */
			if !s.emitted.contains(&marker) {
				s.emitted.push(marker);
			}
		});
	}
}

#[async_trait]
impl Frontend for MockHost {
	fn notify(&self, notification: Notification) {
		self.with(|s| {
			s.emitted.push(Emitted::Notify(notification.id.clone()));
			s.notifications.push(notification);
		});
	}

	fn dismiss(&self, id: &str) {
		self.with(|s| s.emitted.push(Emitted::Dismiss(id.to_owned())));
	}

	async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmAction> {
		self.with(|s| {
			s.confirms_seen.push(request.title.clone());
			Ok(s.confirm_answers.pop_front().unwrap_or(ConfirmAction::Continue))
		})
	}

	fn begin_dependency_install(&self, profile: &ProfileId, game: &GameId, bundles: &[PackageId], optional: bool) {
		self.with(|s| {
			s.emitted.push(Emitted::BeginDependencyInstall {
				profile: profile.clone(),
				game: game.clone(),
				bundles: bundles.to_vec(),
				optional,
			})
		});
	}

	fn view_bundle(&self, bundle: &PackageId) {
		self.with(|s| s.emitted.push(Emitted::ViewBundle(bundle.clone())));
	}

	fn driver_updated(&self) {
		self.with(|s| s.updates += 1);
	}
}

/* Builders */

pub fn requires(name: &str, size: u64) -> DependencyRule {
	DependencyRule {
		rule_type: RuleType::Requires,
		reference: PackageReference {
			logical_name: Some(name.to_owned()),
			file_size: Some(size),
			..Default::default()
		},
		..Default::default()
	}
}

pub fn recommends(name: &str) -> DependencyRule {
	DependencyRule {
		rule_type: RuleType::Recommends,
		reference: PackageReference { logical_name: Some(name.to_owned()), ..Default::default() },
		..Default::default()
	}
}

pub fn bundle(id: &str, game: &str, rules: Vec<DependencyRule>) -> Bundle {
	Bundle {
		id: PackageId::from(id),
		name: id.to_owned(),
		game_id: GameId::from(game),
		archive_id: ArchiveId(format!("archive-{id}")),
		rules,
		..Default::default()
	}
}

pub fn installed(id: &str, name: &str) -> InstalledPackage {
	InstalledPackage {
		id: PackageId::from(id),
		logical_name: Some(name.to_owned()),
		enabled: true,
		..Default::default()
	}
}
