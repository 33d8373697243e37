//! The boundary to the surrounding application.
//!
//! Downloading, unpacking, package bookkeeping, remote catalog access and all UI
//! are external collaborators. The orchestrator only ever talks to them through
//! the traits below; the host wires concrete implementations in.

use async_trait::async_trait;

use crate::bundle::*;
use crate::Result;

/// Read-only view of a package in the user's managed collection.
///
/// Owned and mutated by the install subsystem, the orchestrator only reads it.
#[derive(Debug, Clone, Default)]
pub struct InstalledPackage {
	pub id: PackageId,
	pub archive_id: Option<ArchiveId>,
	pub content_hash: Option<String>,
	pub logical_name: Option<String>,
	pub repo: Option<RepoRef>,
	pub version: Option<String>,
	/// Directory the package's files were unpacked into.
	pub install_root: std::path::PathBuf,
	/// Installer options recorded when the package was installed.
	pub installer_choices: Option<serde_json::Value>,
	/// Dependency rules the package itself declares.
	pub rules: Vec<DependencyRule>,
	pub installed_as_dependency: bool,
	pub enabled: bool,
}

impl Matchable for InstalledPackage {
	fn content_hash(&self) -> Option<&str> { self.content_hash.as_deref() }
	fn repo(&self) -> Option<&RepoRef> { self.repo.as_ref() }
	fn logical_name(&self) -> Option<&str> { self.logical_name.as_deref() }
	fn id(&self) -> Option<&PackageId> { Some(&self.id) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
	Pending,
	Downloading,
	Finished,
	Failed,
}

/// Read-only view of an in-flight download.
#[derive(Debug, Clone)]
pub struct PendingDownload {
	pub archive_id: ArchiveId,
	pub logical_name: Option<String>,
	pub repo: Option<RepoRef>,
	pub content_hash: Option<String>,
	pub received_bytes: u64,
	pub total_bytes: Option<u64>,
	pub state: DownloadState,
}

impl Matchable for PendingDownload {
	fn content_hash(&self) -> Option<&str> { self.content_hash.as_deref() }
	fn repo(&self) -> Option<&RepoRef> { self.repo.as_ref() }
	fn logical_name(&self) -> Option<&str> { self.logical_name.as_deref() }
	fn id(&self) -> Option<&PackageId> { None }
}

/// Rules are immutable records, so an update is a remove+add pair.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleMutation {
	Add(DependencyRule),
	Remove(DependencyRule),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
	Activity,
	Info,
	Warning,
	Error,
}

/// A notification shown by the host UI, keyed by a stable id so it can be
/// replaced and dismissed.
#[derive(Debug, Clone)]
pub struct Notification {
	pub id: String,
	pub kind: NotificationKind,
	pub title: String,
	pub message: String,
}

impl Notification {
	pub fn activity(id: String, title: impl Into<String>, message: impl Into<String>) -> Self {
		Notification { id, kind: NotificationKind::Activity, title: title.into(), message: message.into() }
	}

	pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
		let title = title.into();
		Notification {
			id: format!("modset-error-{}", title.to_lowercase().replace(' ', "-")),
			kind: NotificationKind::Error,
			title,
			message: message.into(),
		}
	}
}

/// The fixed set of labeled actions a blocking confirmation can resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
	Continue,
	Cancel,
	KeepAll,
	RemoveAll,
	Review,
	Keep,
	Remove,
}

#[derive(Debug, Clone)]
pub struct ConfirmRequest {
	pub title: String,
	pub message: String,
	pub actions: Vec<ConfirmAction>,
}

/// Payload of the "newer revision available" signal.
#[derive(Debug, Clone)]
pub struct RevisionUpdateRequest {
	pub game_id: GameId,
	pub slug: String,
	pub revision_number: Option<u32>,
	/// Which catalog the signal originated from. The workflow only reacts to
	/// its own source.
	pub source_tag: String,
	pub old_package_id: PackageId,
}

/// Remote catalog service resolving slugs/revisions to metadata and links.
#[async_trait]
pub trait Catalog: Send + Sync {
	async fn fetch_revision_info(&self, slug: &str, revision: u32) -> Result<RevisionInfo>;
	async fn fetch_collection_info(&self, slug: &str) -> Result<CollectionInfo>;
	/// Download link for the revision's bundle archive itself.
	async fn resolve_revision_url(&self, revision: &RevisionInfo) -> Result<String>;
	/// The logged-in catalog user, if any.
	fn current_user(&self) -> Option<UserId>;
}

/// Download subsystem. Fetches bytes and reports byte-level progress; the
/// orchestrator never touches the network itself.
#[async_trait]
pub trait Downloader: Send + Sync {
	/// Starts a download and resolves to the archive it produces once finished.
	///
	/// Returns [`crate::Error::AlreadyDownloaded`] carrying the existing archive
	/// when the artifact is already present.
	async fn start_download(&self, url: &str, name: &str) -> Result<ArchiveId>;
	fn pending_downloads(&self) -> Vec<PendingDownload>;
}

/// Install subsystem and package bookkeeping.
#[async_trait]
pub trait PackageStore: Send + Sync {
	fn installed_packages(&self, profile: &ProfileId) -> Vec<InstalledPackage>;
	/// Unpacks an archive into a new package in the given profile.
	async fn install_archive(&self, profile: &ProfileId, archive: &ArchiveId) -> Result<PackageId>;
	/// The bundle definition recorded for an installed bundle package.
	fn bundle_definition(&self, package: &PackageId) -> Option<Bundle>;
	fn apply_rule_mutations(&self, bundle: &PackageId, mutations: Vec<RuleMutation>);
	fn enable_package(&self, profile: &ProfileId, package: &PackageId);
	fn set_installed_as_dependency(&self, package: &PackageId, flag: bool);
	/// Removes the given packages in one atomic batch.
	async fn remove_packages(&self, packages: Vec<PackageId>) -> Result<()>;
	/// Applies a rule's binary patches to an installed package.
	async fn apply_patch(&self, package: &PackageId, patches: &serde_json::Value) -> Result<()>;
	fn installed_game_version(&self, game: &GameId) -> Option<String>;
	fn active_profile(&self, game: &GameId) -> Option<ProfileId>;
	/// Registers a pending rating vote for a revision. Idempotent, keyed by revision.
	fn register_pending_vote(&self, revision: &RevisionId);
}

/// UI layer: notifications, blocking confirmations and install triggers.
#[async_trait]
pub trait Frontend: Send + Sync {
	fn notify(&self, notification: Notification);
	fn dismiss(&self, id: &str);
	/// Blocks until the user picks one of `request.actions`.
	async fn confirm(&self, request: ConfirmRequest) -> Result<ConfirmAction>;
	fn begin_dependency_install(&self, profile: &ProfileId, game: &GameId, bundles: &[PackageId], optional: bool);
	/// Focus hint asking the UI to show a bundle.
	fn view_bundle(&self, bundle: &PackageId);
	/// Called whenever observable driver state changed.
	fn driver_updated(&self);
}
