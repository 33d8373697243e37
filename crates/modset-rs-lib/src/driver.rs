//! The bundle installation driver.
//!
//! A phase state machine owning the lifecycle of one active bundle
//! installation. It sequences the install, tracks asynchronous progress across
//! the external download and install pipelines, and skips dependencies that are
//! already satisfied. All driver state lives on one logical host dispatch task;
//! handlers are re-entered from independent event sources and therefore check
//! whether an event concerns the current session before mutating anything.

use std::sync::Arc;

use crate::bundle::ArchiveId;
use crate::bundle::Bundle;
use crate::bundle::DependencyRule;
use crate::bundle::GameId;
use crate::bundle::PackageId;
use crate::bundle::ProfileId;
use crate::bundle::RevisionInfo;
use crate::fulfillment;
use crate::host::Catalog;
use crate::host::ConfirmAction;
use crate::host::ConfirmRequest;
use crate::host::Downloader;
use crate::host::Frontend;
use crate::host::Notification;
use crate::host::PackageStore;
use crate::host::RuleMutation;
use crate::info_cache::InfoCache;
use crate::progress;
use crate::Error;
use crate::ModsetOptions;
use crate::Result;

mod session;
pub use session::Phase;
pub use session::Session;

/// Stable notification id for a bundle's install progress.
pub fn progress_notification_id(bundle: &PackageId) -> String {
	format!("bundle-install-{bundle}")
}

type PendingOp = std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send>>;

pub struct InstallDriver {
	catalog: Arc<dyn Catalog>,
	downloads: Arc<dyn Downloader>,
	store: Arc<dyn PackageStore>,
	frontend: Arc<dyn Frontend>,
	cache: InfoCache,
	session: Option<Session>,
	/// Survives teardown so callers can observe how the last session ended.
	install_done: bool,
	pending: Vec<PendingOp>,
}

impl InstallDriver {
	pub fn new(
		catalog: Arc<dyn Catalog>,
		downloads: Arc<dyn Downloader>,
		store: Arc<dyn PackageStore>,
		frontend: Arc<dyn Frontend>,
		options: &ModsetOptions,
	) -> InstallDriver {
		InstallDriver {
			catalog,
			downloads,
			store,
			frontend,
			cache: InfoCache::new(options.cache_dir().join("revisions")),
			session: None,
			install_done: false,
			pending: Default::default(),
		}
	}

	/* Getters for UI polling. */

	pub fn phase(&self) -> Phase {
		self.session.as_ref().map(|s| s.phase).unwrap_or(Phase::Prepare)
	}

	pub fn session(&self) -> Option<&Session> {
		self.session.as_ref()
	}

	pub fn install_done(&self) -> bool {
		self.install_done
	}

	/// Current completion percentage, recomputed in full from external state.
	pub fn progress(&self) -> u8 {
		let Some(s) = self.session.as_ref() else { return 0 };
		let installed = self.store.installed_packages(&s.profile);
		let downloads = self.downloads.pending_downloads();
		let entries = progress::snapshot(&s.bundle.rules, &installed, &downloads);
		progress::progress(&entries, s.total_size)
	}

	fn session_active(&self) -> bool {
		self.session.is_some() && !self.install_done
	}

	/// Queues an asynchronous preparation. A `query`/`start` invoked afterwards
	/// always observes its result; this is the only ordering primitive the
	/// driver provides for its own entry points.
	pub fn prepare<F>(&mut self, op: F)
	where
		F: std::future::Future<Output = ()> + Send + 'static,
	{
		self.pending.push(Box::pin(op));
	}

	async fn flush_pending(&mut self) {
		for op in self.pending.drain(..) {
			op.await;
		}
	}

	/// Read-only preview: loads cached revision and collection metadata without
	/// dispatching any installs. A no-op while a session is active and unfinished.
	pub async fn query(&mut self, profile: ProfileId, bundle: &Bundle) -> Result<()> {
		self.flush_pending().await;

		if self.session_active() {
			log::debug!("query for {} ignored, a session is already active", bundle.id);
			return Ok(());
		}
		if self.session.is_some() {
			/* A finished session may still be lingering in review. */
			self.teardown();
		}

		let mut session = Session::new(profile, bundle.clone());
		session.revision_info = self.cache.revision_info(&*self.catalog, bundle).await;
		session.collection_info = self.cache.collection_info(&*self.catalog, bundle).await;
		self.session = Some(session);
		self.install_done = false;
		self.frontend.driver_updated();
		Ok(())
	}

	/// Begins a real installation session for `bundle` in `profile`.
	///
	/// Rejected with [`Error::SessionActive`] while another session is in
	/// progress; the existing session is left completely untouched.
	pub async fn start(&mut self, profile: ProfileId, bundle: &Bundle) -> Result<()> {
		self.flush_pending().await;

		if self.session_active() {
			log::warn!("start for {} rejected, a session is already active", bundle.id);
			return Err(Error::SessionActive);
		}
		if self.session.is_some() {
			self.teardown();
		}

		log::info!("starting bundle session for {} in profile {}", bundle.id, profile);
		self.session = Some(Session::new(profile, bundle.clone()));
		self.install_done = false;

		if let Err(e) = self.start_install().await {
			if !e.is_cancellation() {
				self.frontend.notify(Notification::error(
					"Bundle installation failed",
					format!("{}: {e}", bundle.name),
				));
			}
			self.teardown();
			return Err(e);
		}
		Ok(())
	}

	/// The main preparation sequence, shared by `start` and the
	/// `query -> start` advance.
	async fn start_install(&mut self) -> Result<()> {
		let Some(bundle) = self.session.as_ref().map(|s| s.bundle.clone()) else { return Ok(()) };
		let Some(profile) = self.session.as_ref().map(|s| s.profile.clone()) else { return Ok(()) };

		/* 1. Resolve revision metadata, falling back to the embedded copy. */
		let revision_info = self.cache.revision_info(&*self.catalog, &bundle).await;
		let collection_info = self.cache.collection_info(&*self.catalog, &bundle).await;

		/* 2. Register a pending vote unless the user authored the bundle. */
		if let Some(info) = &revision_info {
			let authored = bundle.author_id.is_some() && bundle.author_id == self.catalog.current_user();
			if !authored {
				self.store.register_pending_vote(&info.id);
			}
		}

		/* 3. Game version gate. Declining ends the session with no installs. */
		if !self.confirm_game_version(&bundle).await? {
			log::info!("game version mismatch declined, ending session for {}", bundle.id);
			self.teardown();
			return Ok(());
		}

		/* 4. Recompute required rules, skipping already-fulfilled ones. */
		let required = outstanding_rules(&*self.store, &profile, &bundle.rules).await?;
		self.store.enable_package(&profile, &bundle.id);

		/* 5. Bake resolved filenames into catalog-referencing rules. */
		if let Some(info) = &revision_info {
			let mutations = filename_mutations(&bundle, info);
			if !mutations.is_empty() {
				self.store.apply_rule_mutations(&bundle.id, mutations);
			}
		}

		if let Some(s) = self.session.as_mut() {
			log::debug!("session for {} prepared, {} rules outstanding", bundle.id, required.len());
			s.revision_info = revision_info;
			s.collection_info = collection_info;
			s.required_rules = required;
			s.phase = Phase::Start;
		}
		self.update_progress();
		self.frontend.driver_updated();
		Ok(())
	}

	pub fn can_continue(&self) -> bool {
		match &self.session {
			None => false,
			Some(s) => match s.phase {
				Phase::Installing => self.install_done,
				Phase::Disclaimer => !s.installed_packages.is_empty() || self.install_done,
				_ => true,
			},
		}
	}

	/// The single externally-driven advance operation. A no-op when
	/// [`InstallDriver::can_continue`] does not hold.
	pub async fn continue_(&mut self) -> Result<()> {
		if !self.can_continue() {
			log::debug!("continue ignored in phase {:?}", self.phase());
			return Ok(());
		}
		match self.phase() {
			Phase::Prepare => {}
			Phase::Query => self.start_install().await?,
			Phase::Start => self.begin(),
			Phase::Disclaimer => self.close_disclaimers(),
			Phase::Installing | Phase::Recommendations => self.finish_installing().await?,
			Phase::Review => self.close(),
		}
		Ok(())
	}

	/// Emits the begin-dependency-install signal and moves into `Installing`,
	/// or `Disclaimer` first when any rule carries instructions to show.
	fn begin(&mut self) {
		let Some(s) = self.session.as_mut() else { return };
		self.frontend.begin_dependency_install(&s.profile, &s.bundle.game_id, &[s.bundle.id.clone()], false);

		let has_instructions = s.bundle.rules.iter().any(|r| !r.ignored && r.extra.instructions.is_some());
		s.phase = if has_instructions { Phase::Disclaimer } else { Phase::Installing };
		log::debug!("session for {} entering {:?}", s.bundle.id, s.phase);
		self.install_done = s.required_rules.is_empty();
		self.frontend.driver_updated();
	}

	fn close_disclaimers(&mut self) {
		let Some(s) = self.session.as_mut() else { return };
		s.phase = Phase::Installing;
		log::debug!("session for {} entering Installing", s.bundle.id);
		self.frontend.driver_updated();
	}

	/// Fetches fresh metadata and enters review.
	async fn finish_installing(&mut self) -> Result<()> {
		let Some(bundle) = self.session.as_ref().map(|s| s.bundle.clone()) else { return Ok(()) };
		let fresh = self.cache.refresh_revision(&*self.catalog, &bundle).await;
		if let Some(s) = self.session.as_mut() {
			if fresh.is_some() {
				s.revision_info = fresh;
			}
			s.phase = Phase::Review;
			log::debug!("session for {} entering Review", s.bundle.id);
		}
		self.install_done = true;
		self.frontend.view_bundle(&bundle.id);
		self.frontend.driver_updated();
		Ok(())
	}

	fn close(&mut self) {
		self.teardown();
	}

	/// Unconditional teardown, safe from any phase including mid-await of an
	/// external operation; later events for the dead session become no-ops.
	pub fn cancel(&mut self) {
		log::info!("bundle session cancelled");
		self.teardown();
	}

	fn teardown(&mut self) {
		if let Some(s) = self.session.take() {
			self.frontend.dismiss(&progress_notification_id(&s.bundle.id));
			log::debug!("session for {} torn down", s.bundle.id);
		}
		self.install_done = true;
		self.frontend.driver_updated();
	}

	/* Inbound external events. */

	/// The install subsystem started unpacking an archive.
	pub fn on_install_began(&mut self, game: &GameId, archive: &ArchiveId) {
		let Some(s) = self.session.as_mut() else { return };
		if s.bundle.game_id != *game {
			return;
		}
		s.installing_archive = Some(archive.clone());
		self.frontend.driver_updated();
	}

	/// A package finished installing. Records it when it satisfies a required
	/// rule and triggers binary patch application when the rule carries one.
	pub async fn on_package_installed(&mut self, game: &GameId, package: &PackageId) {
		let Some(profile) = self
			.session
			.as_ref()
			.filter(|s| s.bundle.game_id == *game)
			.map(|s| s.profile.clone())
		else {
			return;
		};

		let installed = self.store.installed_packages(&profile);
		let Some(candidate) = installed.iter().find(|p| p.id == *package) else { return };

		let rule = self
			.session
			.as_ref()
			.and_then(|s| s.required_rules.iter().find(|r| r.reference.matches(candidate)).cloned());
		let Some(rule) = rule else { return };

		if let Some(s) = self.session.as_mut() {
			if !s.installed_packages.contains(package) {
				s.installed_packages.push(package.clone());
			}
			s.installing_archive = None;
		}

		if let Some(patches) = &rule.extra.patches {
			if let Err(e) = self.store.apply_patch(package, patches).await {
				log::warn!("patch application for {package} failed: {e}");
			}
		}

		self.update_progress();
		self.frontend.driver_updated();
	}

	/// A download finished. Recomputing unconditionally is cheaper than
	/// checking whether the download was relevant.
	pub fn on_download_finished(&mut self) {
		if self.session.is_some() {
			self.update_progress();
			self.frontend.driver_updated();
		}
	}

	/// A dependency install batch finished for `bundle`, either the required or
	/// the optional/recommended pass.
	pub async fn on_dependencies_finished(
		&mut self,
		profile: &ProfileId,
		bundle: &PackageId,
		optional_pass: bool,
	) -> Result<()> {
		let Some((session_profile, session_bundle, phase)) = self
			.session
			.as_ref()
			.filter(|s| s.profile == *profile && s.bundle.id == *bundle)
			.map(|s| (s.profile.clone(), s.bundle.clone(), s.phase))
		else {
			return Ok(());
		};

		let outstanding = outstanding_rules(&*self.store, &session_profile, &session_bundle.rules).await?;
		if let Some(s) = self.session.as_mut() {
			s.required_rules = outstanding.clone();
		}

		if outstanding.is_empty() {
			let wants_recommendations =
				!optional_pass && phase == Phase::Installing && session_bundle.has_recommendations();
			if wants_recommendations {
				if let Some(s) = self.session.as_mut() {
					s.phase = Phase::Recommendations;
					log::debug!("session for {} entering Recommendations", s.bundle.id);
				}
				self.install_done = true;
				self.frontend.begin_dependency_install(
					&session_profile,
					&session_bundle.game_id,
					&[session_bundle.id.clone()],
					true,
				);
				self.frontend.driver_updated();
			} else {
				self.finish_installing().await?;
			}
		} else if optional_pass {
			/* Optional leftovers never block, the session just ends. */
			log::info!(
				"optional pass left {} rules unresolved, closing session for {}",
				outstanding.len(),
				session_bundle.id
			);
			self.teardown();
		} else {
			/* Required pass with leftovers: done, but the caller must still
			acknowledge via continue(). */
			log::warn!(
				"required pass finished with {} rules unresolved for {}",
				outstanding.len(),
				session_bundle.id
			);
			self.install_done = true;
			self.frontend.driver_updated();
		}
		Ok(())
	}

	/// A dependency install began outside any session we own, e.g. recursively
	/// triggered optional dependencies. Adopt it so it is still tracked.
	pub async fn on_dependency_install_started(
		&mut self,
		profile: &ProfileId,
		bundle: &PackageId,
		optional_pass: bool,
	) -> Result<()> {
		if self.session.is_some() {
			return Ok(());
		}
		let Some(definition) = self.store.bundle_definition(bundle) else { return Ok(()) };

		log::info!(
			"adopting {} dependency install session for {bundle}",
			if optional_pass { "optional" } else { "required" }
		);
		let mut session = Session::new(profile.clone(), definition);
		session.phase = Phase::Installing;
		session.required_rules = outstanding_rules(&*self.store, profile, &session.bundle.rules).await?;
		self.install_done = session.required_rules.is_empty();
		self.session = Some(session);
		self.update_progress();
		self.frontend.driver_updated();
		Ok(())
	}

	/* Internals */

	async fn confirm_game_version(&self, bundle: &Bundle) -> Result<bool> {
		if bundle.game_versions.is_empty() {
			return Ok(true);
		}
		let Some(current) = self.store.installed_game_version(&bundle.game_id) else { return Ok(true) };
		if bundle.game_versions.iter().any(|v| *v == current) {
			return Ok(true);
		}

		let action = self
			.frontend
			.confirm(ConfirmRequest {
				title: "Game version mismatch".to_owned(),
				message: format!(
					"{} was created for game version(s) {} but {} is installed.",
					bundle.name,
					bundle.game_versions.join(", "),
					current
				),
				actions: vec![ConfirmAction::Continue, ConfirmAction::Cancel],
			})
			.await?;
		Ok(action == ConfirmAction::Continue)
	}

	fn update_progress(&self) {
		let Some(s) = self.session.as_ref() else { return };
		let installed = self.store.installed_packages(&s.profile);
		let downloads = self.downloads.pending_downloads();
		let entries = progress::snapshot(&s.bundle.rules, &installed, &downloads);
		let percent = progress::progress(&entries, s.total_size);
		log::trace!("session progress for {}: {percent}%", s.bundle.id);
		self.frontend.notify(Notification::activity(
			progress_notification_id(&s.bundle.id),
			format!("Installing {}", s.bundle.name),
			format!("{percent}% complete"),
		));
	}
}

/// Required rules that are still missing or unfulfilled.
///
/// A rule with a matching installed package is only skipped outright when it
/// carries no file manifest and no installer choices; otherwise the candidate
/// has to pass the fulfillment check.
async fn outstanding_rules(
	store: &dyn PackageStore,
	profile: &ProfileId,
	rules: &[DependencyRule],
) -> Result<Vec<DependencyRule>> {
	let installed = store.installed_packages(profile);
	let mut outstanding = Vec::new();
	for rule in rules.iter().filter(|r| r.is_required()) {
		match installed.iter().find(|p| rule.reference.matches(*p)) {
			Some(candidate) if rule.needs_fulfillment_check() => {
				if !fulfillment::is_fulfilled(rule, candidate).await? {
					outstanding.push(rule.clone());
				}
			}
			Some(_) => {}
			None => outstanding.push(rule.clone()),
		}
	}
	Ok(outstanding)
}

/// Remove+add batches baking the catalog-resolved filename into every rule
/// that references a repo file and has none recorded yet.
fn filename_mutations(bundle: &Bundle, info: &RevisionInfo) -> Vec<RuleMutation> {
	let mut mutations = Vec::new();
	for rule in &bundle.rules {
		let Some(repo) = &rule.reference.repo else { continue };
		if rule.extra.file_name.is_some() {
			continue;
		}
		if let Some(file) = info.files.iter().find(|f| f.file_id == repo.file_id) {
			let mut updated = rule.clone();
			updated.extra.file_name = Some(file.name.clone());
			mutations.push(RuleMutation::Remove(rule.clone()));
			mutations.push(RuleMutation::Add(updated));
		}
	}
	mutations
}
