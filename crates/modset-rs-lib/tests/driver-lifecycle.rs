//! Driver state machine scenarios against the recording mock host.

use std::sync::Arc;

use modset_rs::bundle::*;
use modset_rs::host::*;
use modset_rs::InstallDriver;
use modset_rs::ModsetOptions;
use modset_rs::Phase;
use modset_rs_test_utils::bundle;
use modset_rs_test_utils::installed;
use modset_rs_test_utils::recommends;
use modset_rs_test_utils::requires;
use modset_rs_test_utils::Emitted;
use modset_rs_test_utils::MockHost;

fn options(tmp: &tempfile::TempDir) -> ModsetOptions {
	let mut options = ModsetOptions::default();
	assert!(options.set_cache_dir(tmp.path().to_path_buf()));
	options
}

fn driver_for(host: &Arc<MockHost>, options: &ModsetOptions) -> InstallDriver {
	InstallDriver::new(host.clone(), host.clone(), host.clone(), host.clone(), options)
}

fn profile() -> ProfileId {
	ProfileId::from("default")
}

/// Bundle B requires A (installed, manifest match) and C (missing) and
/// recommends D (missing): only C must end up required, and exactly one
/// begin-dependency-install signal fires once continue reaches installing.
#[tokio::test]
async fn start_computes_required_rules_and_emits_one_begin_signal() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());

	/* A's install root holds exactly the manifest's file. */
	let a_root = tmp.path().join("package-a");
	std::fs::create_dir_all(&a_root).expect("create a_root");
	std::fs::write(a_root.join("a.esp"), b"plugin a").expect("write a.esp");
	let a_hash = sha256::try_digest(a_root.join("a.esp").as_path()).expect("digest");

	let mut rule_a = requires("A", 100);
	rule_a.extra.file_list = Some(vec![FileManifestEntry { path: "a.esp".to_owned(), hash: a_hash }]);
	let rule_c = requires("C", 300);
	let rule_d = recommends("D");

	let mut a = installed("a", "A");
	a.install_root = a_root;
	host.add_installed(a);

	let b = bundle("B", "game", vec![rule_a, rule_c.clone(), rule_d]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");

	assert_eq!(driver.phase(), Phase::Start);
	let session = driver.session().expect("session");
	assert_eq!(session.required_rules, vec![rule_c]);
	assert_eq!(session.total_size, 400);
	assert!(host.emitted().contains(&Emitted::EnablePackage { profile: profile(), package: b.id.clone() }));
	assert!(host.begin_install_signals().is_empty());

	driver.continue_().await.expect("continue");

	assert_eq!(driver.phase(), Phase::Installing);
	let signals = host.begin_install_signals();
	assert_eq!(signals.len(), 1);
	assert_eq!(
		signals[0],
		Emitted::BeginDependencyInstall {
			profile: profile(),
			game: b.game_id.clone(),
			bundles: vec![b.id.clone()],
			optional: false,
		}
	);
}

#[tokio::test]
async fn second_start_is_rejected_and_leaves_the_session_untouched() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	let other = bundle("Other", "game", vec![requires("E", 10)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	driver.continue_().await.expect("continue");
	let signals_before = host.begin_install_signals().len();

	let result = driver.start(ProfileId::from("other-profile"), &other).await;
	assert!(matches!(result, Err(modset_rs::Error::SessionActive)));

	let session = driver.session().expect("session survives");
	assert_eq!(session.bundle.id, b.id);
	assert_eq!(session.profile, profile());
	assert_eq!(driver.phase(), Phase::Installing);
	assert_eq!(host.begin_install_signals().len(), signals_before);
}

#[tokio::test]
async fn continue_is_a_noop_while_installing_is_unfinished() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	driver.continue_().await.expect("continue");
	assert_eq!(driver.phase(), Phase::Installing);
	assert!(!driver.can_continue());

	let emitted_before = host.emitted().len();
	driver.continue_().await.expect("noop continue");
	assert_eq!(driver.phase(), Phase::Installing);
	assert_eq!(host.emitted().len(), emitted_before);
}

#[tokio::test]
async fn finished_dependency_pass_advances_through_recommendations_to_review() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300), recommends("D")]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	driver.continue_().await.expect("continue");
	assert_eq!(driver.phase(), Phase::Installing);

	/* The external installer produced C and reports the required pass done. */
	host.add_installed(installed("c", "C"));
	driver.on_package_installed(&b.game_id, &PackageId::from("c")).await;
	assert_eq!(driver.session().expect("session").installed_packages, vec![PackageId::from("c")]);

	driver.on_dependencies_finished(&profile(), &b.id, false).await.expect("deps finished");
	assert_eq!(driver.phase(), Phase::Recommendations);
	let signals = host.begin_install_signals();
	assert_eq!(signals.len(), 2);
	assert!(matches!(&signals[1], Emitted::BeginDependencyInstall { optional: true, .. }));

	/* Optional pass ends; D never arrived but recommendations don't block. */
	driver.on_dependencies_finished(&profile(), &b.id, true).await.expect("optional finished");
	assert_eq!(driver.phase(), Phase::Review);
	assert!(driver.install_done());
	assert!(host.emitted().contains(&Emitted::ViewBundle(b.id.clone())));

	driver.continue_().await.expect("close");
	assert_eq!(driver.phase(), Phase::Prepare);
	assert!(driver.install_done());
	assert!(driver.session().is_none());

	/* Further continues stay put. */
	driver.continue_().await.expect("idle continue");
	assert_eq!(driver.phase(), Phase::Prepare);
}

#[tokio::test]
async fn required_pass_with_leftovers_is_done_but_stays_in_installing() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	driver.continue_().await.expect("continue");

	/* C never got installed but the batch reports itself finished. */
	driver.on_dependencies_finished(&profile(), &b.id, false).await.expect("deps finished");
	assert_eq!(driver.phase(), Phase::Installing);
	assert!(driver.install_done());
	assert!(driver.can_continue());

	driver.continue_().await.expect("acknowledge");
	assert_eq!(driver.phase(), Phase::Review);
}

#[tokio::test]
async fn version_mismatch_cancel_ends_the_session_with_no_installs() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	host.set_game_version(GameId::from("game"), "2.0.0");
	host.push_confirm_answer(ConfirmAction::Cancel);

	let mut b = bundle("B", "game", vec![requires("C", 300)]);
	b.game_versions = vec!["1.0.0".to_owned()];
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");

	assert_eq!(driver.phase(), Phase::Prepare);
	assert!(driver.install_done());
	assert!(driver.session().is_none());
	assert!(host.begin_install_signals().is_empty());
	assert_eq!(host.confirms_seen(), vec!["Game version mismatch".to_owned()]);
}

#[tokio::test]
async fn matching_game_version_does_not_prompt() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	host.set_game_version(GameId::from("game"), "1.0.0");

	let mut b = bundle("B", "game", vec![requires("C", 300)]);
	b.game_versions = vec!["1.0.0".to_owned()];
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	assert_eq!(driver.phase(), Phase::Start);
	assert!(host.confirms_seen().is_empty());
}

#[tokio::test]
async fn query_previews_without_dispatching_and_continue_starts() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.query(profile(), &b).await.expect("query");
	assert_eq!(driver.phase(), Phase::Query);
	assert!(host.begin_install_signals().is_empty());
	assert!(host.emitted().iter().all(|e| !matches!(e, Emitted::EnablePackage { .. })));

	driver.continue_().await.expect("continue");
	assert_eq!(driver.phase(), Phase::Start);
}

#[tokio::test]
async fn published_bundle_registers_vote_and_bakes_filenames() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());

	let mut rule = requires("CoolMod", 100);
	rule.reference.repo = Some(RepoRef { mod_id: "7".to_owned(), file_id: "99".to_owned() });
	let mut b = bundle("B", "game", vec![rule]);
	b.slug = Some("pack".to_owned());
	b.revision_number = Some(3);

	host.add_revision(RevisionInfo {
		id: RevisionId::from("rev-3"),
		revision_number: 3,
		collection_slug: "pack".to_owned(),
		game_versions: vec![],
		files: vec![RevisionFileInfo {
			file_id: "99".to_owned(),
			name: "CoolMod-1.2.zip".to_owned(),
			owner: None,
			hash: None,
			size: Some(100),
		}],
		rating: None,
	});

	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);
	driver.start(profile(), &b).await.expect("start");

	assert!(host.emitted().contains(&Emitted::PendingVote(RevisionId::from("rev-3"))));

	let baked = host.emitted().into_iter().find_map(|e| match e {
		Emitted::RuleMutations { bundle, mutations } if bundle == b.id => Some(mutations),
		_ => None,
	});
	let mutations = baked.expect("rule mutations dispatched");
	assert_eq!(mutations.len(), 2);
	assert!(matches!(&mutations[0], RuleMutation::Remove(_)));
	match &mutations[1] {
		RuleMutation::Add(rule) => assert_eq!(rule.extra.file_name.as_deref(), Some("CoolMod-1.2.zip")),
		other => panic!("expected an add mutation, got {other:?}"),
	}
}

#[tokio::test]
async fn embedded_revision_is_used_when_the_fetch_fails() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());

	let mut b = bundle("B", "game", vec![requires("C", 300)]);
	b.slug = Some("pack".to_owned());
	b.revision_number = Some(4);
	/* Nothing registered in the catalog, only the embedded copy exists. */
	b.embedded_revision = Some(RevisionInfo {
		id: RevisionId::from("embedded-4"),
		revision_number: 4,
		collection_slug: "pack".to_owned(),
		game_versions: vec![],
		files: vec![],
		rating: None,
	});

	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);
	driver.start(profile(), &b).await.expect("start");

	assert!(host.emitted().contains(&Emitted::PendingVote(RevisionId::from("embedded-4"))));
	assert_eq!(
		driver.session().expect("session").revision_info.as_ref().map(|i| i.id.clone()),
		Some(RevisionId::from("embedded-4"))
	);
}

#[tokio::test]
async fn progress_reflects_partial_downloads() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 100)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	assert_eq!(driver.progress(), 0);

	host.add_download(PendingDownload {
		archive_id: ArchiveId::from("dl-c"),
		logical_name: Some("C".to_owned()),
		repo: None,
		content_hash: None,
		received_bytes: 50,
		total_bytes: Some(100),
		state: DownloadState::Downloading,
	});
	driver.on_download_finished();
	assert_eq!(driver.progress(), 25);

	host.add_installed(installed("c", "C"));
	assert_eq!(driver.progress(), 100);
}

#[tokio::test]
async fn cancel_tears_down_from_any_phase_and_dismisses_progress() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.start(profile(), &b).await.expect("start");
	driver.continue_().await.expect("continue");
	driver.cancel();

	assert_eq!(driver.phase(), Phase::Prepare);
	assert!(driver.install_done());
	assert!(host
		.emitted()
		.contains(&Emitted::Dismiss(modset_rs::driver::progress_notification_id(&b.id))));

	/* Events for the dead session are no-ops. */
	driver.on_download_finished();
	driver.on_package_installed(&b.game_id, &PackageId::from("c")).await;
	assert_eq!(driver.phase(), Phase::Prepare);
}

#[tokio::test]
async fn unowned_dependency_install_is_adopted() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	host.add_bundle_definition(b.clone());

	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	driver.on_dependency_install_started(&profile(), &b.id, true).await.expect("adopt");
	assert_eq!(driver.phase(), Phase::Installing);
	assert_eq!(driver.session().expect("session").bundle.id, b.id);

	/* With a session owned, the same signal is ignored. */
	let other = bundle("Other", "game", vec![]);
	host.add_bundle_definition(other.clone());
	driver.on_dependency_install_started(&profile(), &other.id, true).await.expect("ignored");
	assert_eq!(driver.session().expect("session").bundle.id, b.id);
}

#[tokio::test]
async fn prepared_operations_run_before_the_next_entry_point() {
	let tmp = tempfile::tempdir().expect("tempdir");
	let host = Arc::new(MockHost::new());
	let b = bundle("B", "game", vec![requires("C", 300)]);
	let options = options(&tmp);
	let mut driver = driver_for(&host, &options);

	let host_for_prep = host.clone();
	driver.prepare(async move {
		host_for_prep.add_installed(installed("c", "C"));
	});

	/* The queued preparation installed C, so start must observe it. */
	driver.start(profile(), &b).await.expect("start");
	assert!(driver.session().expect("session").required_rules.is_empty());
}
