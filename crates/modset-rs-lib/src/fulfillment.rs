//! Decides whether an already-installed package satisfies a dependency rule so
//! the rule can be skipped without re-downloading.

use std::collections::HashMap;
use std::path::Path;
use std::path::PathBuf;

use crate::bundle::DependencyRule;
use crate::host::InstalledPackage;
use crate::Error;
use crate::Result;

/// Checks whether `candidate` already fulfills `rule`.
///
/// Without a file manifest fulfillment reduces to the candidate existing at
/// all. With one, every file under the candidate's install root is hashed and
/// the resulting set must equal the manifest exactly: same paths, same hashes,
/// no extras, no omissions. Installer choices, when the rule declares them,
/// must also match exactly; a mismatch forces reinstallation even when the
/// files are identical.
pub async fn is_fulfilled(rule: &DependencyRule, candidate: &InstalledPackage) -> Result<bool> {
	if let Some(expected) = &rule.extra.installer_choices {
		if candidate.installer_choices.as_ref() != Some(expected) {
			log::debug!("package {} not fulfilled: installer choices differ", candidate.id);
			return Ok(false);
		}
	}

	let manifest = match &rule.extra.file_list {
		Some(list) if !list.is_empty() => list,
		/* No manifest: a matching package existing is enough. */
		_ => return Ok(true),
	};

	let expected: HashMap<String, String> = manifest
		.iter()
		.map(|entry| (normalize_path(&entry.path), entry.hash.to_lowercase()))
		.collect();

	let root: PathBuf = candidate.install_root.clone();
	let actual = tokio::task::spawn_blocking(move || hash_tree(&root))
		.await
		.map_err(|e| Error::Other(format!("hashing task failed: {e}")))??;

	if actual != expected {
		log::debug!(
			"package {} not fulfilled: {} files on disk vs {} in manifest",
			candidate.id,
			actual.len(),
			expected.len()
		);
		return Ok(false);
	}

	Ok(true)
}

/// Hashes every file under `root`, keyed by `/`-separated relative path.
fn hash_tree(root: &Path) -> Result<HashMap<String, String>> {
	let mut hashes = HashMap::new();
	for entry in walkdir::WalkDir::new(root) {
		let entry = entry.map_err(std::io::Error::from)?;
		if !entry.file_type().is_file() {
			continue;
		}
		let relative = entry.path().strip_prefix(root).unwrap_or_else(|_| entry.path());
		let digest = sha256::try_digest(entry.path())?;
		hashes.insert(normalize_path(&relative.to_string_lossy()), digest);
	}
	Ok(hashes)
}

fn normalize_path(path: &str) -> String {
	path.replace('\\', "/")
}
