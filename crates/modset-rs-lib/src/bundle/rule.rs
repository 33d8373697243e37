//! Dependency rules attached to a bundle.
//!
//! Rules are immutable value records. The driver never mutates a rule in place;
//! updates are expressed as remove+add [`crate::host::RuleMutation`] batches
//! dispatched to the package store.

use serde::*;

use super::reference::PackageReference;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RuleType {
	#[default] Requires,
	Recommends,
	Other,
}

/// One expected file inside a package's install root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileManifestEntry {
	/// Path relative to the install root, `/`-separated.
	pub path: String,
	/// Hex sha256 of the file contents.
	pub hash: String,
}

/// Per-entry configuration carried alongside a rule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleExtra {
	pub file_list: Option<Vec<FileManifestEntry>>,
	/// Free-form instructions shown to the user before installation.
	pub instructions: Option<String>,
	/// Installer options the curator chose; a candidate with different recorded
	/// choices is reinstalled even when its files match.
	pub installer_choices: Option<serde_json::Value>,
	/// Binary patches applied by an external collaborator after install.
	pub patches: Option<serde_json::Value>,
	/// Concrete filename resolved from catalog metadata, baked in by the driver.
	pub file_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyRule {
	pub rule_type: RuleType,
	pub reference: PackageReference,
	pub extra: RuleExtra,
	pub ignored: bool,
}

impl DependencyRule {
	pub fn is_required(&self) -> bool {
		self.rule_type == RuleType::Requires && !self.ignored
	}

	/// True only when the rule declares a manifest with at least one entry.
	pub fn has_file_manifest(&self) -> bool {
		self.extra.file_list.as_ref().map(|l| !l.is_empty()).unwrap_or(false)
	}

	/// Whether a matching installed package still needs a fulfillment check
	/// before the rule can be skipped.
	pub fn needs_fulfillment_check(&self) -> bool {
		self.has_file_manifest() || self.extra.installer_choices.is_some()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_file_list_is_not_a_manifest() {
		let mut rule = DependencyRule::default();
		assert!(!rule.has_file_manifest());

		rule.extra.file_list = Some(vec![]);
		assert!(!rule.has_file_manifest());

		rule.extra.file_list = Some(vec![FileManifestEntry {
			path: "textures/a.dds".to_owned(),
			hash: "00".to_owned(),
		}]);
		assert!(rule.has_file_manifest());
	}

	#[test]
	fn ignored_rules_are_never_required() {
		let rule = DependencyRule { ignored: true, ..Default::default() };
		assert!(!rule.is_required());

		let rule = DependencyRule { rule_type: RuleType::Recommends, ..Default::default() };
		assert!(!rule.is_required());
	}
}
