// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local override layer.
//!
//! Overrides replace resolved values for development and testing. A
//! whole-flag override short-circuits the lookup entirely (no cache, no
//! apply delivery); a field override replaces a single leaf while sibling
//! fields keep their resolved values. Rules are append-only and the most
//! recently registered rule for a target wins.

use std::collections::BTreeMap;

use beacon_flags_core::{FlagPath, Result, StructuredValue};

/// One local override directive.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideRule {
	/// Replaces the entire flag.
	Flag {
		name: String,
		variant: String,
		value: StructuredValue,
	},
	/// Replaces one leaf under a flag, named by its full dotted path.
	Field {
		path: String,
		variant: String,
		value: StructuredValue,
	},
}

impl OverrideRule {
	pub fn flag(
		name: impl Into<String>,
		variant: impl Into<String>,
		value: StructuredValue,
	) -> Self {
		Self::Flag {
			name: name.into(),
			variant: variant.into(),
			value,
		}
	}

	pub fn field(
		path: impl Into<String>,
		variant: impl Into<String>,
		value: StructuredValue,
	) -> Self {
		Self::Field {
			path: path.into(),
			variant: variant.into(),
			value,
		}
	}
}

/// A full override match: the evaluation is served from `root` without
/// consulting the cache.
#[derive(Debug, Clone)]
pub struct FullMatch {
	pub root: StructuredValue,
	/// Remaining path to navigate within `root`.
	pub remainder: Vec<String>,
	pub variant: String,
}

/// A field override parsed for merging, scoped under its flag.
#[derive(Debug, Clone)]
pub struct FieldOverride {
	/// Path segments below the flag name.
	pub path: Vec<String>,
	pub variant: String,
	pub value: StructuredValue,
}

/// Append-only list of override rules.
#[derive(Debug, Default)]
pub struct OverrideRegistry {
	rules: Vec<(FlagPath, OverrideRule)>,
}

impl OverrideRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers a rule. Field paths are validated as dotted keys.
	pub fn register(&mut self, rule: OverrideRule) -> Result<()> {
		let target = match &rule {
			OverrideRule::Flag { name, .. } => FlagPath {
				flag: name.clone(),
				path: Vec::new(),
			},
			OverrideRule::Field { path, .. } => FlagPath::parse(path)?,
		};
		self.rules.push((target, rule));
		Ok(())
	}

	pub fn is_empty(&self) -> bool {
		self.rules.is_empty()
	}

	/// The most recent rule that fully covers the requested path: a flag
	/// rule for its flag, or a field rule at exactly the requested path.
	pub fn full_match(&self, requested: &FlagPath) -> Option<FullMatch> {
		for (target, rule) in self.rules.iter().rev() {
			match rule {
				OverrideRule::Flag { name, variant, value } if name == &requested.flag => {
					return Some(FullMatch {
						root: value.clone(),
						remainder: requested.path.clone(),
						variant: variant.clone(),
					});
				}
				OverrideRule::Field { variant, value, .. }
					if target.flag == requested.flag && target.path == requested.path =>
				{
					return Some(FullMatch {
						root: value.clone(),
						remainder: Vec::new(),
						variant: variant.clone(),
					});
				}
				_ => {}
			}
		}
		None
	}

	/// Field rules under `flag` in registration order; merging them oldest
	/// first makes the most recent rule win for a contested path.
	pub fn field_overrides(&self, flag: &str) -> Vec<FieldOverride> {
		self.rules
			.iter()
			.filter_map(|(target, rule)| match rule {
				OverrideRule::Field { variant, value, .. } if target.flag == flag => {
					Some(FieldOverride {
						path: target.path.clone(),
						variant: variant.clone(),
						value: value.clone(),
					})
				}
				_ => None,
			})
			.collect()
	}
}

/// Writes `value` at `path` inside `root`, creating intermediate structs
/// and replacing non-struct intermediates as needed.
pub fn set_at_path(root: &mut StructuredValue, path: &[String], value: StructuredValue) {
	let Some((head, rest)) = path.split_first() else {
		*root = value;
		return;
	};

	if !matches!(root, StructuredValue::Struct(_)) {
		*root = StructuredValue::Struct(BTreeMap::new());
	}
	if let StructuredValue::Struct(fields) = root {
		let entry = fields
			.entry(head.clone())
			.or_insert(StructuredValue::Null);
		set_at_path(entry, rest, value);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn registry(rules: Vec<OverrideRule>) -> OverrideRegistry {
		let mut registry = OverrideRegistry::new();
		for rule in rules {
			registry.register(rule).unwrap();
		}
		registry
	}

	#[test]
	fn flag_rule_matches_any_path_under_its_flag() {
		let registry = registry(vec![OverrideRule::flag(
			"flag",
			"control",
			StructuredValue::from([("size", StructuredValue::Int(4))]),
		)]);

		let matched = registry
			.full_match(&FlagPath::parse("flag.size").unwrap())
			.unwrap();
		assert_eq!(matched.variant, "control");
		assert_eq!(matched.remainder, vec!["size".to_string()]);

		assert!(registry
			.full_match(&FlagPath::parse("other.size").unwrap())
			.is_none());
	}

	#[test]
	fn field_rule_matches_only_its_exact_path() {
		let registry = registry(vec![OverrideRule::field(
			"flag.size",
			"treatment",
			StructuredValue::Int(4),
		)]);

		let matched = registry
			.full_match(&FlagPath::parse("flag.size").unwrap())
			.unwrap();
		assert_eq!(matched.variant, "treatment");
		assert_eq!(matched.root, StructuredValue::Int(4));
		assert!(matched.remainder.is_empty());

		assert!(registry
			.full_match(&FlagPath::parse("flag.color").unwrap())
			.is_none());
		assert!(registry
			.full_match(&FlagPath::parse("flag").unwrap())
			.is_none());
	}

	#[test]
	fn most_recent_rule_for_a_path_wins() {
		let registry = registry(vec![
			OverrideRule::field("flag.size", "control", StructuredValue::Int(4)),
			OverrideRule::field("flag.size", "treatment", StructuredValue::Int(5)),
		]);

		let matched = registry
			.full_match(&FlagPath::parse("flag.size").unwrap())
			.unwrap();
		assert_eq!(matched.variant, "treatment");
		assert_eq!(matched.root, StructuredValue::Int(5));
	}

	#[test]
	fn later_flag_rule_shadows_earlier_field_rule() {
		let registry = registry(vec![
			OverrideRule::field("flag.size", "treatment", StructuredValue::Int(5)),
			OverrideRule::flag(
				"flag",
				"control",
				StructuredValue::from([("size", StructuredValue::Int(4))]),
			),
		]);

		let matched = registry
			.full_match(&FlagPath::parse("flag.size").unwrap())
			.unwrap();
		assert_eq!(matched.variant, "control");
	}

	#[test]
	fn register_rejects_invalid_field_paths() {
		let mut registry = OverrideRegistry::new();
		assert!(registry
			.register(OverrideRule::field("", "v", StructuredValue::Int(1)))
			.is_err());
		assert!(registry
			.register(OverrideRule::field("flag..x", "v", StructuredValue::Int(1)))
			.is_err());
	}

	#[test]
	fn field_overrides_are_scoped_to_the_flag() {
		let registry = registry(vec![
			OverrideRule::field("flag.size", "t", StructuredValue::Int(4)),
			OverrideRule::field("other.size", "t", StructuredValue::Int(9)),
		]);

		let overrides = registry.field_overrides("flag");
		assert_eq!(overrides.len(), 1);
		assert_eq!(overrides[0].path, vec!["size".to_string()]);
	}

	#[test]
	fn set_at_path_preserves_siblings() {
		let mut root = StructuredValue::from([
			("size", StructuredValue::Int(3)),
			("color", StructuredValue::from("green")),
		]);

		set_at_path(
			&mut root,
			&["size".to_string()],
			StructuredValue::Int(4),
		);

		assert_eq!(
			root,
			StructuredValue::from([
				("size", StructuredValue::Int(4)),
				("color", StructuredValue::from("green")),
			])
		);
	}

	#[test]
	fn set_at_path_creates_missing_intermediates() {
		let mut root = StructuredValue::from([("size", StructuredValue::Int(3))]);

		set_at_path(
			&mut root,
			&["nested".to_string(), "inner".to_string()],
			StructuredValue::Bool(true),
		);

		assert_eq!(
			root,
			StructuredValue::from([
				("size", StructuredValue::Int(3)),
				(
					"nested",
					StructuredValue::from([("inner", StructuredValue::Bool(true))])
				),
			])
		);
	}

	#[test]
	fn set_at_path_replaces_non_struct_intermediates() {
		let mut root = StructuredValue::from([("size", StructuredValue::Int(3))]);

		set_at_path(
			&mut root,
			&["size".to_string(), "inner".to_string()],
			StructuredValue::Int(7),
		);

		assert_eq!(
			root,
			StructuredValue::from([(
				"size",
				StructuredValue::from([("inner", StructuredValue::Int(7))])
			)])
		);
	}
}
