// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Dotted-path navigation into structured flag values.
//!
//! An evaluation key such as `checkout.button.size` names the flag
//! (`checkout`) followed by a path into its resolved structure
//! (`button.size`). [`FlagPath::parse`] performs the split; [`navigate`]
//! walks a value tree and coerces the final leaf to the requested kind.

use crate::error::{FlagsError, Result};
use crate::value::{StructuredValue, ValueKind};

/// An evaluation key split into flag name and value path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlagPath {
	pub flag: String,
	pub path: Vec<String>,
}

impl FlagPath {
	/// Splits a dotted evaluation key. The first segment is the flag name;
	/// the rest is the path into the flag's value. Empty keys and empty
	/// segments are rejected.
	pub fn parse(key: &str) -> Result<Self> {
		if key.is_empty() {
			return Err(FlagsError::InvalidKey(key.to_string()));
		}

		let mut segments = key.split('.');
		let flag = match segments.next() {
			Some(flag) if !flag.is_empty() => flag.to_string(),
			_ => return Err(FlagsError::InvalidKey(key.to_string())),
		};

		let mut path = Vec::new();
		for segment in segments {
			if segment.is_empty() {
				return Err(FlagsError::InvalidKey(key.to_string()));
			}
			path.push(segment.to_string());
		}

		Ok(Self { flag, path })
	}
}

impl std::fmt::Display for FlagPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.flag)?;
		for segment in &self.path {
			write!(f, ".{segment}")?;
		}
		Ok(())
	}
}

/// Walks `root` along `path` and coerces the final leaf to `kind`.
///
/// Returns `Ok(None)` when any segment is missing, a non-final segment
/// lands on a non-struct, or the final leaf is null — the caller falls
/// through to its default value. Returns [`FlagsError::Parse`] when the
/// leaf exists but its tag does not match the requested kind; coercion is
/// strict, with the exception that `Struct` requests return whatever the
/// path resolves to unchanged.
pub fn navigate(
	root: &StructuredValue,
	path: &[String],
	kind: ValueKind,
) -> Result<Option<StructuredValue>> {
	let mut current = root;
	for segment in path {
		match current {
			StructuredValue::Struct(fields) => match fields.get(segment) {
				Some(value) => current = value,
				None => return Ok(None),
			},
			_ => return Ok(None),
		}
	}
	coerce(current, kind)
}

fn coerce(value: &StructuredValue, kind: ValueKind) -> Result<Option<StructuredValue>> {
	if value.is_null() {
		return Ok(None);
	}
	if kind == ValueKind::Struct {
		// Whole-value requests take the subtree as-is.
		return Ok(Some(value.clone()));
	}
	if value.kind() == kind {
		Ok(Some(value.clone()))
	} else {
		Err(FlagsError::Parse(value.to_string()))
	}
}


#[cfg(test)]
mod proptests {
	use super::*;
	use proptest::prelude::*;

	proptest! {
		#[test]
		fn parse_display_round_trip(
			flag in "[a-z][a-z0-9_]{0,12}",
			segments in prop::collection::vec("[a-z][a-z0-9_]{0,8}", 0..4),
		) {
			let key = std::iter::once(flag.clone())
				.chain(segments.iter().cloned())
				.collect::<Vec<_>>()
				.join(".");
			let parsed = FlagPath::parse(&key).unwrap();
			prop_assert_eq!(&parsed.flag, &flag);
			prop_assert_eq!(&parsed.path, &segments);
			prop_assert_eq!(parsed.to_string(), key);
		}

		#[test]
		fn navigation_never_panics(
			segments in prop::collection::vec("[a-z]{1,6}", 0..4),
		) {
			let root = StructuredValue::from([("size", StructuredValue::Int(3))]);
			let path: Vec<String> = segments;
			let _ = navigate(&root, &path, ValueKind::Int);
		}
	}
}
