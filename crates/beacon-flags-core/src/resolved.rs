// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolved flag records.
//!
//! A resolve returns one [`ResolvedValue`] per flag for the supplied
//! context. The cache stores each one as a [`ResolvedFlag`], which adds the
//! apply-delivery status the tracker owns.

use serde::{Deserialize, Serialize};

use crate::value::StructuredValue;

/// Why the resolver produced (or declined to produce) a value for a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolveReason {
	Unspecified,
	/// A targeting rule matched; `variant` and `value` are populated.
	Match,
	/// No segment matched the context; the caller's default applies.
	NoSegmentMatch,
	/// A segment matched but assigned no treatment.
	NoTreatmentMatch,
	FlagArchived,
	/// The context's targeting key was rejected by the resolver.
	TargetingKeyError,
	Error,
}

/// Delivery state of the "flag was applied" report for one cached flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApplyStatus {
	#[default]
	NotApplied,
	Applying,
	Applied,
	ApplyFailed,
}

/// One flag as returned by a resolve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedValue {
	pub flag: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variant: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub value: Option<StructuredValue>,
	pub reason: ResolveReason,
}

impl ResolvedValue {
	pub fn new(flag: impl Into<String>, reason: ResolveReason) -> Self {
		Self {
			flag: flag.into(),
			variant: None,
			value: None,
			reason,
		}
	}

	pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
		self.variant = Some(variant.into());
		self
	}

	pub fn with_value(mut self, value: StructuredValue) -> Self {
		self.value = Some(value);
		self
	}
}

/// A resolved flag as cached, with its apply-delivery status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedFlag {
	#[serde(flatten)]
	pub resolved: ResolvedValue,
	#[serde(default)]
	pub apply_status: ApplyStatus,
}

impl ResolvedFlag {
	/// Wraps a freshly resolved value; delivery has not been attempted.
	pub fn new(resolved: ResolvedValue) -> Self {
		Self {
			resolved,
			apply_status: ApplyStatus::NotApplied,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn fresh_flags_are_not_applied() {
		let flag = ResolvedFlag::new(
			ResolvedValue::new("flag", ResolveReason::Match)
				.with_variant("control")
				.with_value(StructuredValue::Int(3)),
		);
		assert_eq!(flag.apply_status, ApplyStatus::NotApplied);
	}

	#[test]
	fn serde_round_trips_with_status() {
		let mut flag = ResolvedFlag::new(
			ResolvedValue::new("flag", ResolveReason::Match)
				.with_variant("control")
				.with_value(StructuredValue::from([(
					"size",
					StructuredValue::Int(3),
				)])),
		);
		flag.apply_status = ApplyStatus::ApplyFailed;

		let json = serde_json::to_string(&flag).unwrap();
		let back: ResolvedFlag = serde_json::from_str(&json).unwrap();
		assert_eq!(back, flag);
	}

	#[test]
	fn reasons_serialize_screaming_snake() {
		let json = serde_json::to_string(&ResolveReason::NoSegmentMatch).unwrap();
		assert_eq!(json, r#""NO_SEGMENT_MATCH""#);
		let json = serde_json::to_string(&ApplyStatus::ApplyFailed).unwrap();
		assert_eq!(json, r#""APPLY_FAILED""#);
	}

	#[test]
	fn no_segment_match_round_trips_without_value() {
		let flag = ResolvedFlag::new(ResolvedValue::new("flag", ResolveReason::NoSegmentMatch));
		let json = serde_json::to_string(&flag).unwrap();
		let back: ResolvedFlag = serde_json::from_str(&json).unwrap();
		assert_eq!(back.resolved.value, None);
		assert_eq!(back.resolved.variant, None);
		assert_eq!(back.resolved.reason, ResolveReason::NoSegmentMatch);
	}
}
