// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation context.
//!
//! Flags are resolved against an immutable set of attributes plus a
//! distinguished targeting key. Two contexts are equivalent iff all
//! attributes and the targeting key match exactly; the cache compares
//! contexts by [`EvaluationContext::fingerprint`], a SHA-256 over the
//! canonical serialized form.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::value::StructuredValue;

/// The context a flag evaluation runs against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	targeting_key: Option<String>,
	#[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
	attributes: BTreeMap<String, StructuredValue>,
}

impl EvaluationContext {
	/// Creates a context with the given targeting key and no attributes.
	pub fn new(targeting_key: impl Into<String>) -> Self {
		Self {
			targeting_key: Some(targeting_key.into()),
			attributes: BTreeMap::new(),
		}
	}

	/// Sets the targeting key.
	pub fn with_targeting_key(mut self, targeting_key: impl Into<String>) -> Self {
		self.targeting_key = Some(targeting_key.into());
		self
	}

	/// Adds an attribute.
	pub fn with_attribute(mut self, key: impl Into<String>, value: StructuredValue) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	pub fn targeting_key(&self) -> Option<&str> {
		self.targeting_key.as_deref()
	}

	/// Whether a non-empty targeting key is present.
	pub fn has_targeting_key(&self) -> bool {
		self.targeting_key
			.as_deref()
			.is_some_and(|key| !key.is_empty())
	}

	pub fn attributes(&self) -> &BTreeMap<String, StructuredValue> {
		&self.attributes
	}

	/// Hex-encoded SHA-256 over the canonical serialized context.
	///
	/// Attribute ordering is canonical (`BTreeMap`), so equivalent contexts
	/// always produce the same fingerprint and any attribute or targeting
	/// key change produces a different one.
	pub fn fingerprint(&self) -> String {
		let mut hasher = Sha256::new();
		// BTreeMap iteration order makes serde_json output canonical; a
		// serialization failure is impossible for this shape.
		let canonical = serde_json::to_vec(self).unwrap_or_default();
		hasher.update(&canonical);
		hex::encode(hasher.finalize())
	}
}
