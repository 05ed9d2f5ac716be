// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

/// Errors surfaced by flag evaluation and the surrounding SDK machinery.
///
/// Apply-delivery failures are deliberately absent: delivery is
/// fire-and-forget from the evaluation caller's perspective and failures
/// are contained (and retried) inside the apply tracker.
#[derive(Debug, Error)]
pub enum FlagsError {
	/// No evaluation context was supplied at all.
	#[error("evaluation context is missing")]
	InvalidContext,

	/// A context was supplied but its targeting key is absent or empty.
	#[error("targeting key is missing or empty")]
	TargetingKeyMissing,

	#[error("flag not found: {0}")]
	FlagNotFound(String),

	#[error("invalid flag key: {0}")]
	InvalidKey(String),

	/// The requested leaf exists but cannot be coerced to the requested
	/// type. The payload is the rendered leaf value.
	#[error("Unable to parse flag value: {0}")]
	Parse(String),

	/// Evaluation attempted before a successful resolve.
	#[error("provider is not ready")]
	NotReady,

	#[error("configuration error: {0}")]
	Configuration(String),

	#[error("I/O error: {0}")]
	Io(#[from] std::io::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error("storage error: {0}")]
	Storage(String),

	#[error("network error: {0}")]
	Network(String),
}

pub type Result<T> = std::result::Result<T, FlagsError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_error_message_renders_the_value() {
		let err = FlagsError::Parse("3".to_string());
		assert_eq!(err.to_string(), "Unable to parse flag value: 3");
	}

	#[test]
	fn serde_errors_convert() {
		let bad: std::result::Result<i64, _> = serde_json::from_str("not json");
		let err: FlagsError = bad.unwrap_err().into();
		assert!(matches!(err, FlagsError::Serialization(_)));
	}
}
