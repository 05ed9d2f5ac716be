// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Evaluation results.

use serde::{Deserialize, Serialize};

/// Why an evaluation produced the value it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EvaluationReason {
	/// A targeting rule matched during resolution.
	TargetingMatch,
	/// No rule produced a value; the caller's default was returned.
	Default,
	/// The value came from a locally registered override.
	Static,
	/// The cached snapshot was resolved under a different context.
	Stale,
	/// The flag is archived.
	Disabled,
	/// The result carries an in-band error (see `error_code`).
	Error,
}

/// Machine-readable code for in-band error results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
	InvalidContext,
	FlagNotFound,
	ParseError,
	General,
}

/// The outcome of a typed flag evaluation.
///
/// Hard failures (missing context, unknown flag, unparseable leaf) are
/// returned as `Err(FlagsError)` instead; an `Evaluation` with
/// `reason = Error` is reserved for resolve-time conditions the caller
/// should see without the lookup failing, such as a rejected targeting key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation<T> {
	pub value: T,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub variant: Option<String>,
	pub reason: EvaluationReason,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_code: Option<ErrorCode>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error_message: Option<String>,
}

impl<T> Evaluation<T> {
	pub fn new(value: T, reason: EvaluationReason) -> Self {
		Self {
			value,
			variant: None,
			reason,
			error_code: None,
			error_message: None,
		}
	}

	pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
		self.variant = Some(variant.into());
		self
	}

	/// Builds an in-band error result carrying the caller's default value.
	pub fn error(value: T, code: ErrorCode, message: impl Into<String>) -> Self {
		Self {
			value,
			variant: None,
			reason: EvaluationReason::Error,
			error_code: Some(code),
			error_message: Some(message.into()),
		}
	}

	/// Maps the value while preserving variant, reason and error fields.
	pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Evaluation<U> {
		Evaluation {
			value: f(self.value),
			variant: self.variant,
			reason: self.reason,
			error_code: self.error_code,
			error_message: self.error_message,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn plain_results_carry_no_error() {
		let eval = Evaluation::new(3, EvaluationReason::TargetingMatch).with_variant("control");
		assert_eq!(eval.value, 3);
		assert_eq!(eval.variant.as_deref(), Some("control"));
		assert!(eval.error_code.is_none());
		assert!(eval.error_message.is_none());
	}

	#[test]
	fn error_results_carry_code_and_message() {
		let eval = Evaluation::error(1, ErrorCode::InvalidContext, "Invalid targeting key");
		assert_eq!(eval.value, 1);
		assert_eq!(eval.reason, EvaluationReason::Error);
		assert_eq!(eval.error_code, Some(ErrorCode::InvalidContext));
		assert_eq!(eval.error_message.as_deref(), Some("Invalid targeting key"));
	}

	#[test]
	fn map_preserves_metadata() {
		let eval = Evaluation::new(Some(3), EvaluationReason::TargetingMatch)
			.with_variant("control")
			.map(|v| v.unwrap_or(0));
		assert_eq!(eval.value, 3);
		assert_eq!(eval.variant.as_deref(), Some("control"));
		assert_eq!(eval.reason, EvaluationReason::TargetingMatch);
	}

	#[test]
	fn reason_serialization_matches_wire_names() {
		let json = serde_json::to_string(&EvaluationReason::TargetingMatch).unwrap();
		assert_eq!(json, r#""TARGETING_MATCH""#);
		let json = serde_json::to_string(&EvaluationReason::Static).unwrap();
		assert_eq!(json, r#""STATIC""#);
	}
}
