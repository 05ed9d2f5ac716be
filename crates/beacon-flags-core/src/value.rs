// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Structured flag values.
//!
//! A resolved flag carries a structured value tree. Evaluation walks the
//! tree by dotted path and coerces the final leaf to the type the caller
//! asked for; coercion is strict (an `Int` leaf is never served for a
//! `Double` request and vice versa).
//!
//! The serde representation is adjacently tagged so the `Int`/`Double`
//! distinction survives a snapshot round-trip through storage.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A structured flag value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StructuredValue {
	Null,
	Bool(bool),
	Int(i64),
	Double(f64),
	String(String),
	List(Vec<StructuredValue>),
	Struct(BTreeMap<String, StructuredValue>),
}

/// The tag of a [`StructuredValue`], used to express what type an
/// evaluation requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
	Null,
	Bool,
	Int,
	Double,
	String,
	List,
	Struct,
}

impl StructuredValue {
	/// Returns the tag of this value.
	pub fn kind(&self) -> ValueKind {
		match self {
			Self::Null => ValueKind::Null,
			Self::Bool(_) => ValueKind::Bool,
			Self::Int(_) => ValueKind::Int,
			Self::Double(_) => ValueKind::Double,
			Self::String(_) => ValueKind::String,
			Self::List(_) => ValueKind::List,
			Self::Struct(_) => ValueKind::Struct,
		}
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	pub fn as_bool(&self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(*b),
			_ => None,
		}
	}

	pub fn as_int(&self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(*i),
			_ => None,
		}
	}

	pub fn as_double(&self) -> Option<f64> {
		match self {
			Self::Double(d) => Some(*d),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	pub fn as_struct(&self) -> Option<&BTreeMap<String, StructuredValue>> {
		match self {
			Self::Struct(fields) => Some(fields),
			_ => None,
		}
	}

	/// Consuming accessors for the typed evaluation API.
	pub fn into_bool(self) -> Option<bool> {
		match self {
			Self::Bool(b) => Some(b),
			_ => None,
		}
	}

	pub fn into_int(self) -> Option<i64> {
		match self {
			Self::Int(i) => Some(i),
			_ => None,
		}
	}

	pub fn into_double(self) -> Option<f64> {
		match self {
			Self::Double(d) => Some(d),
			_ => None,
		}
	}

	pub fn into_string(self) -> Option<String> {
		match self {
			Self::String(s) => Some(s),
			_ => None,
		}
	}

	/// Projects this value onto untyped JSON. Lossy for the `Int`/`Double`
	/// tag; used for display and logging, never for persistence.
	pub fn to_json(&self) -> serde_json::Value {
		match self {
			Self::Null => serde_json::Value::Null,
			Self::Bool(b) => serde_json::Value::Bool(*b),
			Self::Int(i) => serde_json::Value::from(*i),
			Self::Double(d) => serde_json::Value::from(*d),
			Self::String(s) => serde_json::Value::String(s.clone()),
			Self::List(items) => {
				serde_json::Value::Array(items.iter().map(StructuredValue::to_json).collect())
			}
			Self::Struct(fields) => serde_json::Value::Object(
				fields
					.iter()
					.map(|(k, v)| (k.clone(), v.to_json()))
					.collect(),
			),
		}
	}
}

impl std::fmt::Display for StructuredValue {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Null => write!(f, "null"),
			Self::Bool(b) => write!(f, "{b}"),
			Self::Int(i) => write!(f, "{i}"),
			Self::Double(d) => write!(f, "{d}"),
			Self::String(s) => write!(f, "{s}"),
			Self::List(_) | Self::Struct(_) => write!(f, "{}", self.to_json()),
		}
	}
}

impl From<bool> for StructuredValue {
	fn from(b: bool) -> Self {
		Self::Bool(b)
	}
}

impl From<i64> for StructuredValue {
	fn from(i: i64) -> Self {
		Self::Int(i)
	}
}

impl From<f64> for StructuredValue {
	fn from(d: f64) -> Self {
		Self::Double(d)
	}
}

impl From<&str> for StructuredValue {
	fn from(s: &str) -> Self {
		Self::String(s.to_string())
	}
}

impl From<String> for StructuredValue {
	fn from(s: String) -> Self {
		Self::String(s)
	}
}

impl<const N: usize> From<[(&str, StructuredValue); N]> for StructuredValue {
	fn from(fields: [(&str, StructuredValue); N]) -> Self {
		Self::Struct(
			fields
				.into_iter()
				.map(|(k, v)| (k.to_string(), v))
				.collect(),
		)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accessors_match_tags() {
		assert_eq!(StructuredValue::Bool(true).as_bool(), Some(true));
		assert_eq!(StructuredValue::Int(3).as_int(), Some(3));
		assert_eq!(StructuredValue::Double(3.1).as_double(), Some(3.1));
		assert_eq!(StructuredValue::from("green").as_str(), Some("green"));

		// Strict tags: no cross-type reads
		assert_eq!(StructuredValue::Int(3).as_double(), None);
		assert_eq!(StructuredValue::Double(3.0).as_int(), None);
		assert_eq!(StructuredValue::from("true").as_bool(), None);
	}

	#[test]
	fn display_renders_leaf_values() {
		assert_eq!(StructuredValue::Int(3).to_string(), "3");
		assert_eq!(StructuredValue::Double(3.1).to_string(), "3.1");
		assert_eq!(StructuredValue::from("green").to_string(), "green");
		assert_eq!(StructuredValue::Null.to_string(), "null");
		assert_eq!(StructuredValue::Bool(false).to_string(), "false");
	}

	#[test]
	fn display_renders_containers_as_json() {
		let value = StructuredValue::from([("size", StructuredValue::Int(3))]);
		assert_eq!(value.to_string(), r#"{"size":3}"#);
	}

	#[test]
	fn serde_preserves_int_double_distinction() {
		let int = StructuredValue::Int(3);
		let double = StructuredValue::Double(3.0);

		let int_json = serde_json::to_string(&int).unwrap();
		let double_json = serde_json::to_string(&double).unwrap();
		assert_ne!(int_json, double_json);

		let int_back: StructuredValue = serde_json::from_str(&int_json).unwrap();
		let double_back: StructuredValue = serde_json::from_str(&double_json).unwrap();
		assert_eq!(int_back, int);
		assert_eq!(double_back, double);
	}

	#[test]
	fn serde_round_trips_nested_structures() {
		let value = StructuredValue::from([
			("size", StructuredValue::Int(3)),
			("color", StructuredValue::from("green")),
			(
				"nested",
				StructuredValue::from([("visible", StructuredValue::Bool(false))]),
			),
			(
				"tags",
				StructuredValue::List(vec![StructuredValue::from("a"), StructuredValue::Null]),
			),
		]);

		let json = serde_json::to_string(&value).unwrap();
		let back: StructuredValue = serde_json::from_str(&json).unwrap();
		assert_eq!(back, value);
	}
}
