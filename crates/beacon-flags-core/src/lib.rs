// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for the Beacon feature flag resolution system.
//!
//! This crate provides the shared types for client-side flag resolution:
//! structured values, evaluation contexts, resolved flag records, apply
//! statuses and dotted-path navigation. It is used by the client SDK
//! (`beacon-flags`) and carries no I/O of its own.
//!
//! # Overview
//!
//! Flags are resolved remotely against an [`EvaluationContext`] and cached
//! per context fingerprint. An evaluation key such as `flag.size` is split
//! by [`FlagPath`] into the flag name and a path into the flag's
//! [`StructuredValue`]; [`navigate`] walks the tree and coerces the leaf to
//! the requested [`ValueKind`]. Each cached flag carries the
//! [`ApplyStatus`] of its exposure report.
//!
//! # Example
//!
//! ```
//! use beacon_flags_core::{navigate, FlagPath, StructuredValue, ValueKind};
//!
//! let value = StructuredValue::from([("size", StructuredValue::Int(3))]);
//! let path = FlagPath::parse("flag.size").unwrap();
//!
//! let leaf = navigate(&value, &path.path, ValueKind::Int).unwrap();
//! assert_eq!(leaf, Some(StructuredValue::Int(3)));
//! ```

pub mod context;
pub mod error;
pub mod evaluation;
pub mod path;
pub mod resolved;
pub mod value;

pub use context::EvaluationContext;
pub use error::{FlagsError, Result};
pub use evaluation::{ErrorCode, Evaluation, EvaluationReason};
pub use path::{navigate, FlagPath};
pub use resolved::{ApplyStatus, ResolveReason, ResolvedFlag, ResolvedValue};
pub use value::{StructuredValue, ValueKind};
