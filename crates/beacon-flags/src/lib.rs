// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Feature flag resolution Rust SDK for Beacon.
//!
//! This crate provides a client-side flag provider: flags are resolved
//! remotely per evaluation context, cached durably across process
//! restarts, evaluated locally by dotted path, and every effective
//! resolution is reported back ("applied") exactly once.
//!
//! # Features
//!
//! - **Typed Evaluation**: methods for boolean, integer, double, string
//!   and structured values with strict coercion
//! - **Durable Caching**: the resolved snapshot and per-flag apply status
//!   survive restarts
//! - **At-most-once Apply**: exposure reports are deduplicated and retried
//!   without double-reporting
//! - **Local Overrides**: whole-flag or single-field overrides for
//!   development and testing
//!
//! # Example
//!
//! ```ignore
//! use beacon_flags::{EvaluationContext, FlagProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = FlagProvider::builder()
//!         .client_secret("beacon_client_prod_xxx")
//!         .build()?;
//!
//!     let context = EvaluationContext::new("user123");
//!     provider.initialize(&context).await?;
//!
//!     let size = provider.evaluate_int("checkout.button.size", 1, Some(&context))?;
//!     println!("size = {} ({:?})", size.value, size.reason);
//!
//!     Ok(())
//! }
//! ```

mod apply;
mod cache;
mod overrides;
mod provider;
mod resolver;
mod storage;

pub use apply::{ApplyExecutor, ApplyTracker, InlineExecutor, SpawnExecutor};
pub use cache::{CacheLookup, CacheSnapshot, FlagStore};
pub use overrides::{OverrideRegistry, OverrideRule};
pub use provider::{FlagProvider, FlagProviderBuilder};
pub use resolver::{HttpResolver, ResolveResponse, Resolver};
pub use storage::{FileStorage, InMemoryStorage, Storage};

// Re-export core types for convenience
pub use beacon_flags_core::{
	ApplyStatus, ErrorCode, Evaluation, EvaluationContext, EvaluationReason, FlagsError,
	ResolveReason, ResolvedFlag, ResolvedValue, Result, StructuredValue, ValueKind,
};
