// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flag provider: the evaluation orchestrator.
//!
//! The provider composes the override registry, the persistent flag store,
//! the apply tracker and the resolver into the typed evaluation API.
//! Resolution happens out of band (`initialize`, `on_context_set`,
//! `refresh`); the evaluation path itself is synchronous and never touches
//! the network.
//!
//! Evaluation order for `evaluate_*`:
//! 1. a full override match serves the value with reason `Static` and
//!    requires neither readiness nor a context;
//! 2. the context is validated (present, non-empty targeting key) and the
//!    provider must be ready;
//! 3. the cache is consulted: absent → `FlagNotFound`, resolved under a
//!    different context → default value with reason `Stale`;
//! 4. a cache hit is navigated by the remainder path (with field overrides
//!    merged in) and apply delivery is scheduled for effective
//!    resolutions.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use beacon_flags_core::{
	navigate, ErrorCode, Evaluation, EvaluationContext, EvaluationReason, FlagPath, FlagsError,
	ResolveReason, ResolvedFlag, Result, StructuredValue, ValueKind,
};
use tracing::{debug, info};

use crate::apply::{ApplyExecutor, ApplyTracker, SpawnExecutor};
use crate::cache::{CacheLookup, FlagStore};
use crate::overrides::{set_at_path, FieldOverride, OverrideRegistry, OverrideRule};
use crate::resolver::{HttpResolver, Resolver};
use crate::storage::{FileStorage, Storage};

const DEFAULT_BASE_URL: &str = "https://resolver.beacon.dev";

/// Client-side flag provider.
///
/// Construct through [`FlagProvider::builder`]; every seam defaults to the
/// production implementation and can be swapped for tests.
pub struct FlagProvider {
	resolver: Arc<dyn Resolver>,
	store: Arc<FlagStore>,
	tracker: ApplyTracker,
	overrides: RwLock<OverrideRegistry>,
	ready: AtomicBool,
}

impl std::fmt::Debug for FlagProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("FlagProvider")
			.field("ready", &self.ready)
			.finish_non_exhaustive()
	}
}

/// Builder for [`FlagProvider`].
pub struct FlagProviderBuilder {
	client_secret: Option<String>,
	base_url: String,
	resolver: Option<Arc<dyn Resolver>>,
	storage: Option<Arc<dyn Storage>>,
	apply_executor: Option<Arc<dyn ApplyExecutor>>,
	overrides: Vec<OverrideRule>,
}

impl FlagProviderBuilder {
	fn new() -> Self {
		Self {
			client_secret: None,
			base_url: DEFAULT_BASE_URL.to_string(),
			resolver: None,
			storage: None,
			apply_executor: None,
			overrides: Vec::new(),
		}
	}

	/// Client secret for the default HTTP resolver.
	pub fn client_secret(mut self, secret: impl Into<String>) -> Self {
		self.client_secret = Some(secret.into());
		self
	}

	pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
		self.base_url = base_url.into();
		self
	}

	/// Replaces the HTTP resolver, e.g. with a test double.
	pub fn resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
		self.resolver = Some(resolver);
		self
	}

	/// Replaces the default file-backed snapshot storage.
	pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
		self.storage = Some(storage);
		self
	}

	/// Replaces the executor apply deliveries run on.
	pub fn apply_executor(mut self, executor: Arc<dyn ApplyExecutor>) -> Self {
		self.apply_executor = Some(executor);
		self
	}

	/// Registers a local override at build time.
	pub fn override_rule(mut self, rule: OverrideRule) -> Self {
		self.overrides.push(rule);
		self
	}

	pub fn build(self) -> Result<FlagProvider> {
		let resolver: Arc<dyn Resolver> = match self.resolver {
			Some(resolver) => resolver,
			None => {
				let secret = self.client_secret.ok_or_else(|| {
					FlagsError::Configuration(
						"a client secret or a custom resolver is required".to_string(),
					)
				})?;
				Arc::new(HttpResolver::new(self.base_url, secret))
			}
		};

		let storage: Arc<dyn Storage> = match self.storage {
			Some(storage) => storage,
			None => Arc::new(FileStorage::from_xdg()?),
		};

		let executor: Arc<dyn ApplyExecutor> = self
			.apply_executor
			.unwrap_or_else(|| Arc::new(SpawnExecutor));

		let mut registry = OverrideRegistry::new();
		for rule in self.overrides {
			registry.register(rule)?;
		}

		let store = Arc::new(FlagStore::new(storage));
		let tracker = ApplyTracker::new(Arc::clone(&store), Arc::clone(&resolver), executor);

		Ok(FlagProvider {
			resolver,
			store,
			tracker,
			overrides: RwLock::new(registry),
			ready: AtomicBool::new(false),
		})
	}
}

impl FlagProvider {
	pub fn builder() -> FlagProviderBuilder {
		FlagProviderBuilder::new()
	}

	/// Resolves flags for the initial context and marks the provider
	/// ready.
	pub async fn initialize(&self, context: &EvaluationContext) -> Result<()> {
		self.resolve_and_cache(context).await?;
		self.ready.store(true, Ordering::SeqCst);
		info!("flag provider ready");
		Ok(())
	}

	/// Re-resolves after the evaluation context changed. The previous
	/// snapshot is discarded wholesale.
	pub async fn on_context_set(
		&self,
		_old: &EvaluationContext,
		new: &EvaluationContext,
	) -> Result<()> {
		self.resolve_and_cache(new).await?;
		self.ready.store(true, Ordering::SeqCst);
		Ok(())
	}

	/// Re-resolves against the current context.
	pub async fn refresh(&self, context: &EvaluationContext) -> Result<()> {
		self.resolve_and_cache(context).await
	}

	/// Restores the last persisted snapshot, if any, making the provider
	/// ready without a network resolve. Returns `true` when a snapshot was
	/// loaded.
	pub async fn restore(&self) -> Result<bool> {
		let loaded = self.store.load_persisted().await?;
		if loaded {
			self.ready.store(true, Ordering::SeqCst);
		}
		Ok(loaded)
	}

	/// Drops all cached and persisted flag state.
	pub async fn clear(&self) -> Result<()> {
		self.store.clear().await
	}

	/// Marks the provider not ready. In-flight apply deliveries may still
	/// complete.
	pub fn shutdown(&self) {
		self.ready.store(false, Ordering::SeqCst);
	}

	pub fn is_ready(&self) -> bool {
		self.ready.load(Ordering::SeqCst)
	}

	/// Registers a local override after construction.
	pub fn register_override(&self, rule: OverrideRule) -> Result<()> {
		self.overrides
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.register(rule)
	}

	/// Apply status of a cached flag under the given context.
	pub fn apply_status(
		&self,
		flag: &str,
		context: &EvaluationContext,
	) -> Option<beacon_flags_core::ApplyStatus> {
		self.store.apply_status(flag, context)
	}

	pub fn evaluate_bool(
		&self,
		key: &str,
		default: bool,
		context: Option<&EvaluationContext>,
	) -> Result<Evaluation<bool>> {
		Ok(self
			.evaluate_raw(key, context, ValueKind::Bool)?
			.map(|value| value.and_then(StructuredValue::into_bool).unwrap_or(default)))
	}

	pub fn evaluate_int(
		&self,
		key: &str,
		default: i64,
		context: Option<&EvaluationContext>,
	) -> Result<Evaluation<i64>> {
		Ok(self
			.evaluate_raw(key, context, ValueKind::Int)?
			.map(|value| value.and_then(StructuredValue::into_int).unwrap_or(default)))
	}

	pub fn evaluate_double(
		&self,
		key: &str,
		default: f64,
		context: Option<&EvaluationContext>,
	) -> Result<Evaluation<f64>> {
		Ok(self
			.evaluate_raw(key, context, ValueKind::Double)?
			.map(|value| value.and_then(StructuredValue::into_double).unwrap_or(default)))
	}

	pub fn evaluate_string(
		&self,
		key: &str,
		default: &str,
		context: Option<&EvaluationContext>,
	) -> Result<Evaluation<String>> {
		Ok(self
			.evaluate_raw(key, context, ValueKind::String)?
			.map(|value| {
				value
					.and_then(StructuredValue::into_string)
					.unwrap_or_else(|| default.to_string())
			}))
	}

	/// Evaluates the raw structured value at `key`, most often the whole
	/// flag.
	pub fn evaluate_object(
		&self,
		key: &str,
		default: StructuredValue,
		context: Option<&EvaluationContext>,
	) -> Result<Evaluation<StructuredValue>> {
		Ok(self
			.evaluate_raw(key, context, ValueKind::Struct)?
			.map(|value| value.unwrap_or(default)))
	}

	async fn resolve_and_cache(&self, context: &EvaluationContext) -> Result<()> {
		let response = self.resolver.resolve(context).await?;
		debug!(flags = response.resolved.len(), "caching resolved flags");
		self.store
			.replace_all(response.resolved, context, response.resolve_token)
			.await
	}

	fn overrides(&self) -> std::sync::RwLockReadGuard<'_, OverrideRegistry> {
		self.overrides
			.read()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// The shared evaluation ladder. `Ok` carries `None` as the value when
	/// the caller's default applies.
	fn evaluate_raw(
		&self,
		key: &str,
		context: Option<&EvaluationContext>,
		kind: ValueKind,
	) -> Result<Evaluation<Option<StructuredValue>>> {
		let requested = FlagPath::parse(key)?;

		// Overrides first: they need neither readiness nor a context.
		if let Some(matched) = self.overrides().full_match(&requested) {
			let value = navigate(&matched.root, &matched.remainder, kind)?;
			return Ok(match value {
				Some(value) => Evaluation::new(Some(value), EvaluationReason::Static)
					.with_variant(matched.variant),
				None => Evaluation::new(None, EvaluationReason::Default),
			});
		}

		let context = context.ok_or(FlagsError::InvalidContext)?;
		if !context.has_targeting_key() {
			return Err(FlagsError::TargetingKeyMissing);
		}
		if !self.is_ready() {
			return Err(FlagsError::NotReady);
		}

		let fingerprint = context.fingerprint();
		match self.store.get_by_fingerprint(&requested.flag, &fingerprint) {
			CacheLookup::Absent => Err(FlagsError::FlagNotFound(requested.flag)),
			CacheLookup::Stale => Ok(Evaluation::new(None, EvaluationReason::Stale)),
			CacheLookup::Found {
				flag,
				resolve_token,
			} => self.evaluate_resolved(flag, &resolve_token, &fingerprint, &requested, kind),
		}
	}

	fn evaluate_resolved(
		&self,
		flag: ResolvedFlag,
		resolve_token: &str,
		fingerprint: &str,
		requested: &FlagPath,
		kind: ValueKind,
	) -> Result<Evaluation<Option<StructuredValue>>> {
		match flag.resolved.reason {
			ResolveReason::Match => {
				let field_overrides = self.overrides().field_overrides(&requested.flag);

				let mut root = flag.resolved.value;
				for field in &field_overrides {
					let base = root
						.get_or_insert_with(|| StructuredValue::Struct(BTreeMap::new()));
					set_at_path(base, &field.path, field.value.clone());
				}

				// A parse error aborts before apply delivery is recorded.
				let value = match &root {
					Some(root) => navigate(root, &requested.path, kind)?,
					None => None,
				};

				self.tracker
					.record_evaluation(&requested.flag, resolve_token, fingerprint);

				Ok(match touching_override(&field_overrides, &requested.path) {
					Some(field) => Evaluation::new(value, EvaluationReason::Static)
						.with_variant(field.variant.clone()),
					None => {
						let mut evaluation =
							Evaluation::new(value, EvaluationReason::TargetingMatch);
						if let Some(variant) = flag.resolved.variant {
							evaluation = evaluation.with_variant(variant);
						}
						evaluation
					}
				})
			}
			ResolveReason::NoSegmentMatch | ResolveReason::NoTreatmentMatch => {
				// The resolution was effective even though no value was
				// assigned; it still counts as an exposure.
				self.tracker
					.record_evaluation(&requested.flag, resolve_token, fingerprint);
				Ok(Evaluation::new(None, EvaluationReason::Default))
			}
			ResolveReason::FlagArchived => {
				Ok(Evaluation::new(None, EvaluationReason::Disabled))
			}
			ResolveReason::TargetingKeyError => Ok(Evaluation::error(
				None,
				ErrorCode::InvalidContext,
				"Invalid targeting key",
			)),
			ResolveReason::Unspecified | ResolveReason::Error => Ok(Evaluation::error(
				None,
				ErrorCode::General,
				format!("resolve failed for flag {}", requested.flag),
			)),
		}
	}
}

/// The most recent field override whose path overlaps the requested one
/// (either is a prefix of the other): the returned subtree contains
/// overridden data, so the result reports the override's reason/variant.
fn touching_override<'a>(
	field_overrides: &'a [FieldOverride],
	requested: &[String],
) -> Option<&'a FieldOverride> {
	field_overrides
		.iter()
		.rev()
		.find(|field| paths_overlap(&field.path, requested))
}

fn paths_overlap(a: &[String], b: &[String]) -> bool {
	a.iter().zip(b.iter()).all(|(x, y)| x == y)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::apply::InlineExecutor;
	use crate::storage::InMemoryStorage;

	#[test]
	fn build_requires_a_secret_or_resolver() {
		let err = FlagProvider::builder()
			.storage(Arc::new(InMemoryStorage::new()))
			.apply_executor(Arc::new(InlineExecutor))
			.build()
			.unwrap_err();
		assert!(matches!(err, FlagsError::Configuration(_)));
	}

	#[test]
	fn paths_overlap_on_prefixes_only() {
		let size = vec!["size".to_string()];
		let color = vec!["color".to_string()];
		let nested = vec!["size".to_string(), "inner".to_string()];

		assert!(paths_overlap(&size, &size));
		assert!(paths_overlap(&size, &nested));
		assert!(paths_overlap(&nested, &size));
		assert!(paths_overlap(&size, &[]));
		assert!(!paths_overlap(&size, &color));
		assert!(!paths_overlap(&nested, &color));
	}
}
