// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Apply delivery tracker.
//!
//! Every evaluation that used a cached (non-override) value must be
//! reported to the resolver as "applied" — at most once per effective
//! resolution. The tracker drives the per-flag status machine:
//!
//! ```text
//! NOT_APPLIED ──start──> APPLYING ──success──> APPLIED
//!                            └──────failure──> APPLY_FAILED ──start──> APPLYING
//! ```
//!
//! The transition to `Applying` happens synchronously on the evaluation
//! path, so concurrent evaluations of the same flag trigger exactly one
//! delivery; the delivery itself runs on an injectable [`ApplyExecutor`].
//! Failures are logged and retried by a later evaluation, never surfaced
//! to the evaluation caller.

use std::sync::Arc;

use beacon_flags_core::ApplyStatus;
use chrono::Utc;
use futures::future::BoxFuture;
use tracing::{debug, warn};

use crate::cache::FlagStore;
use crate::resolver::Resolver;

/// Where apply deliveries run.
///
/// Production dispatches onto the tokio runtime; tests may run tasks
/// inline or capture them for deterministic scheduling. The status-machine
/// contract holds under any executor.
pub trait ApplyExecutor: Send + Sync {
	fn dispatch(&self, task: BoxFuture<'static, ()>);
}

/// Spawns deliveries onto the ambient tokio runtime.
///
/// Must be used from within a runtime context.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpawnExecutor;

impl ApplyExecutor for SpawnExecutor {
	fn dispatch(&self, task: BoxFuture<'static, ()>) {
		tokio::spawn(task);
	}
}

/// Runs each delivery to completion before returning.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineExecutor;

impl ApplyExecutor for InlineExecutor {
	fn dispatch(&self, task: BoxFuture<'static, ()>) {
		futures::executor::block_on(task);
	}
}

/// Schedules at-most-once apply deliveries for cached evaluations.
pub struct ApplyTracker {
	store: Arc<FlagStore>,
	resolver: Arc<dyn Resolver>,
	executor: Arc<dyn ApplyExecutor>,
}

impl ApplyTracker {
	pub fn new(
		store: Arc<FlagStore>,
		resolver: Arc<dyn Resolver>,
		executor: Arc<dyn ApplyExecutor>,
	) -> Self {
		Self {
			store,
			resolver,
			executor,
		}
	}

	/// Records that an evaluation used the cached value of `flag`.
	///
	/// Synchronous: wins the `Applying` test-and-set or returns without
	/// side effects. On a win, one delivery task is dispatched; its
	/// outcome is persisted as `Applied` or `ApplyFailed`.
	pub fn record_evaluation(&self, flag: &str, resolve_token: &str, fingerprint: &str) {
		if !self.store.begin_apply(flag, fingerprint) {
			return;
		}

		let store = Arc::clone(&self.store);
		let resolver = Arc::clone(&self.resolver);
		let flag = flag.to_string();
		let resolve_token = resolve_token.to_string();
		let fingerprint = fingerprint.to_string();

		self.executor.dispatch(Box::pin(async move {
			let applied_at = Utc::now();
			let status = match resolver.apply(&flag, &resolve_token, applied_at).await {
				Ok(()) => {
					debug!(flag = %flag, "apply delivered");
					ApplyStatus::Applied
				}
				Err(e) => {
					warn!(flag = %flag, error = %e, "apply delivery failed");
					ApplyStatus::ApplyFailed
				}
			};

			if let Err(e) = store.finish_apply(&flag, &fingerprint, status).await {
				warn!(flag = %flag, error = %e, "failed to persist apply status");
			}
		}));
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::cache::FlagStore;
	use crate::resolver::MockResolver;
	use crate::storage::InMemoryStorage;
	use beacon_flags_core::{
		EvaluationContext, FlagsError, ResolveReason, ResolvedValue, StructuredValue,
	};
	use std::sync::Mutex;

	/// Captures dispatched tasks so tests control when deliveries run.
	#[derive(Default)]
	struct ManualExecutor {
		tasks: Mutex<Vec<BoxFuture<'static, ()>>>,
	}

	impl ManualExecutor {
		fn run_all(&self) -> usize {
			let tasks: Vec<_> = std::mem::take(&mut *self.tasks.lock().unwrap());
			let count = tasks.len();
			for task in tasks {
				futures::executor::block_on(task);
			}
			count
		}

		fn pending(&self) -> usize {
			self.tasks.lock().unwrap().len()
		}
	}

	impl ApplyExecutor for ManualExecutor {
		fn dispatch(&self, task: BoxFuture<'static, ()>) {
			self.tasks.lock().unwrap().push(task);
		}
	}

	async fn seeded_store(ctx: &EvaluationContext) -> Arc<FlagStore> {
		let store = Arc::new(FlagStore::new(Arc::new(InMemoryStorage::new())));
		store
			.replace_all(
				vec![ResolvedValue::new("flag", ResolveReason::Match)
					.with_variant("control")
					.with_value(StructuredValue::from([(
						"size",
						StructuredValue::Int(3),
					)]))],
				ctx,
				"token1",
			)
			.await
			.unwrap();
		store
	}

	#[tokio::test]
	async fn delivers_once_and_marks_applied() {
		let ctx = EvaluationContext::new("user1");
		let fp = ctx.fingerprint();
		let store = seeded_store(&ctx).await;

		let mut resolver = MockResolver::new();
		resolver
			.expect_apply()
			.times(1)
			.returning(|_, _, _| Ok(()));

		let tracker = ApplyTracker::new(
			store.clone(),
			Arc::new(resolver),
			Arc::new(InlineExecutor),
		);

		tracker.record_evaluation("flag", "token1", &fp);
		tracker.record_evaluation("flag", "token1", &fp);

		assert_eq!(store.apply_status("flag", &ctx), Some(ApplyStatus::Applied));
	}

	#[tokio::test]
	async fn concurrent_callers_during_delivery_do_not_redeliver() {
		let ctx = EvaluationContext::new("user1");
		let fp = ctx.fingerprint();
		let store = seeded_store(&ctx).await;

		let mut resolver = MockResolver::new();
		resolver
			.expect_apply()
			.times(1)
			.returning(|_, _, _| Ok(()));

		let executor = Arc::new(ManualExecutor::default());
		let tracker = ApplyTracker::new(store.clone(), Arc::new(resolver), executor.clone());

		tracker.record_evaluation("flag", "token1", &fp);
		// Delivery is in flight: the status is already visible...
		assert_eq!(
			store.apply_status("flag", &ctx),
			Some(ApplyStatus::Applying)
		);
		// ...and further evaluations do not schedule more work.
		tracker.record_evaluation("flag", "token1", &fp);
		tracker.record_evaluation("flag", "token1", &fp);
		assert_eq!(executor.pending(), 1);

		assert_eq!(executor.run_all(), 1);
		assert_eq!(store.apply_status("flag", &ctx), Some(ApplyStatus::Applied));
	}

	#[tokio::test]
	async fn failed_delivery_is_retried_on_the_next_evaluation() {
		let ctx = EvaluationContext::new("user1");
		let fp = ctx.fingerprint();
		let store = seeded_store(&ctx).await;

		let mut resolver = MockResolver::new();
		let mut first = true;
		resolver.expect_apply().times(2).returning(move |_, _, _| {
			if first {
				first = false;
				Err(FlagsError::Network("apply failed".to_string()))
			} else {
				Ok(())
			}
		});

		let tracker = ApplyTracker::new(
			store.clone(),
			Arc::new(resolver),
			Arc::new(InlineExecutor),
		);

		tracker.record_evaluation("flag", "token1", &fp);
		assert_eq!(
			store.apply_status("flag", &ctx),
			Some(ApplyStatus::ApplyFailed)
		);

		tracker.record_evaluation("flag", "token1", &fp);
		assert_eq!(store.apply_status("flag", &ctx), Some(ApplyStatus::Applied));
	}

	#[tokio::test]
	async fn unknown_flags_are_ignored() {
		let ctx = EvaluationContext::new("user1");
		let fp = ctx.fingerprint();
		let store = seeded_store(&ctx).await;

		let mut resolver = MockResolver::new();
		resolver.expect_apply().never();

		let tracker = ApplyTracker::new(
			store.clone(),
			Arc::new(resolver),
			Arc::new(InlineExecutor),
		);

		tracker.record_evaluation("unknown", "token1", &fp);
	}
}
