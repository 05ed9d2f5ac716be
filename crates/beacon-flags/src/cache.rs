// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Persistent flag store.
//!
//! The store holds exactly one active [`CacheSnapshot`] — the resolved
//! flags for one context fingerprint plus the resolve token that produced
//! them. A refresh replaces the snapshot wholesale; it is never merged
//! field by field. The only in-place mutation is each flag's apply status,
//! which the apply tracker owns.
//!
//! Lookups validate the requesting context's fingerprint against the
//! snapshot's: a mismatch yields [`CacheLookup::Stale`], never the value.
//!
//! Reads and the `Applying` transition touch memory only; terminal apply
//! statuses and snapshot replacement are persisted through the [`Storage`]
//! seam so a restarted process can reload the snapshot without
//! re-resolving.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use beacon_flags_core::{
	ApplyStatus, EvaluationContext, ResolvedFlag, ResolvedValue, Result,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::Storage;

/// The persisted form of the active cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSnapshot {
	pub context_fingerprint: String,
	pub resolve_token: String,
	pub flags: BTreeMap<String, ResolvedFlag>,
	pub saved_at: DateTime<Utc>,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
	/// The flag was resolved under the requesting context.
	Found {
		flag: ResolvedFlag,
		resolve_token: String,
	},
	/// The flag is present but was resolved under a different context.
	Stale,
	/// The flag is not in the active snapshot.
	Absent,
}

/// Durable cache of resolved flags for a single context.
pub struct FlagStore {
	snapshot: RwLock<Option<CacheSnapshot>>,
	storage: Arc<dyn Storage>,
}

impl FlagStore {
	pub fn new(storage: Arc<dyn Storage>) -> Self {
		Self {
			snapshot: RwLock::new(None),
			storage,
		}
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<CacheSnapshot>> {
		self.snapshot.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<CacheSnapshot>> {
		self.snapshot
			.write()
			.unwrap_or_else(PoisonError::into_inner)
	}

	/// Atomically replaces the active snapshot with freshly resolved flags
	/// and persists it. Readers observe either the old snapshot or the new
	/// one, never a mix.
	pub async fn replace_all(
		&self,
		resolved: Vec<ResolvedValue>,
		context: &EvaluationContext,
		resolve_token: impl Into<String>,
	) -> Result<()> {
		let snapshot = CacheSnapshot {
			context_fingerprint: context.fingerprint(),
			resolve_token: resolve_token.into(),
			flags: resolved
				.into_iter()
				.map(|value| (value.flag.clone(), ResolvedFlag::new(value)))
				.collect(),
			saved_at: Utc::now(),
		};

		let bytes = serde_json::to_vec(&snapshot)?;
		*self.write() = Some(snapshot);

		self.storage.save(&bytes).await?;
		Ok(())
	}

	/// Looks up a flag for the given context.
	pub fn get(&self, flag: &str, context: &EvaluationContext) -> CacheLookup {
		self.get_by_fingerprint(flag, &context.fingerprint())
	}

	/// Looks up a flag against a precomputed context fingerprint.
	pub fn get_by_fingerprint(&self, flag: &str, fingerprint: &str) -> CacheLookup {
		let guard = self.read();
		let Some(snapshot) = guard.as_ref() else {
			return CacheLookup::Absent;
		};

		match snapshot.flags.get(flag) {
			None => CacheLookup::Absent,
			Some(_) if snapshot.context_fingerprint != fingerprint => CacheLookup::Stale,
			Some(resolved) => CacheLookup::Found {
				flag: resolved.clone(),
				resolve_token: snapshot.resolve_token.clone(),
			},
		}
	}

	/// Synchronous test-and-set for apply delivery: moves the flag to
	/// `Applying` and returns `true` iff the caller should deliver.
	///
	/// Exactly one of any number of concurrent callers wins; callers
	/// racing an in-flight delivery (`Applying`) or a completed one
	/// (`Applied`) get `false`. Memory-only — the evaluation path never
	/// does I/O.
	pub fn begin_apply(&self, flag: &str, fingerprint: &str) -> bool {
		let mut guard = self.write();
		let Some(snapshot) = guard.as_mut() else {
			return false;
		};
		if snapshot.context_fingerprint != fingerprint {
			return false;
		}
		let Some(entry) = snapshot.flags.get_mut(flag) else {
			return false;
		};

		match entry.apply_status {
			ApplyStatus::NotApplied | ApplyStatus::ApplyFailed => {
				entry.apply_status = ApplyStatus::Applying;
				true
			}
			ApplyStatus::Applying | ApplyStatus::Applied => false,
		}
	}

	/// Records the terminal status of a delivery attempt and persists the
	/// snapshot.
	///
	/// If the active snapshot's fingerprint no longer matches, the context
	/// changed while the delivery was in flight; the old snapshot was
	/// discarded wholesale, so the update is dropped and the new snapshot
	/// stays untouched.
	pub async fn finish_apply(
		&self,
		flag: &str,
		fingerprint: &str,
		status: ApplyStatus,
	) -> Result<()> {
		let bytes = {
			let mut guard = self.write();
			let Some(snapshot) = guard.as_mut() else {
				return Ok(());
			};
			if snapshot.context_fingerprint != fingerprint {
				debug!(
					flag = %flag,
					"context changed during apply delivery, dropping status update"
				);
				return Ok(());
			}
			let Some(entry) = snapshot.flags.get_mut(flag) else {
				return Ok(());
			};
			entry.apply_status = status;
			serde_json::to_vec(&*snapshot)?
		};

		self.storage.save(&bytes).await?;
		Ok(())
	}

	/// Current apply status of a flag under the given context, if cached.
	pub fn apply_status(&self, flag: &str, context: &EvaluationContext) -> Option<ApplyStatus> {
		let fingerprint = context.fingerprint();
		let guard = self.read();
		let snapshot = guard.as_ref()?;
		if snapshot.context_fingerprint != fingerprint {
			return None;
		}
		snapshot.flags.get(flag).map(|entry| entry.apply_status)
	}

	/// Reloads the last persisted snapshot. Returns `true` when a snapshot
	/// was restored.
	///
	/// A flag stored as `Applying` had a delivery in flight when the
	/// process stopped; it is degraded to `NotApplied` so the next
	/// evaluation retries instead of wedging.
	pub async fn load_persisted(&self) -> Result<bool> {
		let Some(bytes) = self.storage.load().await? else {
			return Ok(false);
		};

		let mut snapshot: CacheSnapshot = match serde_json::from_slice(&bytes) {
			Ok(snapshot) => snapshot,
			Err(e) => {
				warn!(error = %e, "failed to parse persisted snapshot, starting cold");
				return Ok(false);
			}
		};

		for entry in snapshot.flags.values_mut() {
			if entry.apply_status == ApplyStatus::Applying {
				entry.apply_status = ApplyStatus::NotApplied;
			}
		}

		debug!(
			flags = snapshot.flags.len(),
			fingerprint = %snapshot.context_fingerprint,
			"restored persisted snapshot"
		);
		*self.write() = Some(snapshot);
		Ok(true)
	}

	/// Drops the active snapshot and all persisted state.
	pub async fn clear(&self) -> Result<()> {
		*self.write() = None;
		self.storage.clear().await
	}
}
