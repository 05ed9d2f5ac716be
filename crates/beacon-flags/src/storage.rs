// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage seam for the persisted flag snapshot.
//!
//! The flag store persists a single serialized snapshot blob under one
//! fixed location. Durability is best effort; a missing or unreadable blob
//! simply means the next resolve starts cold.

use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use beacon_flags_core::{FlagsError, Result};
use tracing::{debug, info};

/// Durable single-blob storage for the flag snapshot.
#[async_trait]
pub trait Storage: Send + Sync {
	async fn load(&self) -> Result<Option<Vec<u8>>>;
	async fn save(&self, bytes: &[u8]) -> Result<()>;
	async fn clear(&self) -> Result<()>;
}

/// File-backed storage with atomic writes.
///
/// Saves go through a temp file followed by a rename so a crashed process
/// never leaves a torn snapshot behind.
pub struct FileStorage {
	path: PathBuf,
}

impl FileStorage {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Default storage location under the XDG data directory.
	pub fn from_xdg() -> Result<Self> {
		let data_dir = dirs::data_dir().ok_or_else(|| {
			FlagsError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				"could not determine XDG data directory",
			))
		})?;

		let flags_dir = data_dir.join("beacon").join("flags");
		std::fs::create_dir_all(&flags_dir)?;

		let path = flags_dir.join("snapshot.json");
		info!(path = %path.display(), "initialized flag snapshot storage");

		Ok(Self::new(path))
	}

	fn tmp_path(&self) -> PathBuf {
		let mut tmp = self.path.as_os_str().to_owned();
		tmp.push(".tmp");
		PathBuf::from(tmp)
	}
}

#[async_trait]
impl Storage for FileStorage {
	async fn load(&self) -> Result<Option<Vec<u8>>> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "no persisted snapshot");
			return Ok(None);
		}

		let bytes = tokio::fs::read(&self.path).await?;
		debug!(path = %self.path.display(), len = bytes.len(), "loaded persisted snapshot");
		Ok(Some(bytes))
	}

	async fn save(&self, bytes: &[u8]) -> Result<()> {
		if let Some(parent) = self.path.parent() {
			tokio::fs::create_dir_all(parent).await?;
		}

		let tmp = self.tmp_path();
		tokio::fs::write(&tmp, bytes).await?;
		tokio::fs::rename(&tmp, &self.path).await?;

		debug!(path = %self.path.display(), len = bytes.len(), "saved snapshot");
		Ok(())
	}

	async fn clear(&self) -> Result<()> {
		if self.path.exists() {
			tokio::fs::remove_file(&self.path).await?;
		}
		Ok(())
	}
}

/// In-memory storage for tests and ephemeral clients.
#[derive(Default)]
pub struct InMemoryStorage {
	blob: Mutex<Option<Vec<u8>>>,
}

impl InMemoryStorage {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
		self.blob
			.lock()
			.unwrap_or_else(std::sync::PoisonError::into_inner)
	}
}

#[async_trait]
impl Storage for InMemoryStorage {
	async fn load(&self) -> Result<Option<Vec<u8>>> {
		Ok(self.lock().clone())
	}

	async fn save(&self, bytes: &[u8]) -> Result<()> {
		*self.lock() = Some(bytes.to_vec());
		Ok(())
	}

	async fn clear(&self) -> Result<()> {
		*self.lock() = None;
		Ok(())
	}
}
