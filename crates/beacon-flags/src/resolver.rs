// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Resolver seam.
//!
//! The SDK treats resolution and apply reporting as black boxes behind the
//! [`Resolver`] trait: resolve returns the flag values for a context plus
//! an opaque token, and apply reports that a resolved flag was actually
//! used, correlating through that token. [`HttpResolver`] is the
//! production implementation; tests substitute their own.

use async_trait::async_trait;
use beacon_flags_core::{EvaluationContext, FlagsError, ResolvedValue, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Everything a resolve returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveResponse {
	pub resolved: Vec<ResolvedValue>,
	pub resolve_token: String,
}

/// Remote flag resolution and apply reporting.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
	/// Resolves all flags for the given context.
	async fn resolve(&self, context: &EvaluationContext) -> Result<ResolveResponse>;

	/// Reports that a resolved flag was applied at `applied_at`.
	async fn apply(
		&self,
		flag: &str,
		resolve_token: &str,
		applied_at: DateTime<Utc>,
	) -> Result<()>;
}

/// HTTP resolver speaking JSON to the Beacon resolver service.
pub struct HttpResolver {
	client: reqwest::Client,
	base_url: String,
	client_secret: String,
}

#[derive(Serialize)]
struct ResolveRequest<'a> {
	client_secret: &'a str,
	evaluation_context: &'a EvaluationContext,
}

#[derive(Serialize)]
struct ApplyRequest<'a> {
	client_secret: &'a str,
	resolve_token: &'a str,
	flags: Vec<AppliedFlag<'a>>,
}

#[derive(Serialize)]
struct AppliedFlag<'a> {
	flag: &'a str,
	apply_time: DateTime<Utc>,
}

impl HttpResolver {
	pub fn new(base_url: impl Into<String>, client_secret: impl Into<String>) -> Self {
		Self {
			client: reqwest::Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			client_secret: client_secret.into(),
		}
	}

	async fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<reqwest::Response> {
		let url = format!("{}/v1/flags:{endpoint}", self.base_url);
		let response = self
			.client
			.post(&url)
			.json(body)
			.send()
			.await
			.map_err(|e| FlagsError::Network(e.to_string()))?;

		let status = response.status();
		if !status.is_success() {
			let message = response.text().await.unwrap_or_default();
			return Err(FlagsError::Network(format!(
				"{endpoint} failed with status {status}: {message}"
			)));
		}

		Ok(response)
	}
}

#[async_trait]
impl Resolver for HttpResolver {
	async fn resolve(&self, context: &EvaluationContext) -> Result<ResolveResponse> {
		let request = ResolveRequest {
			client_secret: &self.client_secret,
			evaluation_context: context,
		};

		let response = self.post("resolve", &request).await?;
		let resolved: ResolveResponse = response
			.json()
			.await
			.map_err(|e| FlagsError::Network(e.to_string()))?;

		debug!(flags = resolved.resolved.len(), "resolved flags");
		Ok(resolved)
	}

	async fn apply(
		&self,
		flag: &str,
		resolve_token: &str,
		applied_at: DateTime<Utc>,
	) -> Result<()> {
		let request = ApplyRequest {
			client_secret: &self.client_secret,
			resolve_token,
			flags: vec![AppliedFlag {
				flag,
				apply_time: applied_at,
			}],
		};

		self.post("apply", &request).await?;
		debug!(flag = %flag, "reported apply");
		Ok(())
	}
}
