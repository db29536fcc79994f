//! "Have we seen this entity before?" Fast cache first, durable store on miss.
//!
//! Invariants:
//! - A cache hit implies a durable row (markers are only written by `mark`,
//!   which callers invoke after persisting, or by write-through on a durable hit).
//! - A cache miss says nothing; it always falls back to the durable store.
//! - Absence is never cached.
//! - Cache transport failures degrade to durable-only lookups.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::{debug, info, warn};

use leadgen_common::{EntityKind, IdentityKey};

use crate::error::CacheError;
use crate::traits::{EntityCounts, EntityLedger, FastCache, KeyTtl};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SeenStats {
    pub companies_seen: u64,
    pub jobs_seen: u64,
    pub contacts_seen: u64,
    pub leads_created: u64,
    /// `None` when the fast cache could not be reached.
    pub cache_entries: Option<usize>,
}

/// What a cache sweep removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Markers whose TTL had lapsed.
    pub expired: usize,
    /// Markers that had no expiry at all.
    pub unexpiring: usize,
}

pub struct SeenEntityCache {
    fast: Arc<dyn FastCache>,
    ledger: Arc<dyn EntityLedger>,
    ttl: Duration,
}

impl SeenEntityCache {
    pub fn new(fast: Arc<dyn FastCache>, ledger: Arc<dyn EntityLedger>, ttl: Duration) -> Self {
        Self { fast, ledger, ttl }
    }

    /// Has an entity with this identity been seen?
    ///
    /// Durable-store failures propagate; fast-cache failures do not.
    pub async fn seen(&self, key: &IdentityKey) -> Result<bool> {
        let cache_key = key.cache_key();

        match self.fast.exists(&cache_key).await {
            Ok(true) => {
                debug!(key = %key, "Seen-marker cache hit");
                return Ok(true);
            }
            Ok(false) => {}
            Err(e) => warn!(key = %key, error = %e, "Fast cache unavailable, checking durable store"),
        }

        if !self.ledger.identity_exists(key).await? {
            return Ok(false);
        }

        debug!(key = %key, "Found in durable store, writing through to cache");
        if let Err(e) = self.fast.set_with_ttl(&cache_key, self.ttl).await {
            warn!(key = %key, error = %e, "Seen-marker write-through failed");
        }
        Ok(true)
    }

    /// Record that an entity has been observed. Updates the accelerator only;
    /// persisting the entity itself is the caller's job.
    pub async fn mark(&self, key: &IdentityKey) {
        if let Err(e) = self.fast.set_with_ttl(&key.cache_key(), self.ttl).await {
            warn!(key = %key, error = %e, "Failed to write seen-marker");
        }
    }

    pub async fn is_company_seen(&self, domain: &str) -> Result<bool> {
        self.seen_opt(IdentityKey::company(domain)).await
    }

    pub async fn is_job_posting_seen(&self, source: &str, external_id: &str) -> Result<bool> {
        self.seen_opt(IdentityKey::job(source, external_id)).await
    }

    pub async fn is_contact_seen(&self, email: &str) -> Result<bool> {
        self.seen_opt(IdentityKey::contact(email)).await
    }

    pub async fn mark_company_seen(&self, domain: &str) {
        self.mark_opt(IdentityKey::company(domain)).await
    }

    pub async fn mark_job_posting_seen(&self, source: &str, external_id: &str) {
        self.mark_opt(IdentityKey::job(source, external_id)).await
    }

    pub async fn mark_contact_seen(&self, email: &str) {
        self.mark_opt(IdentityKey::contact(email)).await
    }

    /// Entities without an identity key are never duplicates of anything.
    async fn seen_opt(&self, key: Option<IdentityKey>) -> Result<bool> {
        match key {
            Some(key) => self.seen(&key).await,
            None => Ok(false),
        }
    }

    async fn mark_opt(&self, key: Option<IdentityKey>) {
        if let Some(key) = key {
            self.mark(&key).await;
        }
    }

    /// Cache housekeeping: drop lapsed markers, then delete markers that
    /// were written without an expiry. Advisory and idempotent; it only
    /// touches the accelerator.
    pub async fn sweep(&self) -> Result<SweepReport, CacheError> {
        let expired = self.fast.purge_expired().await?;
        let mut unexpiring = 0;

        for kind in EntityKind::ALL {
            for key in self.fast.keys_with_prefix(&kind.cache_prefix()).await? {
                if self.fast.ttl(&key).await? == KeyTtl::Persistent && self.fast.delete(&key).await? {
                    unexpiring += 1;
                }
            }
        }

        info!(expired, unexpiring, "Swept seen-marker cache");
        Ok(SweepReport {
            expired,
            unexpiring,
        })
    }

    /// Durable row counts plus the current number of seen-markers. No side effects.
    pub async fn stats(&self) -> Result<SeenStats> {
        let EntityCounts {
            companies,
            jobs,
            contacts,
            leads,
        } = self.ledger.entity_counts().await?;

        let cache_entries = match self.fast.keys_with_prefix("seen:").await {
            Ok(keys) => Some(keys.len()),
            Err(e) => {
                warn!(error = %e, "Fast cache unavailable, omitting entry count");
                None
            }
        };

        Ok(SeenStats {
            companies_seen: companies,
            jobs_seen: jobs,
            contacts_seen: contacts,
            leads_created: leads,
            cache_entries,
        })
    }
}
