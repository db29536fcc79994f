// Trait seams for the dedup subsystem.
//
// FastCache is the volatile accelerator (set-with-TTL, exists, TTL introspection).
// EntityLedger is the durable source of truth for identity lookups.
// LeadStore + MergeTx expose exactly what a lead merge touches, inside one
// transaction. Dropping a MergeTx without commit() rolls it back.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use leadgen_common::{CompanyId, ContactId, IdentityKey, LeadId};

use crate::error::CacheError;

// ---------------------------------------------------------------------------
// FastCache
// ---------------------------------------------------------------------------

/// Remaining lifetime of a fast-cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    /// Present with no expiry set.
    Persistent,
    Expires(Duration),
}

#[async_trait]
pub trait FastCache: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    /// Write a presence marker that expires after `ttl`.
    async fn set_with_ttl(&self, key: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl, CacheError>;

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheError>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Drop every key whose TTL has lapsed. Returns how many were dropped.
    async fn purge_expired(&self) -> Result<usize, CacheError>;
}

// ---------------------------------------------------------------------------
// EntityLedger
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EntityCounts {
    pub companies: u64,
    pub jobs: u64,
    pub contacts: u64,
    pub leads: u64,
}

#[async_trait]
pub trait EntityLedger: Send + Sync {
    /// Does a durable row carry this identity key?
    async fn identity_exists(&self, key: &IdentityKey) -> Result<bool>;

    async fn entity_counts(&self) -> Result<EntityCounts>;
}

// ---------------------------------------------------------------------------
// LeadStore / MergeTx
// ---------------------------------------------------------------------------

/// Leads sharing the same `(company_id, contact_id)` with a non-null contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    #[serde(rename = "type")]
    pub rule: String,
    pub company_id: CompanyId,
    pub contact_id: ContactId,
    /// Ascending.
    pub lead_ids: Vec<LeadId>,
    pub count: usize,
}

/// The whitelisted fields a merge may change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MergeableLead {
    pub id: LeadId,
    pub notes: Option<String>,
    pub tags: Vec<String>,
}

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>>;

    async fn begin_merge(&self) -> Result<Box<dyn MergeTx>>;
}

#[async_trait]
pub trait MergeTx: Send {
    /// Load (and lock) a lead's mergeable fields.
    async fn load_lead(&mut self, id: LeadId) -> Result<Option<MergeableLead>>;

    /// Point every activity of `from` at `to`. Returns the number moved.
    async fn reassign_activities(&mut self, from: LeadId, to: LeadId) -> Result<u64>;

    async fn delete_lead(&mut self, id: LeadId) -> Result<()>;

    async fn save_lead(&mut self, lead: &MergeableLead) -> Result<()>;

    async fn commit(self: Box<Self>) -> Result<()>;
}
