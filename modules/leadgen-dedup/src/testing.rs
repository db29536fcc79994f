// In-memory doubles for the dedup seams.
//
// - MemoryStore (EntityLedger + LeadStore): BTreeMap-backed entities; merge
//   transactions stage a copy of the state and swap it in on commit.
// - FailingCache (FastCache): every call fails, as if the cache were down.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use leadgen_common::{
    normalize_domain, normalize_email, Company, CompanyId, Contact, ContactId, IdentityKey,
    JobPosting, JobPostingId, Lead, LeadActivity, LeadId,
};

use crate::error::CacheError;
use crate::traits::{
    DuplicateGroup, EntityCounts, EntityLedger, FastCache, KeyTtl, LeadStore, MergeTx,
    MergeableLead,
};

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
struct State {
    next_id: i64,
    companies: BTreeMap<CompanyId, Company>,
    contacts: BTreeMap<ContactId, Contact>,
    jobs: BTreeMap<JobPostingId, JobPosting>,
    leads: BTreeMap<LeadId, Lead>,
    activities: Vec<LeadActivity>,
    fail_delete: HashSet<LeadId>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
    fail_ledger_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("memory store poisoned")
    }

    pub fn add_company_with_domain(&self, name: &str, domain: &str) -> CompanyId {
        let mut state = self.state();
        let id = state.next_id();
        state.companies.insert(
            id,
            Company {
                id,
                name: name.to_string(),
                domain: normalize_domain(domain),
                ..Default::default()
            },
        );
        id
    }

    pub fn add_contact(&self, company_id: CompanyId, email: &str) -> ContactId {
        let mut state = self.state();
        let id = state.next_id();
        state.contacts.insert(
            id,
            Contact {
                id,
                company_id,
                first_name: "Test".into(),
                last_name: format!("Contact{id}"),
                email: normalize_email(email),
                ..Default::default()
            },
        );
        id
    }

    pub fn add_job_posting(&self, company_id: CompanyId, source: &str, external_id: &str) -> JobPostingId {
        let mut state = self.state();
        let id = state.next_id();
        state.jobs.insert(
            id,
            JobPosting {
                id,
                company_id,
                title: "Warehouse Associate".into(),
                source: source.to_string(),
                external_id: Some(external_id.to_string()),
                ..Default::default()
            },
        );
        id
    }

    pub fn add_lead(&self, company_id: CompanyId, contact_id: Option<ContactId>) -> LeadId {
        let mut state = self.state();
        let id = state.next_id();
        let mut lead = Lead::new(id, company_id);
        lead.contact_id = contact_id;
        state.leads.insert(id, lead);
        id
    }

    pub fn add_activity(&self, lead_id: LeadId, activity_type: &str) -> i64 {
        let mut state = self.state();
        let id = state.next_id();
        state.activities.push(LeadActivity {
            id,
            lead_id,
            activity_type: activity_type.to_string(),
            description: None,
            metadata: None,
            created_at: Utc::now(),
        });
        id
    }

    pub fn set_notes_and_tags(&self, lead_id: LeadId, notes: Option<&str>, tags: &[&str]) {
        if let Some(lead) = self.state().leads.get_mut(&lead_id) {
            lead.notes = notes.map(str::to_string);
            lead.tags = tags.iter().map(|t| t.to_string()).collect();
        }
    }

    pub fn set_score_and_script(&self, lead_id: LeadId, score: f64, script: &str) {
        if let Some(lead) = self.state().leads.get_mut(&lead_id) {
            lead.score = Some(score);
            lead.call_script = Some(script.to_string());
        }
    }

    pub fn lead(&self, id: LeadId) -> Option<Lead> {
        self.state().leads.get(&id).cloned()
    }

    pub fn activity_count(&self, lead_id: LeadId) -> usize {
        self.state()
            .activities
            .iter()
            .filter(|a| a.lead_id == lead_id)
            .count()
    }

    pub fn total_activities(&self) -> usize {
        self.state().activities.len()
    }

    /// Make deleting this lead inside a merge fail.
    pub fn fail_delete_of(&self, lead_id: LeadId) {
        self.state().fail_delete.insert(lead_id);
    }

    /// Make every EntityLedger call fail.
    pub fn fail_ledger_reads(&self, fail: bool) {
        self.fail_ledger_reads.store(fail, Ordering::SeqCst);
    }

    fn check_ledger(&self) -> Result<()> {
        if self.fail_ledger_reads.load(Ordering::SeqCst) {
            bail!("durable store unavailable");
        }
        Ok(())
    }
}

#[async_trait]
impl EntityLedger for MemoryStore {
    async fn identity_exists(&self, key: &IdentityKey) -> Result<bool> {
        self.check_ledger()?;
        let state = self.state();
        Ok(match key {
            IdentityKey::Company { domain } => state
                .companies
                .values()
                .any(|c| c.domain.as_deref() == Some(domain.as_str())),
            IdentityKey::Job {
                source,
                external_id,
            } => state.jobs.values().any(|j| {
                j.source == *source && j.external_id.as_deref() == Some(external_id.as_str())
            }),
            IdentityKey::Contact { email } => state
                .contacts
                .values()
                .any(|c| c.email.as_deref() == Some(email.as_str())),
        })
    }

    async fn entity_counts(&self) -> Result<EntityCounts> {
        self.check_ledger()?;
        let state = self.state();
        Ok(EntityCounts {
            companies: state.companies.len() as u64,
            jobs: state.jobs.len() as u64,
            contacts: state.contacts.len() as u64,
            leads: state.leads.len() as u64,
        })
    }
}

#[async_trait]
impl LeadStore for MemoryStore {
    async fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let state = self.state();
        let mut by_pair: BTreeMap<(CompanyId, ContactId), Vec<LeadId>> = BTreeMap::new();
        for lead in state.leads.values() {
            if let Some(contact_id) = lead.contact_id {
                by_pair
                    .entry((lead.company_id, contact_id))
                    .or_default()
                    .push(lead.id);
            }
        }

        Ok(by_pair
            .into_iter()
            .filter(|(_, ids)| ids.len() > 1)
            .map(|((company_id, contact_id), lead_ids)| DuplicateGroup {
                rule: "company_contact".to_string(),
                company_id,
                contact_id,
                count: lead_ids.len(),
                lead_ids,
            })
            .collect())
    }

    async fn begin_merge(&self) -> Result<Box<dyn MergeTx>> {
        let staged = self.state().clone();
        Ok(Box::new(MemoryMergeTx {
            shared: self.state.clone(),
            staged,
        }))
    }
}

struct MemoryMergeTx {
    shared: Arc<Mutex<State>>,
    staged: State,
}

#[async_trait]
impl MergeTx for MemoryMergeTx {
    async fn load_lead(&mut self, id: LeadId) -> Result<Option<MergeableLead>> {
        Ok(self.staged.leads.get(&id).map(|l| MergeableLead {
            id: l.id,
            notes: l.notes.clone(),
            tags: l.tags.clone(),
        }))
    }

    async fn reassign_activities(&mut self, from: LeadId, to: LeadId) -> Result<u64> {
        let mut moved = 0;
        for activity in self.staged.activities.iter_mut().filter(|a| a.lead_id == from) {
            activity.lead_id = to;
            moved += 1;
        }
        Ok(moved)
    }

    async fn delete_lead(&mut self, id: LeadId) -> Result<()> {
        if self.staged.fail_delete.contains(&id) {
            bail!("delete of lead {id} failed");
        }
        self.staged.leads.remove(&id);
        Ok(())
    }

    async fn save_lead(&mut self, lead: &MergeableLead) -> Result<()> {
        let Some(stored) = self.staged.leads.get_mut(&lead.id) else {
            bail!("lead {} vanished mid-merge", lead.id);
        };
        stored.notes = lead.notes.clone();
        stored.tags = lead.tags.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryMergeTx { shared, staged } = *self;
        *shared.lock().expect("memory store poisoned") = staged;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FailingCache
// ---------------------------------------------------------------------------

/// A fast cache that is always unreachable.
pub struct FailingCache;

#[async_trait]
impl FastCache for FailingCache {
    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn set_with_ttl(&self, _key: &str, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn ttl(&self, _key: &str) -> Result<KeyTtl, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn keys_with_prefix(&self, _prefix: &str) -> Result<Vec<String>, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn delete(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }

    async fn purge_expired(&self) -> Result<usize, CacheError> {
        Err(CacheError::Unavailable("connection refused".into()))
    }
}
