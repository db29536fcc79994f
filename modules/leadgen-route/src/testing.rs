// In-memory doubles for the route seams.
//
// - StaticGeocoder (Geocoder): fixed address table, optional delay, forced
//   failures, and a shared call counter.
// - MemoryLeadSource (RouteLeadSource): companies and leads in BTreeMaps;
//   records saved coordinates and route_planned activities.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use leadgen_common::{Company, CompanyId, LeadId, LeadWithCompany};

use crate::geo::Coordinate;
use crate::geocoder::Geocoder;
use crate::planner::RouteLeadSource;

// ---------------------------------------------------------------------------
// StaticGeocoder
// ---------------------------------------------------------------------------

/// Shared handle onto a geocoder's call count; survives moving the geocoder
/// into an `Arc<dyn Geocoder>`.
#[derive(Debug, Clone, Default)]
pub struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
pub struct StaticGeocoder {
    known: HashMap<String, Coordinate>,
    failing: HashSet<String>,
    delay: Option<Duration>,
    calls: CallCounter,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, address: &str, coordinate: Coordinate) -> Self {
        self.known.insert(address.to_string(), coordinate);
        self
    }

    pub fn failing_on(mut self, address: &str) -> Self {
        self.failing.insert(address.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_counter(&self) -> CallCounter {
        self.calls.clone()
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<Coordinate>> {
        self.calls.bump();
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.contains(address) {
            bail!("geocoder unavailable for {address}");
        }
        Ok(self.known.get(address).copied())
    }
}

// ---------------------------------------------------------------------------
// MemoryLeadSource
// ---------------------------------------------------------------------------

#[derive(Default)]
struct SourceState {
    companies: BTreeMap<CompanyId, Company>,
    leads: BTreeMap<LeadId, CompanyId>,
    route_planned: Vec<LeadId>,
}

#[derive(Default)]
pub struct MemoryLeadSource {
    state: Mutex<SourceState>,
}

impl MemoryLeadSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SourceState> {
        self.state.lock().expect("lead source poisoned")
    }

    /// Adds (or replaces) the company and points `lead_id` at it.
    pub fn add_lead(&self, lead_id: LeadId, company: Company) {
        let mut state = self.state();
        state.leads.insert(lead_id, company.id);
        state.companies.insert(company.id, company);
    }

    pub fn company(&self, id: CompanyId) -> Option<Company> {
        self.state().companies.get(&id).cloned()
    }

    /// Lead ids that received a `route_planned` activity, in recording order.
    pub fn route_planned_leads(&self) -> Vec<LeadId> {
        self.state().route_planned.clone()
    }
}

#[async_trait]
impl RouteLeadSource for MemoryLeadSource {
    async fn leads_with_companies(&self, lead_ids: &[LeadId]) -> Result<Vec<LeadWithCompany>> {
        let state = self.state();
        let wanted: HashSet<LeadId> = lead_ids.iter().copied().collect();
        Ok(state
            .leads
            .iter()
            .filter(|(id, _)| wanted.contains(*id))
            .filter_map(|(id, company_id)| {
                state.companies.get(company_id).map(|company| LeadWithCompany {
                    lead_id: *id,
                    company: company.clone(),
                })
            })
            .collect())
    }

    async fn save_company_coordinates(&self, company_id: CompanyId, coordinate: Coordinate) -> Result<()> {
        let mut state = self.state();
        let Some(company) = state.companies.get_mut(&company_id) else {
            bail!("company {company_id} not found");
        };
        company.latitude = Some(coordinate.lat);
        company.longitude = Some(coordinate.lng);
        Ok(())
    }

    async fn record_route_planned(&self, lead_ids: &[LeadId]) -> Result<()> {
        self.state().route_planned.extend_from_slice(lead_ids);
        Ok(())
    }
}
