//! Route planning over stored leads.
//!
//! lead ids → leads with companies → filter to routable addresses →
//! geocode companies lacking coordinates (once each, memoized on the company)
//! → sequence → map link → log a `route_planned` activity per lead.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use leadgen_common::{CompanyId, LeadId, LeadWithCompany};

use crate::error::RouteError;
use crate::geo::Coordinate;
use crate::geocoder::{geocode_bounded, Geocoder};
use crate::map_link::MapLinkBuilder;
use crate::sequencer::{plan_stops, RoutePlan, RouteStop};

/// What route planning needs from the durable store.
#[async_trait]
pub trait RouteLeadSource: Send + Sync {
    /// Existing leads among `lead_ids`, joined with their company, in any order.
    async fn leads_with_companies(&self, lead_ids: &[LeadId]) -> Result<Vec<LeadWithCompany>>;

    /// Memoize a geocode result on the company record.
    async fn save_company_coordinates(&self, company_id: CompanyId, coordinate: Coordinate) -> Result<()>;

    /// Append a `route_planned` activity to each lead.
    async fn record_route_planned(&self, lead_ids: &[LeadId]) -> Result<()>;
}

fn default_optimize() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoutePlanRequest {
    pub lead_ids: Vec<LeadId>,
    #[serde(default)]
    pub start_location: Option<String>,
    #[serde(default = "default_optimize")]
    pub optimize: bool,
}

pub struct RoutePlanner {
    source: Arc<dyn RouteLeadSource>,
    geocoder: Arc<dyn Geocoder>,
    map_links: MapLinkBuilder,
    geocode_timeout: Duration,
}

impl RoutePlanner {
    pub fn new(
        source: Arc<dyn RouteLeadSource>,
        geocoder: Arc<dyn Geocoder>,
        map_links: MapLinkBuilder,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            source,
            geocoder,
            map_links,
            geocode_timeout,
        }
    }

    pub async fn plan(&self, request: &RoutePlanRequest) -> Result<RoutePlan, RouteError> {
        let loaded = self.source.leads_with_companies(&request.lead_ids).await?;
        let leads = in_request_order(loaded, &request.lead_ids);
        if leads.is_empty() {
            return Err(RouteError::NoLeadsFound);
        }

        let mut routable: Vec<LeadWithCompany> = leads
            .into_iter()
            .filter(|l| l.company.has_routable_address())
            .collect();
        if routable.is_empty() {
            return Err(RouteError::NoAddressableLeads);
        }

        self.geocode_companies(&mut routable).await?;

        let mut localities: HashMap<LeadId, String> = HashMap::new();
        let stops: Vec<RouteStop> = routable
            .iter()
            .filter_map(|l| {
                let (lat, lng) = l.company.coordinates()?;
                localities.insert(l.lead_id, l.company.locality_label());
                Some(RouteStop {
                    lead_id: l.lead_id,
                    company_name: l.company.name.clone(),
                    address: l.company.formatted_address(),
                    coordinate: Coordinate::new(lat, lng),
                })
            })
            .collect();
        if stops.is_empty() {
            return Err(RouteError::NoGeocodedStops);
        }

        let start_location = request
            .start_location
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let start = match start_location {
            Some(address) => {
                let coord = geocode_bounded(self.geocoder.as_ref(), address, self.geocode_timeout).await;
                if coord.is_none() {
                    warn!(address, "Start location could not be geocoded, planning without it");
                }
                coord
            }
            None => None,
        };

        let stop_count = stops.len();
        let mut plan = plan_stops(stops, start, request.optimize)?;

        let waypoints: Vec<String> = plan
            .stops
            .iter()
            .filter_map(|s| localities.get(&s.lead_id).cloned())
            .collect();
        plan.map_url = self.map_links.build(&waypoints, start_location);

        let lead_ids: Vec<LeadId> = routable.iter().map(|l| l.lead_id).collect();
        self.source.record_route_planned(&lead_ids).await?;

        info!(
            requested = request.lead_ids.len(),
            stops = stop_count,
            total_miles = plan.total_distance,
            minutes = plan.estimated_duration,
            "Route planned"
        );
        Ok(plan)
    }

    /// Geocode each company lacking coordinates at most once per call.
    /// Failures leave the company un-geocoded; it simply drops out of the plan.
    async fn geocode_companies(&self, leads: &mut [LeadWithCompany]) -> Result<()> {
        let mut resolved: HashMap<CompanyId, Coordinate> = HashMap::new();
        let mut attempted: HashSet<CompanyId> = HashSet::new();

        for lead in leads.iter() {
            let company = &lead.company;
            if company.coordinates().is_some() || !attempted.insert(company.id) {
                continue;
            }

            let address = company.formatted_address();
            match geocode_bounded(self.geocoder.as_ref(), &address, self.geocode_timeout).await {
                Some(coord) => {
                    self.source.save_company_coordinates(company.id, coord).await?;
                    info!(company = company.name.as_str(), lat = coord.lat, lng = coord.lng, "Geocoded company");
                    resolved.insert(company.id, coord);
                }
                None => warn!(company = company.name.as_str(), "Company could not be geocoded, skipping"),
            }
        }

        for lead in leads.iter_mut() {
            if let Some(coord) = resolved.get(&lead.company.id) {
                lead.company.latitude = Some(coord.lat);
                lead.company.longitude = Some(coord.lng);
            }
        }
        Ok(())
    }
}

/// Put loaded leads back in the caller's order. Repeated ids keep their
/// first position; ids that did not load are dropped.
fn in_request_order(leads: Vec<LeadWithCompany>, lead_ids: &[LeadId]) -> Vec<LeadWithCompany> {
    let mut by_id: HashMap<LeadId, LeadWithCompany> =
        leads.into_iter().map(|l| (l.lead_id, l)).collect();
    lead_ids.iter().filter_map(|id| by_id.remove(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryLeadSource, StaticGeocoder};
    use leadgen_common::Company;

    fn company(id: CompanyId, name: &str, address: &str, city: &str) -> Company {
        Company {
            id,
            name: name.to_string(),
            address: Some(address.to_string()),
            city: Some(city.to_string()),
            state: Some("MN".to_string()),
            zip_code: None,
            ..Default::default()
        }
    }

    fn planner(source: &Arc<MemoryLeadSource>, geocoder: StaticGeocoder, key: Option<&str>) -> RoutePlanner {
        RoutePlanner::new(
            source.clone(),
            Arc::new(geocoder),
            MapLinkBuilder::new(key.map(str::to_string)),
            Duration::from_secs(5),
        )
    }

    fn request(lead_ids: &[LeadId]) -> RoutePlanRequest {
        RoutePlanRequest {
            lead_ids: lead_ids.to_vec(),
            start_location: None,
            optimize: true,
        }
    }

    #[tokio::test]
    async fn unknown_leads_are_reported() {
        let source = Arc::new(MemoryLeadSource::new());
        let err = planner(&source, StaticGeocoder::new(), None)
            .plan(&request(&[1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::NoLeadsFound));
    }

    #[tokio::test]
    async fn leads_without_street_or_city_are_reported() {
        let source = Arc::new(MemoryLeadSource::new());
        let mut c = company(1, "Acme", "100 Main St", "");
        c.city = None;
        source.add_lead(10, c);

        let err = planner(&source, StaticGeocoder::new(), None)
            .plan(&request(&[10]))
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::NoAddressableLeads));
    }

    #[tokio::test]
    async fn nothing_geocodable_is_reported() {
        let source = Arc::new(MemoryLeadSource::new());
        source.add_lead(10, company(1, "Acme", "100 Main St", "Minneapolis"));

        let err = planner(&source, StaticGeocoder::new(), None)
            .plan(&request(&[10]))
            .await
            .unwrap_err();
        assert!(matches!(err, RouteError::NoGeocodedStops));
    }

    #[tokio::test]
    async fn geocodes_once_per_company_and_caches_on_company() {
        let source = Arc::new(MemoryLeadSource::new());
        let acme = company(1, "Acme", "100 Main St", "Minneapolis");
        source.add_lead(10, acme.clone());
        source.add_lead(11, acme.clone());
        let geocoder = StaticGeocoder::new().with(&acme.formatted_address(), Coordinate::new(44.98, -93.27));
        let calls = geocoder.call_counter();
        let planner = planner(&source, geocoder, None);

        let plan = planner.plan(&request(&[10, 11])).await.unwrap();
        assert_eq!(plan.stops.len(), 2);
        assert_eq!(calls.get(), 1);
        assert_eq!(source.company(1).unwrap().coordinates(), Some((44.98, -93.27)));

        planner.plan(&request(&[10, 11])).await.unwrap();
        assert_eq!(calls.get(), 1, "cached coordinates are reused across calls");
    }

    #[tokio::test]
    async fn ungeocodable_company_is_dropped_not_fatal() {
        let source = Arc::new(MemoryLeadSource::new());
        let acme = company(1, "Acme", "100 Main St", "Minneapolis");
        let ghost = company(2, "Ghost", "1 Nowhere Rd", "Atlantis");
        source.add_lead(10, acme.clone());
        source.add_lead(11, ghost.clone());
        let geocoder = StaticGeocoder::new()
            .with(&acme.formatted_address(), Coordinate::new(44.98, -93.27))
            .failing_on(&ghost.formatted_address());

        let plan = planner(&source, geocoder, None).plan(&request(&[10, 11])).await.unwrap();

        assert_eq!(plan.stops.len(), 1);
        assert_eq!(plan.stops[0].lead_id, 10);
        assert_eq!(source.company(2).unwrap().coordinates(), None);
    }

    #[tokio::test]
    async fn plan_orders_stops_and_builds_map_link() {
        let source = Arc::new(MemoryLeadSource::new());
        let mut a = company(1, "A", "1 First St", "Alpha");
        a.latitude = Some(0.0);
        a.longitude = Some(0.0);
        let mut b = company(2, "B", "2 Second St", "Bravo");
        b.latitude = Some(0.0);
        b.longitude = Some(3.0);
        let mut c = company(3, "C", "3 Third St", "Charlie");
        c.latitude = Some(0.0);
        c.longitude = Some(1.0);
        source.add_lead(10, a);
        source.add_lead(11, b);
        source.add_lead(12, c);

        let plan = planner(&source, StaticGeocoder::new(), Some("maps-key"))
            .plan(&request(&[10, 11, 12]))
            .await
            .unwrap();

        let order: Vec<LeadId> = plan.stops.iter().map(|s| s.lead_id).collect();
        assert_eq!(order, vec![10, 12, 11]);
        assert_eq!(plan.stops[0].address, "1 First St, Alpha, MN");
        let link = plan.map_url.unwrap();
        assert!(link.contains("origin=Alpha%2C+MN"));
        assert!(link.contains("destination=Bravo%2C+MN"));
    }

    fn placed(id: CompanyId, city: &str, lat: f64, lng: f64) -> Company {
        let mut c = company(id, city, "1 Any St", city);
        c.latitude = Some(lat);
        c.longitude = Some(lng);
        c
    }

    #[tokio::test]
    async fn unoptimized_plan_keeps_caller_order() {
        let source = Arc::new(MemoryLeadSource::new());
        source.add_lead(10, placed(1, "Alpha", 0.0, 0.0));
        source.add_lead(11, placed(2, "Bravo", 0.0, 1.0));
        source.add_lead(12, placed(3, "Charlie", 0.0, 2.0));

        let mut req = request(&[12, 10, 11, 12]);
        req.optimize = false;
        let plan = planner(&source, StaticGeocoder::new(), None).plan(&req).await.unwrap();

        let order: Vec<LeadId> = plan.stops.iter().map(|s| s.lead_id).collect();
        assert_eq!(order, vec![12, 10, 11]);
        assert_eq!(source.route_planned_leads(), vec![12, 10, 11]);
    }

    #[tokio::test]
    async fn greedy_tour_starts_from_first_requested_lead() {
        let source = Arc::new(MemoryLeadSource::new());
        source.add_lead(10, placed(1, "Alpha", 0.0, 0.0));
        source.add_lead(11, placed(2, "Bravo", 0.0, 1.0));
        source.add_lead(12, placed(3, "Charlie", 0.0, 3.0));

        let plan = planner(&source, StaticGeocoder::new(), None)
            .plan(&request(&[12, 11, 10]))
            .await
            .unwrap();

        let order: Vec<LeadId> = plan.stops.iter().map(|s| s.lead_id).collect();
        assert_eq!(order, vec![12, 11, 10]);
    }

    #[tokio::test]
    async fn start_location_is_geocoded_and_used() {
        let source = Arc::new(MemoryLeadSource::new());
        let mut a = company(1, "A", "1 First St", "Alpha");
        a.latitude = Some(0.0);
        a.longitude = Some(0.0);
        let mut b = company(2, "B", "2 Second St", "Bravo");
        b.latitude = Some(0.0);
        b.longitude = Some(3.0);
        source.add_lead(10, a);
        source.add_lead(11, b);
        let geocoder = StaticGeocoder::new().with("Depot", Coordinate::new(0.0, 2.5));

        let mut req = request(&[10, 11]);
        req.start_location = Some("Depot".into());
        let plan = planner(&source, geocoder, None).plan(&req).await.unwrap();

        let order: Vec<LeadId> = plan.stops.iter().map(|s| s.lead_id).collect();
        assert_eq!(order, vec![11, 10]);
        assert!(plan.stops[0].distance_from_previous > 0.0);
        assert_eq!(plan.map_url, None);
    }

    #[tokio::test]
    async fn ungeocodable_start_location_is_ignored() {
        let source = Arc::new(MemoryLeadSource::new());
        let mut a = company(1, "A", "1 First St", "Alpha");
        a.latitude = Some(0.0);
        a.longitude = Some(0.0);
        source.add_lead(10, a);

        let mut req = request(&[10]);
        req.start_location = Some("Nowhere".into());
        let plan = planner(&source, StaticGeocoder::new(), None).plan(&req).await.unwrap();

        assert_eq!(plan.total_distance, 0.0);
        assert_eq!(plan.estimated_duration, 30);
    }

    #[tokio::test]
    async fn planned_leads_get_an_activity() {
        let source = Arc::new(MemoryLeadSource::new());
        let mut a = company(1, "A", "1 First St", "Alpha");
        a.latitude = Some(0.0);
        a.longitude = Some(0.0);
        source.add_lead(10, a);
        let mut no_city = company(2, "B", "2 Second St", "");
        no_city.city = None;
        source.add_lead(11, no_city);

        planner(&source, StaticGeocoder::new(), None)
            .plan(&request(&[10, 11]))
            .await
            .unwrap();

        assert_eq!(source.route_planned_leads(), vec![10]);
    }
}
