//! Greedy nearest-neighbor stop ordering with per-leg distances and an ETA.
//!
//! Pure CPU work, O(n²) distance evaluations. Stop counts per request are
//! small enough that no spatial index is needed.

use serde::Serialize;

use leadgen_common::LeadId;

use crate::error::RouteError;
use crate::geo::Coordinate;

pub const AVERAGE_SPEED_MPH: f64 = 30.0;
pub const DWELL_MINUTES_PER_STOP: f64 = 30.0;

/// A geocoded stop handed to the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteStop {
    pub lead_id: LeadId,
    pub company_name: String,
    pub address: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlannedStop {
    pub lead_id: LeadId,
    pub company_name: String,
    pub address: String,
    /// 1-based visiting order.
    pub order: usize,
    /// Miles from the previous stop (or from the start location for the
    /// first stop, when one was given), rounded to 2 decimals.
    pub distance_from_previous: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutePlan {
    /// Miles, rounded to 2 decimals.
    pub total_distance: f64,
    /// Minutes: driving at the average speed plus dwell time per stop.
    pub estimated_duration: u32,
    pub stops: Vec<PlannedStop>,
    pub map_url: Option<String>,
}

impl RoutePlan {
    pub fn empty() -> Self {
        Self {
            total_distance: 0.0,
            estimated_duration: 0,
            stops: Vec::new(),
            map_url: None,
        }
    }
}

/// Order `stops` (or keep input order when `optimize` is false), then
/// annotate each leg. An empty stop set yields an empty plan.
pub fn plan_stops(
    stops: Vec<RouteStop>,
    start: Option<Coordinate>,
    optimize: bool,
) -> Result<RoutePlan, RouteError> {
    validate(&stops, start.as_ref())?;

    if stops.is_empty() {
        return Ok(RoutePlan::empty());
    }

    let ordered = if optimize {
        nearest_neighbor_order(stops, start)
    } else {
        stops
    };

    let mut total_miles = 0.0;
    let mut previous = start.unwrap_or(ordered[0].coordinate);
    let mut planned = Vec::with_capacity(ordered.len());

    for (idx, stop) in ordered.into_iter().enumerate() {
        let leg = previous.miles_to(&stop.coordinate);
        total_miles += leg;
        previous = stop.coordinate;

        planned.push(PlannedStop {
            lead_id: stop.lead_id,
            company_name: stop.company_name,
            address: stop.address,
            order: idx + 1,
            distance_from_previous: round2(leg),
        });
    }

    Ok(RoutePlan {
        total_distance: round2(total_miles),
        estimated_duration: estimate_minutes(total_miles, planned.len()),
        stops: planned,
        map_url: None,
    })
}

/// Greedy tour. Seeds with the stop nearest to `start` unless the start
/// coincides with the first stop (or is absent), in which case the first
/// stop seeds. Ties go to the earliest stop in input order.
fn nearest_neighbor_order(mut remaining: Vec<RouteStop>, start: Option<Coordinate>) -> Vec<RouteStop> {
    let mut ordered = Vec::with_capacity(remaining.len());
    if remaining.is_empty() {
        return ordered;
    }

    let seed = match start {
        Some(s) if !s.coincides_with(&remaining[0].coordinate) => nearest_index(&s, &remaining),
        _ => 0,
    };
    let mut current = remaining.remove(seed);

    while !remaining.is_empty() {
        let next = nearest_index(&current.coordinate, &remaining);
        ordered.push(std::mem::replace(&mut current, remaining.remove(next)));
    }
    ordered.push(current);

    ordered
}

fn nearest_index(from: &Coordinate, stops: &[RouteStop]) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut nearest = 0;

    for (idx, stop) in stops.iter().enumerate() {
        let distance = from.miles_to(&stop.coordinate);
        if distance < min_distance {
            min_distance = distance;
            nearest = idx;
        }
    }

    nearest
}

fn validate(stops: &[RouteStop], start: Option<&Coordinate>) -> Result<(), RouteError> {
    if let Some(s) = start.filter(|s| !s.is_valid()) {
        return Err(RouteError::InvalidCoordinate {
            lead_id: None,
            lat: s.lat,
            lng: s.lng,
        });
    }
    if let Some(stop) = stops.iter().find(|s| !s.coordinate.is_valid()) {
        return Err(RouteError::InvalidCoordinate {
            lead_id: Some(stop.lead_id),
            lat: stop.coordinate.lat,
            lng: stop.coordinate.lng,
        });
    }
    Ok(())
}

fn estimate_minutes(total_miles: f64, stop_count: usize) -> u32 {
    let driving = total_miles / AVERAGE_SPEED_MPH * 60.0;
    let dwell = DWELL_MINUTES_PER_STOP * stop_count as f64;
    (driving + dwell).round() as u32
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
