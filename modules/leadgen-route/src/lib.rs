//! Route planning: geocode company addresses (memoized on the company),
//! order stops with a greedy nearest-neighbor pass, annotate legs and ETA.

pub mod error;
pub mod geo;
pub mod geocoder;
pub mod map_link;
pub mod planner;
pub mod sequencer;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use error::RouteError;
pub use geo::{haversine_distance_miles, Coordinate};
pub use geocoder::{geocode_bounded, Geocoder, NominatimGeocoder};
pub use map_link::MapLinkBuilder;
pub use planner::{RouteLeadSource, RoutePlanRequest, RoutePlanner};
pub use sequencer::{plan_stops, PlannedStop, RoutePlan, RouteStop};
