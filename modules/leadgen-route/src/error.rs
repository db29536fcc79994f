use leadgen_common::LeadId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    /// NaN or out-of-range latitude/longitude.
    #[error("invalid coordinate ({lat}, {lng}){}", lead_suffix(.lead_id))]
    InvalidCoordinate {
        lead_id: Option<LeadId>,
        lat: f64,
        lng: f64,
    },

    #[error("no leads found")]
    NoLeadsFound,

    #[error("no leads have valid addresses for route planning")]
    NoAddressableLeads,

    #[error("no lead addresses could be geocoded")]
    NoGeocodedStops,

    #[error("route store error: {0}")]
    Store(#[from] anyhow::Error),
}

fn lead_suffix(lead_id: &Option<LeadId>) -> String {
    match lead_id {
        Some(id) => format!(" for lead {id}"),
        None => " for start location".to_string(),
    }
}
