use url::Url;

const DIRECTIONS_BASE: &str = "https://www.google.com/maps/dir/";

/// Builds a shareable directions link. Links are only produced when a
/// mapping-provider key is configured.
#[derive(Debug, Clone, Default)]
pub struct MapLinkBuilder {
    api_key: Option<String>,
}

impl MapLinkBuilder {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// `waypoints` in final visiting order. Origin is `origin` if given,
    /// else the first waypoint; destination is the last waypoint; the
    /// intermediate list is every waypoint except the last.
    pub fn build(&self, waypoints: &[String], origin: Option<&str>) -> Option<String> {
        self.api_key.as_ref()?;
        let (destination, intermediate) = waypoints.split_last()?;
        let origin = origin
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(waypoints[0].as_str());

        let mut url = Url::parse(DIRECTIONS_BASE).ok()?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api", "1")
                .append_pair("origin", origin)
                .append_pair("destination", destination);
            if !intermediate.is_empty() {
                query.append_pair("waypoints", &intermediate.join("|"));
            }
        }
        Some(url.into())
    }
}
