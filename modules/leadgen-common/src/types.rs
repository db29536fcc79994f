use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type CompanyId = i64;
pub type ContactId = i64;
pub type JobPostingId = i64;
pub type LeadId = i64;
pub type ActivityId = i64;

// --- Enums ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    #[default]
    New,
    InProgress,
    Contacted,
    Qualified,
    Converted,
    ClosedLost,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Contacted => "contacted",
            Self::Qualified => "qualified",
            Self::Converted => "converted",
            Self::ClosedLost => "closed_lost",
        }
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "in_progress" => Ok(Self::InProgress),
            "contacted" => Ok(Self::Contacted),
            "qualified" => Ok(Self::Qualified),
            "converted" => Ok(Self::Converted),
            "closed_lost" => Ok(Self::ClosedLost),
            other => Err(format!("unknown lead status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContactMethod {
    Call,
    Visit,
    Email,
}

impl ContactMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Visit => "visit",
            Self::Email => "email",
        }
    }
}

impl FromStr for ContactMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "call" => Ok(Self::Call),
            "visit" => Ok(Self::Visit),
            "email" => Ok(Self::Email),
            other => Err(format!("unknown contact method: {other}")),
        }
    }
}

// --- Entities ---

/// A company a lead belongs to. `domain` is the dedup identity when present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub name: String,
    pub domain: Option<String>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip_code: Option<String>,
    /// Memoized geocode result. Populated once, trusted until cleared.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl Company {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng)) => Some((lat, lng)),
            _ => None,
        }
    }

    /// A company can be routed to only with both a street address and a city.
    pub fn has_routable_address(&self) -> bool {
        non_blank(&self.address) && non_blank(&self.city)
    }

    /// `"{address}, {city}, {state} {zip}"`, skipping missing parts.
    pub fn formatted_address(&self) -> String {
        let region = [self.state.as_deref(), self.zip_code.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        [self.address.as_deref(), self.city.as_deref(), Some(region.as_str())]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Coarse `"{city}, {state}"` label used for map waypoints.
    pub fn locality_label(&self) -> String {
        [self.city.as_deref(), self.state.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub company_id: CompanyId,
    pub first_name: String,
    pub last_name: String,
    pub title: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub source: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobPosting {
    pub id: JobPostingId,
    pub company_id: CompanyId,
    pub title: String,
    /// Job board the posting came from (e.g. "indeed", "ziprecruiter").
    pub source: String,
    pub external_id: Option<String>,
    pub external_url: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub posted_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub company_id: CompanyId,
    pub contact_id: Option<ContactId>,
    pub job_posting_id: Option<JobPostingId>,
    pub status: LeadStatus,
    pub score: Option<f64>,
    pub selected_methods: Vec<ContactMethod>,
    pub call_script: Option<String>,
    pub email_subject: Option<String>,
    pub email_body: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub contacted_at: Option<DateTime<Utc>>,
    pub last_activity_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn new(id: LeadId, company_id: CompanyId) -> Self {
        Self {
            id,
            company_id,
            contact_id: None,
            job_posting_id: None,
            status: LeadStatus::New,
            score: None,
            selected_methods: Vec::new(),
            call_script: None,
            email_subject: None,
            email_body: None,
            notes: None,
            tags: Vec::new(),
            contacted_at: None,
            last_activity_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Append-only log entry on a lead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadActivity {
    pub id: ActivityId,
    pub lead_id: LeadId,
    pub activity_type: String,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// A lead joined with the company it belongs to.
#[derive(Debug, Clone)]
pub struct LeadWithCompany {
    pub lead_id: LeadId,
    pub company: Company,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn company() -> Company {
        Company {
            id: 1,
            name: "Acme".into(),
            address: Some("100 Main St".into()),
            city: Some("Minneapolis".into()),
            state: Some("MN".into()),
            zip_code: Some("55401".into()),
            ..Default::default()
        }
    }

    #[test]
    fn formatted_address_has_all_parts() {
        assert_eq!(company().formatted_address(), "100 Main St, Minneapolis, MN 55401");
    }

    #[test]
    fn formatted_address_skips_missing_parts() {
        let mut c = company();
        c.zip_code = None;
        c.state = None;
        assert_eq!(c.formatted_address(), "100 Main St, Minneapolis");
    }

    #[test]
    fn routable_address_needs_street_and_city() {
        let mut c = company();
        assert!(c.has_routable_address());
        c.city = Some("  ".into());
        assert!(!c.has_routable_address());
    }

    #[test]
    fn coordinates_need_both_axes() {
        let mut c = company();
        c.latitude = Some(44.9);
        assert_eq!(c.coordinates(), None);
        c.longitude = Some(-93.2);
        assert_eq!(c.coordinates(), Some((44.9, -93.2)));
    }

    #[test]
    fn lead_status_round_trips_through_text() {
        for status in [LeadStatus::New, LeadStatus::InProgress, LeadStatus::ClosedLost] {
            assert_eq!(status.as_str().parse::<LeadStatus>().unwrap(), status);
        }
        assert!("archived".parse::<LeadStatus>().is_err());
    }
}
