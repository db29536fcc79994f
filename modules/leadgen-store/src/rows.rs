//! Row shapes as they come back from Postgres, and their conversions into
//! the domain types.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use tracing::warn;

use leadgen_common::{Company, ContactMethod, Lead, LeadActivity, LeadStatus, LeadWithCompany};
use leadgen_dedup::MergeableLead;

pub(crate) const COMPANY_COLUMNS: &str =
    "c.id, c.name, c.domain, c.website, c.phone, c.address, c.city, c.state, c.zip_code, c.latitude, c.longitude";

#[derive(Debug, FromRow)]
pub(crate) struct CompanyRow {
    id: i64,
    name: String,
    domain: Option<String>,
    website: Option<String>,
    phone: Option<String>,
    address: Option<String>,
    city: Option<String>,
    state: Option<String>,
    zip_code: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

impl From<CompanyRow> for Company {
    fn from(r: CompanyRow) -> Self {
        Company {
            id: r.id,
            name: r.name,
            domain: r.domain,
            website: r.website,
            phone: r.phone,
            address: r.address,
            city: r.city,
            state: r.state,
            zip_code: r.zip_code,
            latitude: r.latitude,
            longitude: r.longitude,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct LeadCompanyRow {
    lead_id: i64,
    #[sqlx(flatten)]
    company: CompanyRow,
}

impl From<LeadCompanyRow> for LeadWithCompany {
    fn from(r: LeadCompanyRow) -> Self {
        LeadWithCompany {
            lead_id: r.lead_id,
            company: r.company.into(),
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct LeadRow {
    id: i64,
    company_id: i64,
    contact_id: Option<i64>,
    job_posting_id: Option<i64>,
    status: String,
    score: Option<f64>,
    selected_methods: Json<Vec<String>>,
    call_script: Option<String>,
    email_subject: Option<String>,
    email_body: Option<String>,
    notes: Option<String>,
    tags: Json<Vec<String>>,
    contacted_at: Option<DateTime<Utc>>,
    last_activity_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(r: LeadRow) -> Self {
        let status = r.status.parse::<LeadStatus>().unwrap_or_else(|e| {
            warn!(lead_id = r.id, error = e.as_str(), "Unknown lead status, reading as new");
            LeadStatus::New
        });
        let selected_methods = r
            .selected_methods
            .0
            .iter()
            .filter_map(|m| m.parse::<ContactMethod>().ok())
            .collect();

        Lead {
            id: r.id,
            company_id: r.company_id,
            contact_id: r.contact_id,
            job_posting_id: r.job_posting_id,
            status,
            score: r.score,
            selected_methods,
            call_script: r.call_script,
            email_subject: r.email_subject,
            email_body: r.email_body,
            notes: r.notes,
            tags: r.tags.0,
            contacted_at: r.contacted_at,
            last_activity_at: r.last_activity_at,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct MergeableRow {
    id: i64,
    notes: Option<String>,
    tags: Json<Vec<String>>,
}

impl From<MergeableRow> for MergeableLead {
    fn from(r: MergeableRow) -> Self {
        MergeableLead {
            id: r.id,
            notes: r.notes,
            tags: r.tags.0,
        }
    }
}

#[derive(Debug, FromRow)]
pub(crate) struct ActivityRow {
    id: i64,
    lead_id: i64,
    activity_type: String,
    description: Option<String>,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for LeadActivity {
    fn from(r: ActivityRow) -> Self {
        LeadActivity {
            id: r.id,
            lead_id: r.lead_id,
            activity_type: r.activity_type,
            description: r.description,
            metadata: r.metadata,
            created_at: r.created_at,
        }
    }
}

/// `(company_id, contact_id, lead_ids)` for one duplicate group.
#[derive(Debug, FromRow)]
pub(crate) struct DuplicateRow {
    pub company_id: i64,
    pub contact_id: i64,
    pub lead_ids: Vec<i64>,
}
