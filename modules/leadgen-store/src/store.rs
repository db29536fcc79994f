//! PgStore: the Postgres-backed durable store.
//!
//! Intake writes normalize identity columns on the way in (domain, email) so
//! ledger lookups can compare with plain equality.

use serde_json::Value;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use leadgen_common::{
    normalize_domain, normalize_email, ActivityId, Company, CompanyId, Contact, ContactId,
    JobPosting, JobPostingId, Lead, LeadActivity, LeadGenError, LeadId,
};

use crate::marker_cache::PgMarkerCache;
use crate::rows::{ActivityRow, CompanyRow, LeadRow, COMPANY_COLUMNS};

#[derive(Clone)]
pub struct PgStore {
    pub(crate) pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Seen-marker cache sharing this store's pool.
    pub fn marker_cache(&self) -> PgMarkerCache {
        PgMarkerCache::new(self.pool.clone())
    }

    /// Apply the embedded schema migrations. Safe to run repeatedly.
    pub async fn migrate(&self) -> Result<(), LeadGenError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LeadGenError::Database(e.to_string()))?;
        info!("Lead-gen schema up to date");
        Ok(())
    }

    // --- Intake ---

    /// Insert a company. `domain` falls back to the host of `website`.
    pub async fn insert_company(&self, company: &Company) -> Result<CompanyId, LeadGenError> {
        let domain = company
            .domain
            .as_deref()
            .and_then(normalize_domain)
            .or_else(|| company.website.as_deref().and_then(normalize_domain));

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO companies (name, domain, website, phone, address, city, state, zip_code, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(&company.name)
        .bind(&domain)
        .bind(&company.website)
        .bind(&company.phone)
        .bind(&company.address)
        .bind(&company.city)
        .bind(&company.state)
        .bind(&company.zip_code)
        .bind(company.latitude)
        .bind(company.longitude)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "company"))
    }

    pub async fn insert_contact(&self, contact: &Contact) -> Result<ContactId, LeadGenError> {
        let email = contact.email.as_deref().and_then(normalize_email);

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO contacts (company_id, first_name, last_name, title, email, phone, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(contact.company_id)
        .bind(&contact.first_name)
        .bind(&contact.last_name)
        .bind(&contact.title)
        .bind(&email)
        .bind(&contact.phone)
        .bind(&contact.source)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "contact"))
    }

    pub async fn insert_job_posting(&self, job: &JobPosting) -> Result<JobPostingId, LeadGenError> {
        let source = job.source.trim();
        if source.is_empty() {
            return Err(LeadGenError::Validation("job posting source is required".into()));
        }
        let external_id = job
            .external_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO job_postings (company_id, title, source, external_id, external_url, city, state, posted_date)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            "#,
        )
        .bind(job.company_id)
        .bind(&job.title)
        .bind(source)
        .bind(external_id)
        .bind(&job.external_url)
        .bind(&job.city)
        .bind(&job.state)
        .bind(job.posted_date)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "job posting"))
    }

    pub async fn insert_lead(&self, lead: &Lead) -> Result<LeadId, LeadGenError> {
        let methods: Vec<&str> = lead.selected_methods.iter().map(|m| m.as_str()).collect();

        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO leads
                (company_id, contact_id, job_posting_id, status, score, selected_methods,
                 call_script, email_subject, email_body, notes, tags, contacted_at, last_activity_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(lead.company_id)
        .bind(lead.contact_id)
        .bind(lead.job_posting_id)
        .bind(lead.status.as_str())
        .bind(lead.score)
        .bind(Json(&methods))
        .bind(&lead.call_script)
        .bind(&lead.email_subject)
        .bind(&lead.email_body)
        .bind(&lead.notes)
        .bind(Json(&lead.tags))
        .bind(lead.contacted_at)
        .bind(lead.last_activity_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "lead"))
    }

    pub async fn insert_activity(
        &self,
        lead_id: LeadId,
        activity_type: &str,
        description: Option<&str>,
        metadata: Option<Value>,
    ) -> Result<ActivityId, LeadGenError> {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO lead_activities (lead_id, activity_type, description, metadata)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(lead_id)
        .bind(activity_type)
        .bind(description)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| write_error(e, "activity"))
    }

    // --- Reads ---

    pub async fn get_lead(&self, id: LeadId) -> Result<Lead, LeadGenError> {
        sqlx::query_as::<_, LeadRow>(
            r#"
            SELECT id, company_id, contact_id, job_posting_id, status, score, selected_methods,
                   call_script, email_subject, email_body, notes, tags, contacted_at,
                   last_activity_at, created_at
            FROM leads
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LeadGenError::Database(e.to_string()))?
        .map(Lead::from)
        .ok_or(LeadGenError::NotFound { entity: "lead", id })
    }

    pub async fn get_company(&self, id: CompanyId) -> Result<Company, LeadGenError> {
        let sql = format!("SELECT {COMPANY_COLUMNS} FROM companies c WHERE c.id = $1");
        sqlx::query_as::<_, CompanyRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| LeadGenError::Database(e.to_string()))?
            .map(Company::from)
            .ok_or(LeadGenError::NotFound { entity: "company", id })
    }

    /// Activities on a lead, oldest first.
    pub async fn lead_activities(&self, lead_id: LeadId) -> Result<Vec<LeadActivity>, LeadGenError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r#"
            SELECT id, lead_id, activity_type, description, metadata, created_at
            FROM lead_activities
            WHERE lead_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(lead_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LeadGenError::Database(e.to_string()))?;

        Ok(rows.into_iter().map(LeadActivity::from).collect())
    }
}

/// Unique-key collisions are a caller problem; everything else is the database's.
fn write_error(e: sqlx::Error, entity: &str) -> LeadGenError {
    match e.as_database_error() {
        Some(db) if db.is_unique_violation() => {
            LeadGenError::Validation(format!("{entity} already exists: {}", db.message()))
        }
        Some(db) if db.is_foreign_key_violation() => {
            LeadGenError::Validation(format!("{entity} references a missing row: {}", db.message()))
        }
        _ => LeadGenError::Database(e.to_string()),
    }
}
