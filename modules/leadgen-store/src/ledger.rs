use anyhow::Result;
use async_trait::async_trait;

use leadgen_common::IdentityKey;
use leadgen_dedup::{EntityCounts, EntityLedger};

use crate::store::PgStore;

#[async_trait]
impl EntityLedger for PgStore {
    async fn identity_exists(&self, key: &IdentityKey) -> Result<bool> {
        let exists = match key {
            IdentityKey::Company { domain } => {
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM companies WHERE domain = $1)")
                    .bind(domain)
                    .fetch_one(&self.pool)
                    .await?
            }
            IdentityKey::Job {
                source,
                external_id,
            } => {
                sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM job_postings WHERE source = $1 AND external_id = $2)",
                )
                .bind(source)
                .bind(external_id)
                .fetch_one(&self.pool)
                .await?
            }
            IdentityKey::Contact { email } => {
                sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM contacts WHERE email = $1)")
                    .bind(email)
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(exists)
    }

    async fn entity_counts(&self) -> Result<EntityCounts> {
        let (companies, jobs, contacts, leads) = sqlx::query_as::<_, (i64, i64, i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM companies),
                (SELECT COUNT(*) FROM job_postings),
                (SELECT COUNT(*) FROM contacts),
                (SELECT COUNT(*) FROM leads)
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(EntityCounts {
            companies: companies as u64,
            jobs: jobs as u64,
            contacts: contacts as u64,
            leads: leads as u64,
        })
    }
}
