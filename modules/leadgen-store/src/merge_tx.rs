//! Lead merges in a single Postgres transaction.
//!
//! Rows are locked with `FOR UPDATE` as they are loaded. Dropping a
//! `PgMergeTx` without `commit()` rolls the transaction back.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::{Postgres, Transaction};

use leadgen_common::LeadId;
use leadgen_dedup::{DuplicateGroup, LeadStore, MergeTx, MergeableLead};

use crate::rows::{DuplicateRow, MergeableRow};
use crate::store::PgStore;

const COMPANY_CONTACT_RULE: &str = "company_contact";

#[async_trait]
impl LeadStore for PgStore {
    async fn duplicate_groups(&self) -> Result<Vec<DuplicateGroup>> {
        let rows = sqlx::query_as::<_, DuplicateRow>(
            r#"
            SELECT company_id, contact_id, array_agg(id ORDER BY id) AS lead_ids
            FROM leads
            WHERE contact_id IS NOT NULL
            GROUP BY company_id, contact_id
            HAVING COUNT(*) > 1
            ORDER BY company_id, contact_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DuplicateGroup {
                rule: COMPANY_CONTACT_RULE.to_string(),
                company_id: r.company_id,
                contact_id: r.contact_id,
                count: r.lead_ids.len(),
                lead_ids: r.lead_ids,
            })
            .collect())
    }

    async fn begin_merge(&self) -> Result<Box<dyn MergeTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgMergeTx { tx }))
    }
}

pub struct PgMergeTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl MergeTx for PgMergeTx {
    async fn load_lead(&mut self, id: LeadId) -> Result<Option<MergeableLead>> {
        let row = sqlx::query_as::<_, MergeableRow>(
            "SELECT id, notes, tags FROM leads WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(row.map(MergeableLead::from))
    }

    async fn reassign_activities(&mut self, from: LeadId, to: LeadId) -> Result<u64> {
        let result = sqlx::query("UPDATE lead_activities SET lead_id = $2 WHERE lead_id = $1")
            .bind(from)
            .bind(to)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn delete_lead(&mut self, id: LeadId) -> Result<()> {
        sqlx::query("DELETE FROM leads WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn save_lead(&mut self, lead: &MergeableLead) -> Result<()> {
        sqlx::query("UPDATE leads SET notes = $2, tags = $3 WHERE id = $1")
            .bind(lead.id)
            .bind(&lead.notes)
            .bind(Json(&lead.tags))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
