use anyhow::Result;
use async_trait::async_trait;

use leadgen_common::{CompanyId, LeadId, LeadWithCompany};
use leadgen_route::{Coordinate, RouteLeadSource};

use crate::rows::{LeadCompanyRow, COMPANY_COLUMNS};
use crate::store::PgStore;

pub const ROUTE_PLANNED_ACTIVITY: &str = "route_planned";
const ROUTE_PLANNED_DESCRIPTION: &str = "Included in route plan";

#[async_trait]
impl RouteLeadSource for PgStore {
    async fn leads_with_companies(&self, lead_ids: &[LeadId]) -> Result<Vec<LeadWithCompany>> {
        let sql = format!(
            r#"
            SELECT l.id AS lead_id, {COMPANY_COLUMNS}
            FROM leads l
            JOIN companies c ON c.id = l.company_id
            WHERE l.id = ANY($1)
            ORDER BY l.id
            "#
        );
        let rows = sqlx::query_as::<_, LeadCompanyRow>(&sql)
            .bind(lead_ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(LeadWithCompany::from).collect())
    }

    async fn save_company_coordinates(&self, company_id: CompanyId, coordinate: Coordinate) -> Result<()> {
        sqlx::query("UPDATE companies SET latitude = $2, longitude = $3 WHERE id = $1")
            .bind(company_id)
            .bind(coordinate.lat)
            .bind(coordinate.lng)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn record_route_planned(&self, lead_ids: &[LeadId]) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO lead_activities (lead_id, activity_type, description)
            SELECT id, $2, $3 FROM unnest($1::bigint[]) AS id
            "#,
        )
        .bind(lead_ids)
        .bind(ROUTE_PLANNED_ACTIVITY)
        .bind(ROUTE_PLANNED_DESCRIPTION)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
