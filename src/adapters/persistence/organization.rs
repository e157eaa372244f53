use async_trait::async_trait;
use sqlx::{Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::organization::OrganizationRepo,
    domain::entities::organization::OrganizationSummary,
};

fn row_to_summary(row: &PgRow) -> OrganizationSummary {
    OrganizationSummary {
        id: row.get("id"),
        external_id: row.get("external_id"),
        name: row.get("name"),
    }
}

#[async_trait]
impl OrganizationRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<OrganizationSummary>> {
        let row = sqlx::query("SELECT id, external_id, name FROM organizations WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_summary))
    }

    async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<OrganizationSummary>> {
        let row =
            sqlx::query("SELECT id, external_id, name FROM organizations WHERE external_id = $1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_summary))
    }
}
