use async_trait::async_trait;
use sqlx::{Row, postgres::PgRow, types::Json};

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::plans::PlanRepo,
    domain::entities::plan::{PlanId, PlanRecord},
};

const SELECT_COLS: &str =
    "plan_id, features, resource_limits, is_active, updated_by, created_at, updated_at";

fn row_to_record(row: &PgRow) -> PlanRecord {
    let plan_id: PlanId = row.get("plan_id");
    let features_json: serde_json::Value = row.get("features");
    let limits_json: serde_json::Value = row.get("resource_limits");

    PlanRecord {
        plan_id,
        features: parse_json_with_fallback(&features_json, "features", "plan", plan_id.as_ref()),
        resource_limits: parse_json_with_fallback(
            &limits_json,
            "resource_limits",
            "plan",
            plan_id.as_ref(),
        ),
        is_active: row.get("is_active"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn get(&self, plan_id: PlanId) -> AppResult<Option<PlanRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE plan_id = $1",
            SELECT_COLS
        ))
        .bind(plan_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_record))
    }

    async fn list(&self) -> AppResult<Vec<PlanRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plans ORDER BY plan_id",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn upsert(&self, record: &PlanRecord) -> AppResult<PlanRecord> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO plans (plan_id, features, resource_limits, is_active, updated_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, COALESCE($6, now()), $7)
            ON CONFLICT (plan_id) DO UPDATE SET
                features = EXCLUDED.features,
                resource_limits = EXCLUDED.resource_limits,
                is_active = EXCLUDED.is_active,
                updated_by = EXCLUDED.updated_by,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            "#,
            SELECT_COLS
        ))
        .bind(record.plan_id)
        .bind(Json(&record.features))
        .bind(Json(&record.resource_limits))
        .bind(record.is_active)
        .bind(&record.updated_by)
        .bind(record.created_at)
        .bind(record.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row_to_record(&row))
    }
}
