use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::use_cases::usage::{CountedEntity, UsageLogKind, UsageRepo},
};

/// Log status that counts against a monthly allowance.
const SUCCESS_STATUS: &str = "sent";

fn entity_table(entity: CountedEntity) -> &'static str {
    match entity {
        CountedEntity::Projects => "projects",
        CountedEntity::Instructors => "instructors",
        CountedEntity::Courses => "courses",
        CountedEntity::Curriculums => "curriculums",
        CountedEntity::CustomRoles => "custom_roles",
    }
}

fn log_table(kind: UsageLogKind) -> &'static str {
    match kind {
        UsageLogKind::Email => "email_logs",
        UsageLogKind::AiSummarization => "ai_summarization_logs",
    }
}

#[async_trait]
impl UsageRepo for PostgresPersistence {
    async fn organization_scope(&self, organization_id: Uuid) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            WITH RECURSIVE tree AS (
                SELECT id, 0 AS depth FROM organizations WHERE id = $1
                UNION ALL
                SELECT o.id, t.depth + 1
                FROM organizations o
                JOIN tree t ON o.parent_id = t.id
            )
            SELECT id FROM tree ORDER BY depth, id
            "#,
        )
        .bind(organization_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(ids)
    }

    async fn count_entities(&self, scope: &[Uuid], entity: CountedEntity) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE organization_id = ANY($1)",
            entity_table(entity)
        ))
        .bind(scope)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }

    async fn count_distinct_participants(&self, scope: &[Uuid]) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(DISTINCT pp.participant_id)
            FROM project_participants pp
            JOIN projects p ON pp.project_id = p.id
            WHERE p.organization_id = ANY($1)
            "#,
        )
        .bind(scope)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }

    async fn count_projects_created_since(
        &self,
        scope: &[Uuid],
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM projects WHERE organization_id = ANY($1) AND created_at >= $2",
        )
        .bind(scope)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }

    async fn count_successful_logs(
        &self,
        scope: &[Uuid],
        kind: UsageLogKind,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {} WHERE organization_id = ANY($1) AND status = $2 AND created_at >= $3",
            log_table(kind)
        ))
        .bind(scope)
        .bind(SUCCESS_STATUS)
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(count)
    }
}
