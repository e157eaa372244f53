use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Row, Transaction, postgres::PgRow, types::Json};
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::use_cases::subscription::SubscriptionRepo,
    domain::entities::{
        organization::OrganizationSummary,
        plan::{PlanId, PlanRecord},
        subscription::{BillingReference, Subscription, SubscriptionWithPlan},
        subscription_history::SubscriptionHistoryEntry,
    },
};

const SELECT_COLS: &str = r#"
    id, organization_id, plan_id, status, current_period_start, current_period_end,
    cancel_at, canceled_at, billing_customer_id, billing_subscription_id,
    custom_features, custom_limits, created_by, updated_by, created_at, updated_at
"#;

const HISTORY_COLS: &str = r#"
    id, subscription_id, organization_id, event_type, from_plan_id, to_plan_id,
    from_status, to_status, reason, changed_by, changed_by_role, metadata, created_at
"#;

/// Open subscriptions sort ahead of canceled ones, then newest first.
const RELEVANCE_ORDER: &str = "(s.status <> 'canceled') DESC, s.created_at DESC";

fn row_to_subscription(row: &PgRow) -> Subscription {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("custom_features");
    let limits_json: serde_json::Value = row.get("custom_limits");

    Subscription {
        id,
        organization_id: row.get("organization_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        cancel_at: row.get("cancel_at"),
        canceled_at: row.get("canceled_at"),
        billing: BillingReference {
            customer_id: row.get("billing_customer_id"),
            subscription_id: row.get("billing_subscription_id"),
        },
        custom_features: parse_json_with_fallback(
            &features_json,
            "custom_features",
            "subscription",
            &id.to_string(),
        ),
        custom_limits: parse_json_with_fallback(
            &limits_json,
            "custom_limits",
            "subscription",
            &id.to_string(),
        ),
        created_by: row.get("created_by"),
        updated_by: row.get("updated_by"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

fn row_to_history(row: &PgRow) -> SubscriptionHistoryEntry {
    SubscriptionHistoryEntry {
        id: row.get("id"),
        subscription_id: row.get("subscription_id"),
        organization_id: row.get("organization_id"),
        event_type: row.get("event_type"),
        from_plan_id: row.get("from_plan_id"),
        to_plan_id: row.get("to_plan_id"),
        from_status: row.get("from_status"),
        to_status: row.get("to_status"),
        reason: row.get("reason"),
        changed_by: row.get("changed_by"),
        changed_by_role: row.get("changed_by_role"),
        metadata: row.get("metadata"),
        created_at: row.get("created_at"),
    }
}

/// Plan columns come from a LEFT JOIN and are aliased with a `p_` prefix.
fn row_to_plan_record(row: &PgRow) -> Option<PlanRecord> {
    let plan_id: Option<PlanId> = row.get("p_plan_id");
    let plan_id = plan_id?;
    let features_json: serde_json::Value = row.get("p_features");
    let limits_json: serde_json::Value = row.get("p_resource_limits");

    Some(PlanRecord {
        plan_id,
        features: parse_json_with_fallback(&features_json, "features", "plan", plan_id.as_ref()),
        resource_limits: parse_json_with_fallback(
            &limits_json,
            "resource_limits",
            "plan",
            plan_id.as_ref(),
        ),
        is_active: row.get("p_is_active"),
        updated_by: row.get("p_updated_by"),
        created_at: row.get("p_created_at"),
        updated_at: row.get("p_updated_at"),
    })
}

async fn insert_history(
    tx: &mut Transaction<'_, Postgres>,
    entry: &SubscriptionHistoryEntry,
) -> AppResult<()> {
    sqlx::query(&format!(
        "INSERT INTO subscription_history ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        HISTORY_COLS
    ))
    .bind(entry.id)
    .bind(entry.subscription_id)
    .bind(entry.organization_id)
    .bind(entry.event_type)
    .bind(entry.from_plan_id)
    .bind(entry.to_plan_id)
    .bind(entry.from_status)
    .bind(entry.to_status)
    .bind(&entry.reason)
    .bind(&entry.changed_by)
    .bind(&entry.changed_by_role)
    .bind(&entry.metadata)
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(AppError::from)?;
    Ok(())
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_open_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE organization_id = $1 AND status <> 'canceled'",
            SELECT_COLS
        ))
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.as_ref().map(row_to_subscription))
    }

    async fn get_snapshot(&self, organization_id: Uuid) -> AppResult<Option<SubscriptionWithPlan>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT
                s.id, s.organization_id, s.plan_id, s.status, s.current_period_start,
                s.current_period_end, s.cancel_at, s.canceled_at, s.billing_customer_id,
                s.billing_subscription_id, s.custom_features, s.custom_limits, s.created_by,
                s.updated_by, s.created_at, s.updated_at,
                p.plan_id as p_plan_id, p.features as p_features,
                p.resource_limits as p_resource_limits, p.is_active as p_is_active,
                p.updated_by as p_updated_by, p.created_at as p_created_at,
                p.updated_at as p_updated_at,
                o.external_id as org_external_id, o.name as org_name
            FROM subscriptions s
            JOIN organizations o ON s.organization_id = o.id
            LEFT JOIN plans p ON s.plan_id = p.plan_id
            WHERE s.organization_id = $1
            ORDER BY {}
            LIMIT 1
            "#,
            RELEVANCE_ORDER
        ))
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(row.map(|row| SubscriptionWithPlan {
            subscription: row_to_subscription(&row),
            plan: row_to_plan_record(&row),
            organization: OrganizationSummary {
                id: organization_id,
                external_id: row.get("org_external_id"),
                name: row.get("org_name"),
            },
        }))
    }

    async fn insert_with_history(
        &self,
        subscription: &Subscription,
        entry: &SubscriptionHistoryEntry,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        sqlx::query(&format!(
            "INSERT INTO subscriptions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            SELECT_COLS
        ))
        .bind(subscription.id)
        .bind(subscription.organization_id)
        .bind(subscription.plan_id)
        .bind(subscription.status)
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.cancel_at)
        .bind(subscription.canceled_at)
        .bind(&subscription.billing.customer_id)
        .bind(&subscription.billing.subscription_id)
        .bind(Json(&subscription.custom_features))
        .bind(Json(&subscription.custom_limits))
        .bind(&subscription.created_by)
        .bind(&subscription.updated_by)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        insert_history(&mut tx, entry).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn update_with_history(
        &self,
        subscription: &Subscription,
        entry: &SubscriptionHistoryEntry,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE subscriptions SET
                plan_id = $2,
                status = $3,
                current_period_start = $4,
                current_period_end = $5,
                cancel_at = $6,
                canceled_at = $7,
                billing_customer_id = $8,
                billing_subscription_id = $9,
                custom_features = $10,
                custom_limits = $11,
                updated_by = $12,
                updated_at = $13
            WHERE id = $1
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.plan_id)
        .bind(subscription.status)
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.cancel_at)
        .bind(subscription.canceled_at)
        .bind(&subscription.billing.customer_id)
        .bind(&subscription.billing.subscription_id)
        .bind(Json(&subscription.custom_features))
        .bind(Json(&subscription.custom_limits))
        .bind(&subscription.updated_by)
        .bind(subscription.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.map_err(AppError::from)?;
            return Err(AppError::SubscriptionNotFound);
        }

        insert_history(&mut tx, entry).await?;
        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }

    async fn list_history(&self, subscription_id: Uuid) -> AppResult<Vec<SubscriptionHistoryEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscription_history WHERE subscription_id = $1 ORDER BY created_at DESC, id DESC",
            HISTORY_COLS
        ))
        .bind(subscription_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_history).collect())
    }

    async fn list_due_cancellations(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM subscriptions
               WHERE cancel_at IS NOT NULL AND cancel_at <= $1 AND status <> 'canceled'
               ORDER BY cancel_at ASC"#,
            SELECT_COLS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }

    async fn list_current(&self) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            r#"SELECT {} FROM subscriptions
               WHERE status IN ('active', 'trialing', 'past_due')
               ORDER BY created_at ASC"#,
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.iter().map(row_to_subscription).collect())
    }
}
