use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use super::{plan::PlanId, subscription::SubscriptionStatus};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "subscription_event_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HistoryEventType {
    Created,
    Updated,
    PlanChanged,
    Canceled,
    Reactivated,
}

/// Append-only audit row. One per successful lifecycle mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionHistoryEntry {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub organization_id: Uuid,
    pub event_type: HistoryEventType,
    pub from_plan_id: Option<PlanId>,
    pub to_plan_id: Option<PlanId>,
    pub from_status: Option<SubscriptionStatus>,
    pub to_status: Option<SubscriptionStatus>,
    pub reason: Option<String>,
    pub changed_by: String,
    pub changed_by_role: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
