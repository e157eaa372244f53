use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Catalog plan identifiers.
///
/// `free` and `pro` are accepted as legacy spellings of `essential` and
/// `professional`; they are never written back out.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[sqlx(type_name = "plan_id", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PlanId {
    #[serde(alias = "free")]
    #[strum(to_string = "essential", serialize = "free")]
    Essential,
    #[serde(alias = "pro")]
    #[strum(to_string = "professional", serialize = "pro")]
    Professional,
    Enterprise,
}

/// Fixed tier ordering used to tell upgrades from downgrades.
pub const TIER_ORDER: [PlanId; 3] = [PlanId::Essential, PlanId::Professional, PlanId::Enterprise];

impl PlanId {
    /// Position of this plan in [`TIER_ORDER`].
    pub fn tier(&self) -> usize {
        TIER_ORDER
            .iter()
            .position(|p| p == self)
            .unwrap_or_default()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PlanId::Essential => "Essential",
            PlanId::Professional => "Professional",
            PlanId::Enterprise => "Enterprise",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingInterval {
    Monthly,
    Yearly,
    Custom,
}

/// Immutable catalog entry. Lives in the static table in `domain::catalog`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub id: PlanId,
    pub name: &'static str,
    pub description: &'static str,
    pub price_cents: i32,
    pub currency: &'static str,
    pub interval: BillingInterval,
    pub trial_days: i32,
    pub features: Vec<&'static str>,
    pub limits: HashMap<String, i64>,
    pub display_order: i32,
    pub highlight: Option<&'static str>,
}

impl Plan {
    pub fn has_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| *f == feature)
    }
}

/// Admin-editable plan row in the store. Overrides the catalog while active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRecord {
    pub plan_id: PlanId,
    pub features: Vec<String>,
    pub resource_limits: HashMap<String, i64>,
    pub is_active: bool,
    pub updated_by: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
