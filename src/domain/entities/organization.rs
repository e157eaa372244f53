use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Root organization as seen by the entitlement engine. Sub-organizations
/// are only counted, never resolved individually.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
}
