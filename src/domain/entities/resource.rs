use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

/// Limit value meaning "no cap".
pub const UNLIMITED: i64 = -1;

/// Countable, limit-bearing resource types.
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
    AsRefStr,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKey {
    Projects,
    Participants,
    SubOrganizations,
    Instructors,
    Courses,
    Curriculums,
    CustomRoles,
    ProjectsPerMonth,
    EmailsPerMonth,
    AiSummarizationsPerMonth,
    Storage,
}

/// Human-readable metadata for a resource, shown next to limits.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    pub key: ResourceKey,
    pub label: &'static str,
    pub description: &'static str,
    pub unit: &'static str,
    pub monthly: bool,
}

impl ResourceKey {
    pub fn metadata(&self) -> ResourceMetadata {
        let (label, description, unit, monthly) = match self {
            ResourceKey::Projects => ("Projects", "Total projects", "projects", false),
            ResourceKey::Participants => (
                "Participants",
                "Distinct participants across all projects",
                "participants",
                false,
            ),
            ResourceKey::SubOrganizations => (
                "Sub-organizations",
                "Sub-organizations under the organization",
                "sub-organizations",
                false,
            ),
            ResourceKey::Instructors => ("Instructors", "Instructors", "instructors", false),
            ResourceKey::Courses => ("Courses", "Courses", "courses", false),
            ResourceKey::Curriculums => ("Curriculums", "Curriculums", "curriculums", false),
            ResourceKey::CustomRoles => (
                "Custom roles",
                "Custom participant roles",
                "roles",
                false,
            ),
            ResourceKey::ProjectsPerMonth => (
                "Projects per month",
                "Projects created in the last 30 days",
                "projects",
                true,
            ),
            ResourceKey::EmailsPerMonth => (
                "Emails per month",
                "Emails sent this calendar month",
                "emails",
                true,
            ),
            ResourceKey::AiSummarizationsPerMonth => (
                "AI summaries per month",
                "AI summarizations this calendar month",
                "summaries",
                true,
            ),
            ResourceKey::Storage => ("Storage", "Stored file size", "MB", false),
        };
        ResourceMetadata {
            key: *self,
            label,
            description,
            unit,
            monthly,
        }
    }

    pub fn all_metadata() -> Vec<ResourceMetadata> {
        ResourceKey::iter().map(|r| r.metadata()).collect()
    }
}
