use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    application::ports::clock::Clock,
    domain::entities::resource::ResourceKey,
};

/// Window for `projects_per_month`.
const TRAILING_WINDOW_DAYS: i64 = 30;

/// Business entities counted directly by row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CountedEntity {
    Projects,
    Instructors,
    Courses,
    Curriculums,
    CustomRoles,
}

/// Outbound-call logs counted by successful entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UsageLogKind {
    Email,
    AiSummarization,
}

#[async_trait]
pub trait UsageRepo: Send + Sync {
    /// The organization followed by every organization beneath it.
    async fn organization_scope(&self, organization_id: Uuid) -> AppResult<Vec<Uuid>>;

    async fn count_entities(&self, scope: &[Uuid], entity: CountedEntity) -> AppResult<i64>;

    /// Participants across every project in scope, deduplicated by participant id.
    async fn count_distinct_participants(&self, scope: &[Uuid]) -> AppResult<i64>;

    async fn count_projects_created_since(
        &self,
        scope: &[Uuid],
        since: DateTime<Utc>,
    ) -> AppResult<i64>;

    async fn count_successful_logs(
        &self,
        scope: &[Uuid],
        kind: UsageLogKind,
        since: DateTime<Utc>,
    ) -> AppResult<i64>;
}

/// Current consumption per resource. Computed fresh on every call.
pub type ResourceUsage = BTreeMap<ResourceKey, i64>;

/// Midnight UTC on the first day of `now`'s month.
pub fn start_of_month(now: DateTime<Utc>) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now)
}

#[derive(Clone)]
pub struct UsageUseCases {
    repo: Arc<dyn UsageRepo>,
    clock: Arc<dyn Clock>,
}

impl UsageUseCases {
    pub fn new(repo: Arc<dyn UsageRepo>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    #[instrument(skip(self))]
    pub async fn usage(&self, organization_id: Uuid) -> AppResult<ResourceUsage> {
        let mut scope = self.repo.organization_scope(organization_id).await?;
        if scope.is_empty() {
            scope.push(organization_id);
        }
        let scope = scope.as_slice();

        let now = self.clock.now();
        let trailing = now - Duration::days(TRAILING_WINDOW_DAYS);
        let month_start = start_of_month(now);

        let (
            projects,
            participants,
            instructors,
            courses,
            curriculums,
            custom_roles,
            projects_recent,
            emails,
            ai_summarizations,
        ) = tokio::try_join!(
            self.repo.count_entities(scope, CountedEntity::Projects),
            self.repo.count_distinct_participants(scope),
            self.repo.count_entities(scope, CountedEntity::Instructors),
            self.repo.count_entities(scope, CountedEntity::Courses),
            self.repo.count_entities(scope, CountedEntity::Curriculums),
            self.repo.count_entities(scope, CountedEntity::CustomRoles),
            self.repo.count_projects_created_since(scope, trailing),
            self.repo
                .count_successful_logs(scope, UsageLogKind::Email, month_start),
            self.repo
                .count_successful_logs(scope, UsageLogKind::AiSummarization, month_start),
        )?;

        Ok(BTreeMap::from([
            (ResourceKey::Projects, projects),
            (ResourceKey::Participants, participants),
            (ResourceKey::SubOrganizations, (scope.len() as i64 - 1).max(0)),
            (ResourceKey::Instructors, instructors),
            (ResourceKey::Courses, courses),
            (ResourceKey::Curriculums, curriculums),
            (ResourceKey::CustomRoles, custom_roles),
            (ResourceKey::ProjectsPerMonth, projects_recent),
            (ResourceKey::EmailsPerMonth, emails),
            (ResourceKey::AiSummarizationsPerMonth, ai_summarizations),
            (ResourceKey::Storage, 0),
        ]))
    }
}
