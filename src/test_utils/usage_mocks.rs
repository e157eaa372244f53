//! In-memory usage counters.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::usage::{CountedEntity, UsageLogKind, UsageRepo},
};

struct LogRow {
    organization_id: Uuid,
    kind: UsageLogKind,
    success: bool,
    created_at: DateTime<Utc>,
}

/// Usage store keyed by organization. Seed it with the consuming `with_*`
/// builders; `set_entities` adjusts counts after the repo is shared.
#[derive(Default)]
pub struct InMemoryUsageRepo {
    children: HashMap<Uuid, Vec<Uuid>>,
    projects: Vec<(Uuid, DateTime<Utc>)>,
    participants: HashMap<Uuid, Vec<String>>,
    entities: Mutex<HashMap<(Uuid, CountedEntity), i64>>,
    logs: Vec<LogRow>,
    scope_reads: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryUsageRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, parent: Uuid, child: Uuid) -> Self {
        self.children.entry(parent).or_default().push(child);
        self
    }

    /// Adds `count` projects created at `created_at`.
    pub fn with_projects(mut self, organization_id: Uuid, count: usize, created_at: DateTime<Utc>) -> Self {
        self.projects
            .extend(std::iter::repeat_n((organization_id, created_at), count));
        self
    }

    pub fn with_participants(mut self, organization_id: Uuid, participant_ids: &[&str]) -> Self {
        self.participants
            .entry(organization_id)
            .or_default()
            .extend(participant_ids.iter().map(|p| p.to_string()));
        self
    }

    pub fn with_entities(self, organization_id: Uuid, entity: CountedEntity, count: i64) -> Self {
        self.set_entities(organization_id, entity, count);
        self
    }

    pub fn with_logs(
        mut self,
        organization_id: Uuid,
        kind: UsageLogKind,
        count: usize,
        success: bool,
        created_at: DateTime<Utc>,
    ) -> Self {
        for _ in 0..count {
            self.logs.push(LogRow {
                organization_id,
                kind,
                success,
                created_at,
            });
        }
        self
    }

    /// Overrides the row count for `entity`. For projects this is added to
    /// the rows seeded by `with_projects`.
    pub fn set_entities(&self, organization_id: Uuid, entity: CountedEntity, count: i64) {
        self.entities
            .lock()
            .unwrap()
            .insert((organization_id, entity), count);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of scope resolutions, one per usage computation.
    pub fn scope_reads(&self) -> usize {
        self.scope_reads.load(Ordering::SeqCst)
    }

    fn check(&self) -> AppResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::StoreFailure("in-memory store failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl UsageRepo for InMemoryUsageRepo {
    async fn organization_scope(&self, organization_id: Uuid) -> AppResult<Vec<Uuid>> {
        self.scope_reads.fetch_add(1, Ordering::SeqCst);
        self.check()?;

        let mut scope = vec![];
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([organization_id]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            scope.push(id);
            if let Some(children) = self.children.get(&id) {
                queue.extend(children.iter().copied());
            }
        }
        Ok(scope)
    }

    async fn count_entities(&self, scope: &[Uuid], entity: CountedEntity) -> AppResult<i64> {
        self.check()?;
        let entities = self.entities.lock().unwrap();
        let mut total: i64 = scope
            .iter()
            .filter_map(|org| entities.get(&(*org, entity)))
            .sum();
        if entity == CountedEntity::Projects {
            total += self
                .projects
                .iter()
                .filter(|(org, _)| scope.contains(org))
                .count() as i64;
        }
        Ok(total)
    }

    async fn count_distinct_participants(&self, scope: &[Uuid]) -> AppResult<i64> {
        self.check()?;
        let distinct: HashSet<&String> = scope
            .iter()
            .filter_map(|org| self.participants.get(org))
            .flatten()
            .collect();
        Ok(distinct.len() as i64)
    }

    async fn count_projects_created_since(
        &self,
        scope: &[Uuid],
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        self.check()?;
        Ok(self
            .projects
            .iter()
            .filter(|(org, created_at)| scope.contains(org) && *created_at >= since)
            .count() as i64)
    }

    async fn count_successful_logs(
        &self,
        scope: &[Uuid],
        kind: UsageLogKind,
        since: DateTime<Utc>,
    ) -> AppResult<i64> {
        self.check()?;
        Ok(self
            .logs
            .iter()
            .filter(|l| {
                l.kind == kind
                    && l.success
                    && l.created_at >= since
                    && scope.contains(&l.organization_id)
            })
            .count() as i64)
    }
}
