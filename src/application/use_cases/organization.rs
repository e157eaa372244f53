use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::identity::Caller,
    domain::entities::organization::OrganizationSummary,
};

#[async_trait]
pub trait OrganizationRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<OrganizationSummary>>;
    async fn get_by_external_id(&self, external_id: &str) -> AppResult<Option<OrganizationSummary>>;
}

#[derive(Clone)]
pub struct OrganizationUseCases {
    repo: Arc<dyn OrganizationRepo>,
}

impl OrganizationUseCases {
    pub fn new(repo: Arc<dyn OrganizationRepo>) -> Self {
        Self { repo }
    }

    /// Maps a resolved caller onto the organization it acts for.
    pub async fn resolve_for_caller(&self, caller: &Caller) -> AppResult<OrganizationSummary> {
        let external_id = caller
            .organization_external_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
            .ok_or(AppError::NoOrganization)?;

        self.repo
            .get_by_external_id(external_id)
            .await?
            .ok_or(AppError::OrganizationNotFound)
    }
}
