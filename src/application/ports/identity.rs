use async_trait::async_trait;

use crate::app_error::AppResult;

/// Raw credentials lifted off an inbound request.
#[derive(Debug, Clone, Default)]
pub struct CallerCredentials {
    pub bearer_token: Option<String>,
    pub session_cookie: Option<String>,
}

impl CallerCredentials {
    pub fn is_empty(&self) -> bool {
        self.bearer_token.is_none() && self.session_cookie.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub user_id: String,
    /// Identifier of the caller's organization as the identity provider knows it.
    pub organization_external_id: Option<String>,
    pub roles: Vec<String>,
}

impl Caller {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Resolves request credentials to a caller. `Ok(None)` means the credentials
/// were missing, expired or otherwise not accepted.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn resolve_caller(&self, credentials: &CallerCredentials) -> AppResult<Option<Caller>>;
}
