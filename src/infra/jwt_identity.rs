use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;

use crate::{
    app_error::AppResult,
    application::{
        jwt,
        ports::identity::{Caller, CallerCredentials, IdentityProvider},
    },
};

/// Resolves callers from HS256 access tokens. A bearer header wins over the
/// session cookie when both are present.
pub struct JwtIdentityProvider {
    secret: SecretString,
}

impl JwtIdentityProvider {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }
}

#[async_trait]
impl IdentityProvider for JwtIdentityProvider {
    async fn resolve_caller(&self, credentials: &CallerCredentials) -> AppResult<Option<Caller>> {
        let Some(token) = credentials
            .bearer_token
            .as_deref()
            .or(credentials.session_cookie.as_deref())
        else {
            return Ok(None);
        };

        match jwt::verify(token, &self.secret) {
            Ok(claims) => Ok(Some(Caller {
                user_id: claims.sub,
                organization_external_id: claims.org,
                roles: claims.roles,
            })),
            Err(_) => {
                debug!("Access token rejected");
                Ok(None)
            }
        }
    }
}
