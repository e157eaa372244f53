//! Identity and clock doubles.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::{
    app_error::AppResult,
    application::ports::{
        clock::Clock,
        identity::{Caller, CallerCredentials, IdentityProvider},
    },
};

// ============================================================================
// StaticIdentityProvider
// ============================================================================

/// Maps raw tokens to callers. The bearer token is tried before the cookie.
#[derive(Default)]
pub struct StaticIdentityProvider {
    callers: Mutex<HashMap<String, Caller>>,
}

impl StaticIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: &str, caller: Caller) {
        self.callers
            .lock()
            .unwrap()
            .insert(token.to_string(), caller);
    }
}

#[async_trait]
impl IdentityProvider for StaticIdentityProvider {
    async fn resolve_caller(&self, credentials: &CallerCredentials) -> AppResult<Option<Caller>> {
        let callers = self.callers.lock().unwrap();
        let found = credentials
            .bearer_token
            .as_ref()
            .and_then(|t| callers.get(t))
            .or_else(|| {
                credentials
                    .session_cookie
                    .as_ref()
                    .and_then(|t| callers.get(t))
            });
        Ok(found.cloned())
    }
}

// ============================================================================
// ManualClock
// ============================================================================

/// Clock that only moves when told to. Starts mid-month so monthly and
/// trailing windows differ.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::at(Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap())
    }
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
