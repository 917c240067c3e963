//! Session evaluation over the token store.
//!
//! Nothing here is cached: each query re-reads the store and the clock, so a
//! token that expires (or is replaced by another process) is noticed on the
//! next call.

use chrono::{DateTime, Duration, Utc};

use crate::claims::{self, Claims};
use crate::{RoleLevel, TokenStore};

/// Unauthenticated entry point of the application.
pub const ROOT_ROUTE: &str = "/";

/// Client-side navigation hook, invoked when a session is torn down.
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: &str);
}

/// Navigator for contexts with nowhere to go (tests, batch tools).
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNavigator;

impl Navigator for NoopNavigator {
    fn navigate(&self, _route: &str) {}
}

#[derive(Debug, Clone)]
pub struct Session {
    tokens: TokenStore,
}

impl Session {
    pub fn new(tokens: TokenStore) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// Claims of the stored access token, if it is readable.
    pub fn claims(&self) -> Option<Claims> {
        claims::decode(&self.tokens.access_token()?)
    }

    pub fn is_authenticated(&self) -> bool {
        self.is_authenticated_at(Utc::now())
    }

    /// An access token is stored and is not expired at `now`.
    pub fn is_authenticated_at(&self, now: DateTime<Utc>) -> bool {
        match self.tokens.access_token() {
            Some(token) => !claims::is_expired_at(&token, now),
            None => false,
        }
    }

    pub fn role_level(&self) -> Option<RoleLevel> {
        self.role_level_at(Utc::now())
    }

    /// Role level carried by the access token, only while the session is
    /// authenticated at `now`.
    pub fn role_level_at(&self, now: DateTime<Utc>) -> Option<RoleLevel> {
        if !self.is_authenticated_at(now) {
            return None;
        }
        self.claims()?.level
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.claims()?.expires_at()
    }

    pub fn is_expiring_soon_at(&self, threshold: Duration, now: DateTime<Utc>) -> bool {
        self.tokens
            .access_token()
            .is_none_or(|token| claims::is_expiring_soon_at(&token, threshold, now))
    }

    pub fn time_until_expiration_at(&self, now: DateTime<Utc>) -> Option<String> {
        claims::time_until_expiration_at(&self.tokens.access_token()?, now)
    }

    pub fn time_until_expiration(&self) -> Option<String> {
        self.time_until_expiration_at(Utc::now())
    }

    /// Drop the session and return to the entry point.
    pub fn logout(&self, navigator: &dyn Navigator) {
        tracing::info!("logging out");
        self.tokens.clear();
        navigator.navigate(ROOT_ROUTE);
    }

    /// Tear down an invalid session in an interactive context.
    ///
    /// Returns whether the caller may proceed. Headless contexts have no
    /// session to enforce and always proceed.
    pub fn require_auth(&self, navigator: &dyn Navigator) -> bool {
        self.require_auth_at(navigator, Utc::now())
    }

    pub fn require_auth_at(&self, navigator: &dyn Navigator, now: DateTime<Utc>) -> bool {
        if !self.tokens.is_interactive() || self.is_authenticated_at(now) {
            return true;
        }

        tracing::info!("session missing or expired; returning to entry point");
        self.tokens.clear();
        navigator.navigate(ROOT_ROUTE);
        false
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use chrono::TimeZone;

    use super::*;
    use crate::claims::test_tokens::expiring_at;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }

    #[derive(Default)]
    struct RecordingNavigator {
        routes: Mutex<Vec<String>>,
    }

    impl Navigator for RecordingNavigator {
        fn navigate(&self, route: &str) {
            self.routes.lock().unwrap().push(route.to_string());
        }
    }

    fn session_with(token: Option<&str>) -> Session {
        let store = TokenStore::in_memory();
        if let Some(token) = token {
            store.set(token, Some("refresh"));
        }
        Session::new(store)
    }

    #[test]
    fn no_token_is_never_authenticated() {
        let session = session_with(None);
        assert!(!session.is_authenticated_at(now()));
        assert_eq!(session.role_level_at(now()), None);
    }

    #[test]
    fn live_token_is_authenticated_with_level() {
        let session = session_with(Some(&expiring_at(1_700_000_600, Some(1))));
        assert!(session.is_authenticated_at(now()));
        assert_eq!(session.role_level_at(now()), Some(RoleLevel::new(1)));
    }

    #[test]
    fn expired_token_reports_expired() {
        let session = session_with(Some(&expiring_at(1_699_999_990, Some(0))));
        assert!(!session.is_authenticated_at(now()));
        assert_eq!(session.time_until_expiration_at(now()).as_deref(), Some("Expired"));
    }

    #[test]
    fn expired_token_grants_no_role() {
        let token = expiring_at(1_700_000_600, Some(0));
        let session = session_with(Some(&token));

        assert_eq!(session.role_level_at(now()), Some(RoleLevel::SUPER_ADMIN));
        let later = Utc.timestamp_opt(1_700_000_601, 0).unwrap();
        assert_eq!(session.role_level_at(later), None);
        assert_eq!(session.claims().and_then(|c| c.level), Some(RoleLevel::SUPER_ADMIN));
    }

    #[test]
    fn refresh_token_alone_is_not_a_session() {
        let store = TokenStore::in_memory();
        store.set("", Some("refresh"));
        let session = Session::new(store);

        assert_eq!(session.tokens().refresh_token().as_deref(), Some("refresh"));
        assert_eq!(session.tokens().access_token(), None);
        assert!(!session.is_authenticated_at(now()));
        assert_eq!(session.role_level_at(now()), None);
        assert!(session.is_expiring_soon_at(Duration::seconds(300), now()));
    }

    #[test]
    fn malformed_token_is_not_authenticated() {
        let session = session_with(Some("definitely-not-a-token"));
        assert!(!session.is_authenticated_at(now()));
        assert_eq!(session.role_level_at(now()), None);
        assert!(session.is_expiring_soon_at(Duration::seconds(300), now()));
    }

    #[test]
    fn evaluation_never_mutates_the_store() {
        let session = session_with(Some("garbage"));
        let _ = session.is_authenticated_at(now());
        let _ = session.role_level_at(now());
        assert_eq!(session.tokens().access_token().as_deref(), Some("garbage"));
    }

    #[test]
    fn logout_clears_and_navigates_home() {
        let session = session_with(Some(&expiring_at(1_700_000_600, None)));
        let navigator = RecordingNavigator::default();

        session.logout(&navigator);

        assert_eq!(session.tokens().access_token(), None);
        assert_eq!(session.tokens().refresh_token(), None);
        assert_eq!(*navigator.routes.lock().unwrap(), vec![ROOT_ROUTE]);
    }

    #[test]
    fn require_auth_tears_down_expired_session() {
        let session = session_with(Some(&expiring_at(1_699_999_990, None)));
        let navigator = RecordingNavigator::default();

        assert!(!session.require_auth_at(&navigator, now()));
        assert_eq!(session.tokens().refresh_token(), None);
        assert_eq!(navigator.routes.lock().unwrap().len(), 1);
    }

    #[test]
    fn require_auth_passes_live_session_untouched() {
        let session = session_with(Some(&expiring_at(1_700_000_600, None)));
        let navigator = RecordingNavigator::default();

        assert!(session.require_auth_at(&navigator, now()));
        assert!(navigator.routes.lock().unwrap().is_empty());
        assert!(session.tokens().refresh_token().is_some());
    }

    #[test]
    fn require_auth_is_a_no_op_when_headless() {
        let session = Session::new(TokenStore::headless());
        let navigator = RecordingNavigator::default();

        assert!(session.require_auth_at(&navigator, now()));
        assert!(navigator.routes.lock().unwrap().is_empty());
    }
}
