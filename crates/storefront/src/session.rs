//! Server-side login sessions and the extractors that require them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use common::{CustomerId, UserId};
use domain::Role;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ApiError;

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "storefront_session";

/// Who is logged in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub user_id: UserId,
    pub username: String,
    pub role: Role,
    /// The customer record sharing the username, if there is one.
    pub customer_id: Option<CustomerId>,
}

impl Session {
    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }
}

#[derive(Debug)]
struct Entry {
    session: Session,
    expires_at: Instant,
}

/// In-memory sessions keyed by an opaque token.
///
/// Every successful lookup pushes the expiry out by the idle timeout.
#[derive(Debug, Clone)]
pub struct SessionStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    idle_timeout: Duration,
}

impl SessionStore {
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            idle_timeout,
        }
    }

    /// Stores `session` and returns its new token.
    pub async fn create(&self, session: Session) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let entry = Entry {
            session,
            expires_at: Instant::now() + self.idle_timeout,
        };
        self.entries.write().await.insert(token.clone(), entry);
        token
    }

    /// Looks up a live session, refreshing its expiry. Expired sessions are dropped.
    pub async fn get(&self, token: &str) -> Option<Session> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        let entry = entries.get_mut(token)?;
        if entry.expires_at <= now {
            entries.remove(token);
            return None;
        }
        entry.expires_at = now + self.idle_timeout;
        Some(entry.session.clone())
    }

    /// Ends a session. Returns whether it existed.
    pub async fn remove(&self, token: &str) -> bool {
        self.entries.write().await.remove(token).is_some()
    }

    /// Drops every expired session and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        let now = Instant::now();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Builds the cookie handed to the browser for `token`.
    pub fn cookie(token: String) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build()
    }

    /// Cookie that clears the session cookie.
    pub fn removal_cookie() -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE).path("/").build()
    }
}

/// Extractor for any logged-in user. Rejects with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Session);

impl<S> FromRequestParts<S> for CurrentUser
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(SESSION_COOKIE).ok_or(ApiError::Unauthorized)?;
        let sessions = SessionStore::from_ref(state);
        let session = sessions
            .get(token.value())
            .await
            .ok_or(ApiError::Unauthorized)?;
        Ok(CurrentUser(session))
    }
}

/// Extractor for administrators. Rejects with 401 when logged out and 403
/// for customers.
#[derive(Debug, Clone)]
pub struct AdminUser(pub Session);

impl<S> FromRequestParts<S> for AdminUser
where
    SessionStore: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(session) = CurrentUser::from_request_parts(parts, state).await?;
        if !session.is_admin() {
            tracing::warn!(username = %session.username, "customer tried an admin action");
            return Err(ApiError::Forbidden);
        }
        Ok(AdminUser(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(role: Role) -> Session {
        Session {
            user_id: UserId::new(),
            username: "jdoe".to_string(),
            role,
            customer_id: None,
        }
    }

    #[tokio::test]
    async fn created_session_can_be_read_back() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(session(Role::Customer)).await;
        let found = store.get(&token).await.unwrap();
        assert_eq!(found.username, "jdoe");
        assert!(!found.is_admin());
    }

    #[tokio::test]
    async fn removed_session_is_gone() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = store.create(session(Role::Admin)).await;
        assert!(store.remove(&token).await);
        assert!(store.get(&token).await.is_none());
        assert!(!store.remove(&token).await);
    }

    #[tokio::test]
    async fn expired_sessions_are_rejected_and_purged() {
        let store = SessionStore::new(Duration::ZERO);
        let first = store.create(session(Role::Customer)).await;
        store.create(session(Role::Customer)).await;
        assert!(store.get(&first).await.is_none());
        assert_eq!(store.purge_expired().await, 1);
    }

    #[test]
    fn session_cookie_is_http_only() {
        let cookie = SessionStore::cookie("abc".to_string());
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
