//! Registration, login and logout.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum_extra::extract::cookie::CookieJar;
use common::CustomerId;
use domain::{Registration, Role};
use serde::{Deserialize, Serialize};
use store::Store;

use super::json_body;
use crate::AppState;
use crate::error::ApiError;
use crate::session::{CurrentUser, SESSION_COOKIE, Session, SessionStore};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct RegisteredResponse {
    pub message: &'static str,
    pub username: String,
    pub customer_id: CustomerId,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

/// POST /auth/register
#[tracing::instrument(skip(state, body))]
pub async fn register<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    body: Result<Json<Registration>, JsonRejection>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    let registration = json_body(body)?;
    let customer = state.accounts.register(registration).await?;
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "Registration successful! Please login.",
            username: customer.username,
            customer_id: customer.id,
        }),
    ))
}

/// POST /auth/login: starts a session and sets the session cookie.
#[tracing::instrument(skip(state, jar, body))]
pub async fn login<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<(CookieJar, Json<Session>), ApiError> {
    let request = json_body(body)?;
    let session = state
        .accounts
        .login(&request.username, &request.password, request.role)
        .await?;

    if let Some(previous) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(previous.value()).await;
    }
    let token = state.sessions.create(session.clone()).await;
    Ok((jar.add(SessionStore::cookie(token)), Json(session)))
}

/// POST /auth/logout: ends the session, if any.
#[tracing::instrument(skip(state, jar))]
pub async fn logout<S: Store>(
    State(state): State<Arc<AppState<S>>>,
    jar: CookieJar,
) -> (CookieJar, Json<MessageResponse>) {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.remove(cookie.value()).await;
    }
    (
        jar.remove(SessionStore::removal_cookie()),
        Json(MessageResponse {
            message: "You have been logged out",
        }),
    )
}

/// GET /auth/me
pub async fn me(CurrentUser(session): CurrentUser) -> Json<Session> {
    Json(session)
}
