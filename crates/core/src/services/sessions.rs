//! Login, logout and request-context resolution.
//!
//! A user holds at most one live session: logging in sweeps every
//! session the account already had before issuing the new token.

use chrono::{Duration, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::context::{ActingUser, RequestContext};
use crate::db::repository::{sessions, users};
use crate::error::{CoreError, CoreResult};
use crate::logs::{LogFiles, LogKind};
use crate::models::User;

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Authenticates by email and password and issues a fresh session.
///
/// Every failure mode collapses to [`CoreError::InvalidCredentials`]
/// so a caller cannot probe which emails exist.
pub fn login(
    conn: &Connection,
    email: &str,
    password: &str,
    ttl_secs: i64,
    logs: &LogFiles,
) -> CoreResult<LoginOutcome> {
    let Some(user) = users::get_user_by_email(conn, email)? else {
        logs.append(LogKind::Security, &format!("login fallido: {email}"));
        return Err(CoreError::InvalidCredentials);
    };
    if !user.is_active {
        logs.append(LogKind::Security, &format!("login fallido: {email}"));
        return Err(CoreError::InvalidCredentials);
    }
    let stored = users::password_hash_for(conn, user.id)?.ok_or(CoreError::InvalidCredentials)?;
    if !crate::password::verify_password(password, &stored) {
        logs.append(LogKind::Security, &format!("login fallido: {email}"));
        return Err(CoreError::InvalidCredentials);
    }

    let swept = sessions::delete_sessions_for_user(conn, user.id)?;
    if swept > 0 {
        tracing::debug!(user_id = user.id, swept, "previous sessions invalidated");
    }

    let token = Uuid::new_v4().simple().to_string();
    sessions::insert_session(conn, &token, user.id, Utc::now() + Duration::seconds(ttl_secs))?;

    logs.append(
        LogKind::Security,
        &format!("login correcto: {} ({})", user.name, user.email),
    );
    tracing::info!(user_id = user.id, "session issued");
    Ok(LoginOutcome { token, user })
}

pub fn logout(conn: &Connection, token: &str, logs: &LogFiles) -> CoreResult<()> {
    if let Some(session) = sessions::get_session(conn, token)? {
        sessions::delete_session(conn, token)?;
        logs.append(
            LogKind::Security,
            &format!("logout: usuario {}", session.user_id),
        );
    }
    Ok(())
}

/// Builds the request context for a bearer token.
///
/// An absent, unknown or expired token yields an anonymous context
/// rather than an error; authorization happens later, per operation.
/// Expired sessions are removed on sight.
pub fn resolve_context(conn: &Connection, token: Option<&str>) -> CoreResult<RequestContext> {
    let Some(token) = token else {
        return Ok(RequestContext::anonymous());
    };
    let Some(session) = sessions::get_session(conn, token)? else {
        return Ok(RequestContext::anonymous());
    };
    if session.expires_at <= Utc::now() {
        sessions::delete_session(conn, token)?;
        return Ok(RequestContext::anonymous());
    }
    let Some(user) = users::get_user_by_id(conn, session.user_id)? else {
        return Ok(RequestContext::anonymous());
    };
    if !user.is_active {
        return Ok(RequestContext::anonymous());
    }
    Ok(RequestContext::authenticated(ActingUser {
        id: user.id,
        name: user.name,
        email: user.email,
        role: user.role,
    }))
}
