//! Account creation and credential management.

use rusqlite::Connection;

use crate::context::RequestContext;
use crate::db::repository::users;
use crate::error::{CoreError, CoreResult};
use crate::logs::{LogFiles, LogKind};
use crate::models::{NewUser, User};
use crate::password;

const MIN_PASSWORD_LEN: usize = 8;

/// Creates a user account.
///
/// Group membership is provisioned here, once, from the role the
/// account is created with. Later role changes deliberately leave
/// memberships untouched.
pub fn register_user(conn: &Connection, new: &NewUser, logs: &LogFiles) -> CoreResult<User> {
    if new.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    if users::get_user_by_email(conn, new.email.as_str())?.is_some() {
        return Err(CoreError::Validation(format!(
            "an account with email {} already exists",
            new.email
        )));
    }

    let hash = password::hash_password(&new.password);
    let is_staff = new.role == crate::roles::Role::Admin;
    let id = users::insert_user(
        conn,
        new.email.as_str(),
        new.name.as_str(),
        new.role,
        &hash,
        is_staff,
    )?;

    if let Some(group) = new.role.group_name() {
        users::add_user_to_group(conn, id, group)?;
    }

    let user = users::get_user_by_id(conn, id)?.ok_or(CoreError::NotFound {
        entity: "user",
        id,
    })?;
    logs.append(
        LogKind::Users,
        &format!("cuenta creada: {} ({}) rol {}", user.name, user.email, user.role),
    );
    tracing::info!(user_id = id, role = %user.role, "account created");
    Ok(user)
}

/// Changes the authenticated user's own password after verifying the
/// current one.
pub fn change_password(
    conn: &Connection,
    ctx: &RequestContext,
    current: &str,
    new_password: &str,
) -> CoreResult<()> {
    let user = ctx.user().ok_or(CoreError::PermissionDenied)?;
    if new_password.chars().count() < MIN_PASSWORD_LEN {
        return Err(CoreError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    let stored = users::password_hash_for(conn, user.id)?.ok_or(CoreError::NotFound {
        entity: "user",
        id: user.id,
    })?;
    if !password::verify_password(current, &stored) {
        return Err(CoreError::InvalidCredentials);
    }

    users::set_password_hash(conn, user.id, &password::hash_password(new_password))?;
    tracing::info!(user_id = user.id, "password changed");
    Ok(())
}
