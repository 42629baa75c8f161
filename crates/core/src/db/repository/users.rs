use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::sqlite::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::User;
use crate::roles::Role;

pub fn insert_user(
    conn: &Connection,
    email: &str,
    name: &str,
    role: Role,
    password_hash: &str,
    is_staff: bool,
) -> Result<i64, DatabaseError> {
    let now = format_datetime(Utc::now());
    conn.execute(
        "INSERT INTO users (email, name, role, password_hash, is_active, is_staff, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6)",
        params![email, name, role.as_str(), password_hash, is_staff, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_user_by_id(conn: &Connection, id: i64) -> Result<Option<User>, DatabaseError> {
    conn.query_row(
        "SELECT id, email, name, role, is_active, is_staff, created_at, updated_at
         FROM users WHERE id = ?1",
        params![id],
        map_user_row,
    )
    .optional()?
    .transpose()
}

pub fn get_user_by_email(conn: &Connection, email: &str) -> Result<Option<User>, DatabaseError> {
    conn.query_row(
        "SELECT id, email, name, role, is_active, is_staff, created_at, updated_at
         FROM users WHERE email = ?1",
        params![email],
        map_user_row,
    )
    .optional()?
    .transpose()
}

pub fn password_hash_for(conn: &Connection, user_id: i64) -> Result<Option<String>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT password_hash FROM users WHERE id = ?1",
            params![user_id],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn set_password_hash(
    conn: &Connection,
    user_id: i64,
    password_hash: &str,
) -> Result<(), DatabaseError> {
    let now = format_datetime(Utc::now());
    let changed = conn.execute(
        "UPDATE users SET password_hash = ?1, updated_at = ?2 WHERE id = ?3",
        params![password_hash, now, user_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "user",
            id: user_id,
        });
    }
    Ok(())
}

/// Changes the stored role without touching group memberships.
/// Provisioning is a creation-time side effect only.
pub fn set_role(conn: &Connection, user_id: i64, role: Role) -> Result<(), DatabaseError> {
    let now = format_datetime(Utc::now());
    let changed = conn.execute(
        "UPDATE users SET role = ?1, updated_at = ?2 WHERE id = ?3",
        params![role.as_str(), now, user_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "user",
            id: user_id,
        });
    }
    Ok(())
}

pub fn add_user_to_group(
    conn: &Connection,
    user_id: i64,
    group_name: &str,
) -> Result<(), DatabaseError> {
    conn.execute("INSERT OR IGNORE INTO groups (name) VALUES (?1)", params![group_name])?;
    let group_id: i64 = conn.query_row(
        "SELECT id FROM groups WHERE name = ?1",
        params![group_name],
        |row| row.get(0),
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO user_groups (user_id, group_id) VALUES (?1, ?2)",
        params![user_id, group_id],
    )?;
    Ok(())
}

pub fn groups_for_user(conn: &Connection, user_id: i64) -> Result<Vec<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT g.name FROM groups g
         JOIN user_groups ug ON ug.group_id = g.id
         WHERE ug.user_id = ?1
         ORDER BY g.name",
    )?;
    let rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<Result<User, DatabaseError>> {
    let role_raw: String = row.get(3)?;
    let created_raw: String = row.get(6)?;
    let updated_raw: String = row.get(7)?;
    Ok((|| {
        Ok(User {
            id: row.get(0)?,
            email: row.get(1)?,
            name: row.get(2)?,
            role: Role::from_str(&role_raw)?,
            is_active: row.get(4)?,
            is_staff: row.get(5)?,
            created_at: parse_datetime(&created_raw)?,
            updated_at: parse_datetime(&updated_raw)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn insert_and_fetch_user_by_email() {
        let conn = open_memory_database().unwrap();
        let id = insert_user(&conn, "ana@clinic.example.co", "Ana", Role::Medico, "h", false)
            .unwrap();

        let user = get_user_by_email(&conn, "ana@clinic.example.co")
            .unwrap()
            .expect("user should exist");
        assert_eq!(user.id, id);
        assert_eq!(user.role, Role::Medico);
        assert!(user.is_active);
        assert!(!user.is_staff);
    }

    #[test]
    fn email_uniqueness_is_a_storage_constraint() {
        let conn = open_memory_database().unwrap();
        insert_user(&conn, "ana@clinic.example.co", "Ana", Role::Medico, "h", false).unwrap();
        let dup = insert_user(&conn, "ana@clinic.example.co", "Otra", Role::Admin, "h", false);
        assert!(matches!(dup, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn group_membership_round_trip() {
        let conn = open_memory_database().unwrap();
        let id = insert_user(&conn, "ana@clinic.example.co", "Ana", Role::Medico, "h", false)
            .unwrap();
        add_user_to_group(&conn, id, "Physicians").unwrap();
        add_user_to_group(&conn, id, "Physicians").unwrap(); // idempotent

        assert_eq!(groups_for_user(&conn, id).unwrap(), vec!["Physicians"]);
    }

    #[test]
    fn set_role_does_not_touch_groups() {
        let conn = open_memory_database().unwrap();
        let id = insert_user(&conn, "ana@clinic.example.co", "Ana", Role::Medico, "h", false)
            .unwrap();
        add_user_to_group(&conn, id, "Physicians").unwrap();

        set_role(&conn, id, Role::Admin).unwrap();

        let user = get_user_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(user.role, Role::Admin);
        assert_eq!(groups_for_user(&conn, id).unwrap(), vec!["Physicians"]);
    }
}
