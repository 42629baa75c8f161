use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::sqlite::{format_datetime, parse_datetime};
use crate::db::DatabaseError;

#[derive(Debug, Clone)]
pub struct SessionRow {
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub fn insert_session(
    conn: &Connection,
    token: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            token,
            user_id,
            format_datetime(Utc::now()),
            format_datetime(expires_at)
        ],
    )?;
    Ok(())
}

pub fn get_session(conn: &Connection, token: &str) -> Result<Option<SessionRow>, DatabaseError> {
    conn.query_row(
        "SELECT token, user_id, created_at, expires_at FROM sessions WHERE token = ?1",
        params![token],
        |row| {
            let created_raw: String = row.get(2)?;
            let expires_raw: String = row.get(3)?;
            let token: String = row.get(0)?;
            let user_id: i64 = row.get(1)?;
            Ok((|| {
                Ok(SessionRow {
                    token,
                    user_id,
                    created_at: parse_datetime(&created_raw)?,
                    expires_at: parse_datetime(&expires_raw)?,
                })
            })())
        },
    )
    .optional()?
    .transpose()
}

pub fn delete_session(conn: &Connection, token: &str) -> Result<(), DatabaseError> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drops every session the user holds. Run before issuing a new one so
/// a user is never logged in from two places at once.
pub fn delete_sessions_for_user(conn: &Connection, user_id: i64) -> Result<usize, DatabaseError> {
    Ok(conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::users;
    use crate::roles::Role;
    use chrono::Duration;

    #[test]
    fn session_round_trip_and_single_session_sweep() {
        let conn = open_memory_database().unwrap();
        let user =
            users::insert_user(&conn, "ana@clinic.example.co", "Ana", Role::Medico, "h", false)
                .unwrap();
        let expires = Utc::now() + Duration::seconds(900);

        insert_session(&conn, "tok-a", user, expires).unwrap();
        insert_session(&conn, "tok-b", user, expires).unwrap();

        let fetched = get_session(&conn, "tok-a").unwrap().unwrap();
        assert_eq!(fetched.user_id, user);

        let swept = delete_sessions_for_user(&conn, user).unwrap();
        assert_eq!(swept, 2);
        assert!(get_session(&conn, "tok-a").unwrap().is_none());
        assert!(get_session(&conn, "tok-b").unwrap().is_none());
    }

    #[test]
    fn deleting_user_cascades_sessions() {
        let conn = open_memory_database().unwrap();
        let user =
            users::insert_user(&conn, "ana@clinic.example.co", "Ana", Role::Medico, "h", false)
                .unwrap();
        insert_session(&conn, "tok", user, Utc::now()).unwrap();

        conn.execute("DELETE FROM users WHERE id = ?1", params![user])
            .unwrap();
        assert!(get_session(&conn, "tok").unwrap().is_none());
    }
}
