use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::sqlite::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::{Insurer, NewInsurer};

pub fn insert_insurer(conn: &Connection, new: &NewInsurer) -> Result<i64, DatabaseError> {
    let now = format_datetime(Utc::now());
    conn.execute(
        "INSERT INTO insurers (name, code, contact_email, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)",
        params![
            new.name.as_str(),
            new.code.as_str(),
            new.contact_email.as_ref().map(|e| e.as_str().to_owned()),
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_insurer(conn: &Connection, id: i64) -> Result<Option<Insurer>, DatabaseError> {
    conn.query_row(
        "SELECT id, name, code, contact_email, created_at, updated_at
         FROM insurers WHERE id = ?1",
        params![id],
        map_insurer_row,
    )
    .optional()?
    .transpose()
}

pub fn list_insurers(conn: &Connection) -> Result<Vec<Insurer>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, code, contact_email, created_at, updated_at
         FROM insurers ORDER BY name",
    )?;
    let rows = stmt.query_map([], map_insurer_row)?;
    let mut insurers = Vec::new();
    for row in rows {
        insurers.push(row??);
    }
    Ok(insurers)
}

/// Removes an insurer. Patients referencing it keep existing with
/// their insurer cleared (ON DELETE SET NULL).
pub fn delete_insurer(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM insurers WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "insurer",
            id,
        });
    }
    Ok(())
}

fn map_insurer_row(row: &Row<'_>) -> rusqlite::Result<Result<Insurer, DatabaseError>> {
    let created_raw: String = row.get(4)?;
    let updated_raw: String = row.get(5)?;
    Ok((|| {
        Ok(Insurer {
            id: row.get(0)?,
            name: row.get(1)?,
            code: row.get(2)?,
            contact_email: row.get(3)?,
            created_at: parse_datetime(&created_raw)?,
            updated_at: parse_datetime(&updated_raw)?,
        })
    })())
}
