use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::sqlite::{format_datetime, parse_datetime};
use crate::db::DatabaseError;
use crate::models::DeletionAuditEntry;

/// Appends one deletion audit row. Audit rows are write-once; there is
/// deliberately no update or delete counterpart.
pub fn insert_deletion_entry(
    conn: &Connection,
    actor_id: Option<i64>,
    entity: &str,
    entity_id: i64,
    detail: &str,
    occurred_at: DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO deletion_audit (actor_id, entity, entity_id, detail, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![actor_id, entity, entity_id, detail, format_datetime(occurred_at)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list_deletion_entries(conn: &Connection) -> Result<Vec<DeletionAuditEntry>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, actor_id, entity, entity_id, detail, created_at
         FROM deletion_audit ORDER BY id",
    )?;
    let rows = stmt.query_map([], map_audit_row)?;
    let mut entries = Vec::new();
    for row in rows {
        entries.push(row??);
    }
    Ok(entries)
}

fn map_audit_row(row: &Row<'_>) -> rusqlite::Result<Result<DeletionAuditEntry, DatabaseError>> {
    let created_raw: String = row.get(5)?;
    let id: i64 = row.get(0)?;
    let actor_id: Option<i64> = row.get(1)?;
    let entity: String = row.get(2)?;
    let entity_id: i64 = row.get(3)?;
    let detail: String = row.get(4)?;
    Ok((|| {
        Ok(DeletionAuditEntry {
            id,
            actor_id,
            entity,
            entity_id,
            detail,
            created_at: parse_datetime(&created_raw)?,
        })
    })())
}
