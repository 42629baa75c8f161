use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::sqlite::{format_date, format_datetime, parse_date, parse_datetime};
use crate::db::DatabaseError;
use crate::models::{Patient, PatientDraft};

const PATIENT_COLUMNS: &str =
    "id, full_name, identification, birth_date, contact, insurer_id, created_at, updated_at";

pub fn insert_patient(conn: &Connection, draft: &PatientDraft) -> Result<i64, DatabaseError> {
    let now = format_datetime(Utc::now());
    conn.execute(
        "INSERT INTO patients (full_name, identification, birth_date, contact, insurer_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            draft.full_name.as_str(),
            draft.identification.as_str(),
            format_date(draft.birth_date),
            draft.contact,
            draft.insurer_id,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_patient(
    conn: &Connection,
    id: i64,
    draft: &PatientDraft,
) -> Result<(), DatabaseError> {
    let now = format_datetime(Utc::now());
    let changed = conn.execute(
        "UPDATE patients
         SET full_name = ?1, identification = ?2, birth_date = ?3, contact = ?4,
             insurer_id = ?5, updated_at = ?6
         WHERE id = ?7",
        params![
            draft.full_name.as_str(),
            draft.identification.as_str(),
            format_date(draft.birth_date),
            draft.contact,
            draft.insurer_id,
            now,
            id
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "patient",
            id,
        });
    }
    Ok(())
}

pub fn get_patient(conn: &Connection, id: i64) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE id = ?1"),
        params![id],
        map_patient_row,
    )
    .optional()?
    .transpose()
}

pub fn get_patient_by_identification(
    conn: &Connection,
    identification: &str,
) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {PATIENT_COLUMNS} FROM patients WHERE identification = ?1"),
        params![identification],
        map_patient_row,
    )
    .optional()?
    .transpose()
}

pub fn list_patients(conn: &Connection) -> Result<Vec<Patient>, DatabaseError> {
    let mut stmt =
        conn.prepare(&format!("SELECT {PATIENT_COLUMNS} FROM patients ORDER BY full_name"))?;
    let rows = stmt.query_map([], map_patient_row)?;
    collect_patients(rows)
}

/// Substring search over name and identification.
pub fn search_patients(conn: &Connection, query: &str) -> Result<Vec<Patient>, DatabaseError> {
    let like = format!("%{query}%");
    let mut stmt = conn.prepare(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patients
         WHERE full_name LIKE ?1 OR identification LIKE ?1
         ORDER BY full_name"
    ))?;
    let rows = stmt.query_map(params![like], map_patient_row)?;
    collect_patients(rows)
}

/// Removes a patient. The clinical record and every nested child row
/// go with it through the cascade.
pub fn delete_patient(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let changed = conn.execute("DELETE FROM patients WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "patient",
            id,
        });
    }
    Ok(())
}

fn collect_patients(
    rows: rusqlite::MappedRows<'_, impl FnMut(&Row<'_>) -> rusqlite::Result<Result<Patient, DatabaseError>>>,
) -> Result<Vec<Patient>, DatabaseError> {
    let mut patients = Vec::new();
    for row in rows {
        patients.push(row??);
    }
    Ok(patients)
}

fn map_patient_row(row: &Row<'_>) -> rusqlite::Result<Result<Patient, DatabaseError>> {
    let birth_raw: String = row.get(3)?;
    let created_raw: String = row.get(6)?;
    let updated_raw: String = row.get(7)?;
    Ok((|| {
        Ok(Patient {
            id: row.get(0)?,
            full_name: row.get(1)?,
            identification: row.get(2)?,
            birth_date: parse_date(&birth_raw)?,
            contact: row.get(4)?,
            insurer_id: row.get(5)?,
            created_at: parse_datetime(&created_raw)?,
            updated_at: parse_datetime(&updated_raw)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::insurers;
    use chrono::NaiveDate;
    use clinica_types::{Identification, NonEmptyText};

    pub(crate) fn draft(name: &str, identification: &str) -> PatientDraft {
        PatientDraft {
            full_name: NonEmptyText::new(name).unwrap(),
            identification: Identification::new(identification).unwrap(),
            birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
            contact: Some("300 123 4567".into()),
            insurer_id: None,
        }
    }

    #[test]
    fn identification_is_unique() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &draft("Ana López", "1094")).unwrap();
        let dup = insert_patient(&conn, &draft("Otra Persona", "1094"));
        assert!(matches!(dup, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn search_matches_name_and_identification() {
        let conn = open_memory_database().unwrap();
        insert_patient(&conn, &draft("Ana López", "1094")).unwrap();
        insert_patient(&conn, &draft("Benito Pérez", "2203")).unwrap();

        assert_eq!(search_patients(&conn, "lóp").unwrap().len(), 1);
        assert_eq!(search_patients(&conn, "22").unwrap().len(), 1);
        assert_eq!(search_patients(&conn, "zzz").unwrap().len(), 0);
    }

    #[test]
    fn deleting_insurer_clears_patient_reference() {
        let conn = open_memory_database().unwrap();
        let eps_id = insurers::insert_insurer(
            &conn,
            &crate::models::NewInsurer {
                name: NonEmptyText::new("Salud Total").unwrap(),
                code: NonEmptyText::new("ST01").unwrap(),
                contact_email: None,
            },
        )
        .unwrap();

        let mut d = draft("Ana López", "1094");
        d.insurer_id = Some(eps_id);
        let patient_id = insert_patient(&conn, &d).unwrap();

        insurers::delete_insurer(&conn, eps_id).unwrap();

        let patient = get_patient(&conn, patient_id).unwrap().unwrap();
        assert_eq!(patient.insurer_id, None);
    }
}
