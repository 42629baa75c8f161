//! Child rows hanging off a clinical record: diagnoses, medications,
//! observations, appointments and attachments.

use std::str::FromStr;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::sqlite::{
    format_datetime, format_naive_datetime, parse_datetime, parse_naive_datetime,
};
use crate::db::DatabaseError;
use crate::models::{
    Appointment, AppointmentStatus, Attachment, Diagnosis, Medication, NewAppointment,
    NewAttachment, NewDiagnosis, NewMedication, NewObservation, Observation, RecordChildren,
};

pub fn insert_diagnosis(
    conn: &Connection,
    record_id: i64,
    new: &NewDiagnosis,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO diagnoses (record_id, description, cie10_code) VALUES (?1, ?2, ?3)",
        params![record_id, new.description, new.cie10_code],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_medication(
    conn: &Connection,
    record_id: i64,
    new: &NewMedication,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO medications (record_id, name) VALUES (?1, ?2)",
        params![record_id, new.name],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_observation(
    conn: &Connection,
    record_id: i64,
    new: &NewObservation,
) -> Result<i64, DatabaseError> {
    let now = format_datetime(Utc::now());
    conn.execute(
        "INSERT INTO observations (record_id, detail, created_at) VALUES (?1, ?2, ?3)",
        params![record_id, new.detail, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_attachment(
    conn: &Connection,
    record_id: i64,
    new: &NewAttachment,
) -> Result<i64, DatabaseError> {
    let now = format_datetime(Utc::now());
    conn.execute(
        "INSERT INTO attachments (record_id, file_name, description, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![record_id, new.file_name, new.description, now],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_appointment(
    conn: &Connection,
    record_id: i64,
    new: &NewAppointment,
) -> Result<i64, DatabaseError> {
    let status = new.status.unwrap_or(AppointmentStatus::Programada);
    conn.execute(
        "INSERT INTO appointments (record_id, scheduled_at, reason, status)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record_id,
            format_naive_datetime(new.scheduled_at),
            new.reason,
            status.as_str()
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a full set of nested children for a record, keeping the
/// collection order the caller supplied.
pub fn insert_children(
    conn: &Connection,
    record_id: i64,
    children: &RecordChildren,
) -> Result<(), DatabaseError> {
    for d in &children.diagnoses {
        insert_diagnosis(conn, record_id, d)?;
    }
    for m in &children.medications {
        insert_medication(conn, record_id, m)?;
    }
    for o in &children.observations {
        insert_observation(conn, record_id, o)?;
    }
    for a in &children.attachments {
        insert_attachment(conn, record_id, a)?;
    }
    Ok(())
}

/// Drops and re-inserts every nested child collection for a record.
/// Appointments are managed individually and are left untouched.
pub fn replace_children(
    conn: &Connection,
    record_id: i64,
    children: &RecordChildren,
) -> Result<(), DatabaseError> {
    for table in ["diagnoses", "medications", "observations", "attachments"] {
        conn.execute(
            &format!("DELETE FROM {table} WHERE record_id = ?1"),
            params![record_id],
        )?;
    }
    insert_children(conn, record_id, children)
}

pub fn diagnoses_for_record(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<Diagnosis>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, description, cie10_code
         FROM diagnoses WHERE record_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![record_id], |row| {
        Ok(Diagnosis {
            id: row.get(0)?,
            record_id: row.get(1)?,
            description: row.get(2)?,
            cie10_code: row.get(3)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn medications_for_record(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<Medication>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, name FROM medications WHERE record_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![record_id], |row| {
        Ok(Medication {
            id: row.get(0)?,
            record_id: row.get(1)?,
            name: row.get(2)?,
        })
    })?;
    Ok(rows.collect::<Result<Vec<_>, _>>()?)
}

pub fn observations_for_record(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<Observation>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, detail, created_at
         FROM observations WHERE record_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![record_id], map_observation_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

pub fn appointments_for_record(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<Appointment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, scheduled_at, reason, status
         FROM appointments WHERE record_id = ?1 ORDER BY scheduled_at",
    )?;
    let rows = stmt.query_map(params![record_id], map_appointment_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

pub fn attachments_for_record(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<Attachment>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT id, record_id, file_name, description, created_at
         FROM attachments WHERE record_id = ?1 ORDER BY id",
    )?;
    let rows = stmt.query_map(params![record_id], map_attachment_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row??);
    }
    Ok(out)
}

pub fn get_appointment(conn: &Connection, id: i64) -> Result<Option<Appointment>, DatabaseError> {
    conn.query_row(
        "SELECT id, record_id, scheduled_at, reason, status FROM appointments WHERE id = ?1",
        params![id],
        map_appointment_row,
    )
    .optional()?
    .transpose()
}

pub fn get_diagnosis(conn: &Connection, id: i64) -> Result<Option<Diagnosis>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, record_id, description, cie10_code FROM diagnoses WHERE id = ?1",
            params![id],
            |row| {
                Ok(Diagnosis {
                    id: row.get(0)?,
                    record_id: row.get(1)?,
                    description: row.get(2)?,
                    cie10_code: row.get(3)?,
                })
            },
        )
        .optional()?)
}

pub fn get_medication(conn: &Connection, id: i64) -> Result<Option<Medication>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id, record_id, name FROM medications WHERE id = ?1",
            params![id],
            |row| {
                Ok(Medication {
                    id: row.get(0)?,
                    record_id: row.get(1)?,
                    name: row.get(2)?,
                })
            },
        )
        .optional()?)
}

pub fn get_observation(conn: &Connection, id: i64) -> Result<Option<Observation>, DatabaseError> {
    conn.query_row(
        "SELECT id, record_id, detail, created_at FROM observations WHERE id = ?1",
        params![id],
        map_observation_row,
    )
    .optional()?
    .transpose()
}

pub fn get_attachment(conn: &Connection, id: i64) -> Result<Option<Attachment>, DatabaseError> {
    conn.query_row(
        "SELECT id, record_id, file_name, description, created_at FROM attachments WHERE id = ?1",
        params![id],
        map_attachment_row,
    )
    .optional()?
    .transpose()
}

/// Deletes one child row by id. `table` must be one of the child
/// tables; callers pass a literal, never user input.
pub fn delete_child_row(
    conn: &Connection,
    table: &'static str,
    id: i64,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(&format!("DELETE FROM {table} WHERE id = ?1"), params![id])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound { entity: table, id });
    }
    Ok(())
}

/// The record a child row belongs to, if the row exists.
pub fn record_id_of_child(
    conn: &Connection,
    table: &'static str,
    id: i64,
) -> Result<Option<i64>, DatabaseError> {
    Ok(conn
        .query_row(
            &format!("SELECT record_id FROM {table} WHERE id = ?1"),
            params![id],
            |row| row.get(0),
        )
        .optional()?)
}

fn map_observation_row(row: &Row<'_>) -> rusqlite::Result<Result<Observation, DatabaseError>> {
    let created_raw: String = row.get(3)?;
    let id: i64 = row.get(0)?;
    let record_id: i64 = row.get(1)?;
    let detail: String = row.get(2)?;
    Ok((|| {
        Ok(Observation {
            id,
            record_id,
            detail,
            created_at: parse_datetime(&created_raw)?,
        })
    })())
}

fn map_appointment_row(row: &Row<'_>) -> rusqlite::Result<Result<Appointment, DatabaseError>> {
    let scheduled_raw: String = row.get(2)?;
    let status_raw: String = row.get(4)?;
    let id: i64 = row.get(0)?;
    let record_id: i64 = row.get(1)?;
    let reason: String = row.get(3)?;
    Ok((|| {
        Ok(Appointment {
            id,
            record_id,
            scheduled_at: parse_naive_datetime(&scheduled_raw)?,
            reason,
            status: AppointmentStatus::from_str(&status_raw)?,
        })
    })())
}

fn map_attachment_row(row: &Row<'_>) -> rusqlite::Result<Result<Attachment, DatabaseError>> {
    let created_raw: String = row.get(4)?;
    let id: i64 = row.get(0)?;
    let record_id: i64 = row.get(1)?;
    let file_name: String = row.get(2)?;
    let description: Option<String> = row.get(3)?;
    Ok((|| {
        Ok(Attachment {
            id,
            record_id,
            file_name,
            description,
            created_at: parse_datetime(&created_raw)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::{patients, records, users};
    use crate::models::{DiagnosisEntry, PatientDraft, RecordDraft, VitalSigns};
    use crate::roles::Role;
    use chrono::{NaiveDate, NaiveDateTime};
    use clinica_types::{Identification, NonEmptyText};

    fn record_fixture(conn: &Connection) -> i64 {
        let medico = users::insert_user(
            conn,
            "medico@clinic.example.co",
            "Dra. Ruiz",
            Role::Medico,
            "h",
            false,
        )
        .unwrap();
        let patient = patients::insert_patient(
            conn,
            &PatientDraft {
                full_name: NonEmptyText::new("Ana López").unwrap(),
                identification: Identification::new("1094").unwrap(),
                birth_date: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
                contact: None,
                insurer_id: None,
            },
        )
        .unwrap();
        let draft = RecordDraft {
            patient_id: patient,
            admission_date: None,
            closure_date: None,
            chief_complaint: None,
            clinical_summary: None,
            review_of_systems: None,
            physical_exam: None,
            vitals: VitalSigns::default(),
            diagnoses: vec![DiagnosisEntry {
                codigo: None,
                descripcion: "Control".into(),
            }],
            treatment_plan: None,
            recommendations: None,
        };
        records::insert_record(conn, &draft, medico, None, None).unwrap()
    }

    #[test]
    fn insert_and_replace_children() {
        let conn = open_memory_database().unwrap();
        let record = record_fixture(&conn);

        let first = RecordChildren {
            diagnoses: vec![NewDiagnosis {
                description: "Hipertensión".into(),
                cie10_code: Some("I10".into()),
            }],
            medications: vec![NewMedication {
                name: "Losartán 50 mg".into(),
            }],
            observations: vec![],
            attachments: vec![],
        };
        insert_children(&conn, record, &first).unwrap();
        assert_eq!(diagnoses_for_record(&conn, record).unwrap().len(), 1);
        assert_eq!(medications_for_record(&conn, record).unwrap().len(), 1);

        let second = RecordChildren {
            diagnoses: vec![
                NewDiagnosis {
                    description: "Hipertensión".into(),
                    cie10_code: Some("I10".into()),
                },
                NewDiagnosis {
                    description: "Diabetes".into(),
                    cie10_code: Some("E11".into()),
                },
            ],
            medications: vec![],
            observations: vec![NewObservation {
                detail: "Evoluciona bien".into(),
            }],
            attachments: vec![],
        };
        replace_children(&conn, record, &second).unwrap();

        let diagnoses = diagnoses_for_record(&conn, record).unwrap();
        assert_eq!(diagnoses.len(), 2);
        assert_eq!(diagnoses[1].description, "Diabetes");
        assert!(medications_for_record(&conn, record).unwrap().is_empty());
        assert_eq!(observations_for_record(&conn, record).unwrap().len(), 1);
    }

    #[test]
    fn replace_leaves_appointments_alone() {
        let conn = open_memory_database().unwrap();
        let record = record_fixture(&conn);

        insert_appointment(
            &conn,
            record,
            &NewAppointment {
                scheduled_at: NaiveDateTime::parse_from_str(
                    "2026-09-15 10:30:00",
                    "%Y-%m-%d %H:%M:%S",
                )
                .unwrap(),
                reason: "Control mensual".into(),
                status: None,
            },
        )
        .unwrap();

        replace_children(&conn, record, &RecordChildren::default()).unwrap();
        assert_eq!(appointments_for_record(&conn, record).unwrap().len(), 1);
    }

    #[test]
    fn appointment_round_trip() {
        let conn = open_memory_database().unwrap();
        let record = record_fixture(&conn);

        let scheduled =
            NaiveDateTime::parse_from_str("2026-09-15 10:30:00", "%Y-%m-%d %H:%M:%S").unwrap();
        let id = insert_appointment(
            &conn,
            record,
            &NewAppointment {
                scheduled_at: scheduled,
                reason: "Control".into(),
                status: Some(AppointmentStatus::Atendida),
            },
        )
        .unwrap();

        let fetched = get_appointment(&conn, id).unwrap().unwrap();
        assert_eq!(fetched.scheduled_at, scheduled);
        assert_eq!(fetched.status, AppointmentStatus::Atendida);
        assert_eq!(record_id_of_child(&conn, "appointments", id).unwrap(), Some(record));

        delete_child_row(&conn, "appointments", id).unwrap();
        assert!(get_appointment(&conn, id).unwrap().is_none());
        assert!(matches!(
            delete_child_row(&conn, "appointments", id),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
