use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::sqlite::{format_date, format_datetime, parse_date, parse_datetime};
use crate::db::DatabaseError;
use crate::models::{ClinicalRecord, DiagnosisEntry, RecordDraft, VitalSigns};

const RECORD_COLUMNS: &str = "id, patient_id, medico_responsable_id, usuario_registra_id, \
     admission_date, closure_date, chief_complaint, clinical_summary, review_of_systems, \
     physical_exam, fc, fr, blood_pressure, temperature, saturation, weight_kg, height_cm, \
     bmi, diagnoses, treatment_plan, recommendations, created_at, updated_at";

/// Child collections checked before a record can be deleted. Names
/// are the ones surfaced to the caller in refusal messages.
pub const DEPENDENCY_TABLES: &[(&str, &str)] = &[
    ("diagnosticos", "diagnoses"),
    ("medicamentos", "medications"),
    ("observaciones", "observations"),
    ("citas", "appointments"),
    ("adjuntos", "attachments"),
];

pub fn insert_record(
    conn: &Connection,
    draft: &RecordDraft,
    medico_responsable_id: i64,
    usuario_registra_id: Option<i64>,
    bmi: Option<f64>,
) -> Result<i64, DatabaseError> {
    let now = format_datetime(Utc::now());
    let admission = draft
        .admission_date
        .unwrap_or_else(|| Utc::now().date_naive());
    conn.execute(
        "INSERT INTO clinical_records (
             patient_id, medico_responsable_id, usuario_registra_id,
             admission_date, closure_date, chief_complaint, clinical_summary,
             review_of_systems, physical_exam, fc, fr, blood_pressure,
             temperature, saturation, weight_kg, height_cm, bmi, diagnoses,
             treatment_plan, recommendations, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                   ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?21)",
        params![
            draft.patient_id,
            medico_responsable_id,
            usuario_registra_id,
            format_date(admission),
            draft.closure_date.map(format_date),
            draft.chief_complaint,
            draft.clinical_summary,
            encode_review_of_systems(draft.review_of_systems.as_ref())?,
            draft.physical_exam,
            draft.vitals.fc,
            draft.vitals.fr,
            draft.vitals.blood_pressure,
            draft.vitals.temperature,
            draft.vitals.saturation,
            draft.vitals.weight_kg,
            draft.vitals.height_cm,
            bmi,
            encode_diagnoses(&draft.diagnoses)?,
            draft.treatment_plan,
            draft.recommendations,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_record(
    conn: &Connection,
    id: i64,
    draft: &RecordDraft,
    bmi: Option<f64>,
) -> Result<(), DatabaseError> {
    let now = format_datetime(Utc::now());
    let admission = draft
        .admission_date
        .unwrap_or_else(|| Utc::now().date_naive());
    let changed = conn.execute(
        "UPDATE clinical_records SET
             patient_id = ?1, admission_date = ?2, closure_date = ?3,
             chief_complaint = ?4, clinical_summary = ?5, review_of_systems = ?6,
             physical_exam = ?7, fc = ?8, fr = ?9, blood_pressure = ?10,
             temperature = ?11, saturation = ?12, weight_kg = ?13, height_cm = ?14,
             bmi = ?15, diagnoses = ?16, treatment_plan = ?17, recommendations = ?18,
             updated_at = ?19
         WHERE id = ?20",
        params![
            draft.patient_id,
            format_date(admission),
            draft.closure_date.map(format_date),
            draft.chief_complaint,
            draft.clinical_summary,
            encode_review_of_systems(draft.review_of_systems.as_ref())?,
            draft.physical_exam,
            draft.vitals.fc,
            draft.vitals.fr,
            draft.vitals.blood_pressure,
            draft.vitals.temperature,
            draft.vitals.saturation,
            draft.vitals.weight_kg,
            draft.vitals.height_cm,
            bmi,
            encode_diagnoses(&draft.diagnoses)?,
            draft.treatment_plan,
            draft.recommendations,
            now,
            id
        ],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "clinical record",
            id,
        });
    }
    Ok(())
}

pub fn get_record(conn: &Connection, id: i64) -> Result<Option<ClinicalRecord>, DatabaseError> {
    conn.query_row(
        &format!("SELECT {RECORD_COLUMNS} FROM clinical_records WHERE id = ?1"),
        params![id],
        map_record_row,
    )
    .optional()?
    .transpose()
}

/// Id of the record referencing `patient_id`, if one exists.
pub fn record_id_for_patient(
    conn: &Connection,
    patient_id: i64,
) -> Result<Option<i64>, DatabaseError> {
    Ok(conn
        .query_row(
            "SELECT id FROM clinical_records WHERE patient_id = ?1",
            params![patient_id],
            |row| row.get(0),
        )
        .optional()?)
}

/// All records, in the store's natural retrieval order.
pub fn list_records(conn: &Connection) -> Result<Vec<ClinicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM clinical_records"))?;
    let rows = stmt.query_map([], map_record_row)?;
    collect_records(rows)
}

pub fn list_records_for_medico(
    conn: &Connection,
    medico_id: i64,
) -> Result<Vec<ClinicalRecord>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {RECORD_COLUMNS} FROM clinical_records WHERE medico_responsable_id = ?1"
    ))?;
    let rows = stmt.query_map(params![medico_id], map_record_row)?;
    collect_records(rows)
}

/// Counts of dependent child rows, one entry per non-empty collection.
pub fn dependency_counts(
    conn: &Connection,
    record_id: i64,
) -> Result<Vec<(String, i64)>, DatabaseError> {
    let mut counts = Vec::new();
    for (label, table) in DEPENDENCY_TABLES {
        let count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE record_id = ?1"),
            params![record_id],
            |row| row.get(0),
        )?;
        if count > 0 {
            counts.push(((*label).to_owned(), count));
        }
    }
    Ok(counts)
}

/// Deletes a clinical record.
///
/// Re-checks the dependency rule even though the service layer does
/// too: a record with live diagnoses, medications, observations,
/// appointments or attachments is never removed through this path.
pub fn delete_record(conn: &Connection, id: i64) -> Result<(), DatabaseError> {
    let dependencies = dependency_counts(conn, id)?;
    if !dependencies.is_empty() {
        let listing = dependencies
            .iter()
            .map(|(name, count)| format!("{name} ({count})"))
            .collect::<Vec<_>>()
            .join(", ");
        return Err(DatabaseError::ConstraintViolation(format!(
            "clinical record {id} has associated rows: {listing}"
        )));
    }

    let changed = conn.execute("DELETE FROM clinical_records WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity: "clinical record",
            id,
        });
    }
    Ok(())
}

fn encode_diagnoses(entries: &[DiagnosisEntry]) -> Result<String, DatabaseError> {
    serde_json::to_string(entries)
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad diagnoses payload: {e}")))
}

fn encode_review_of_systems(
    map: Option<&serde_json::Map<String, serde_json::Value>>,
) -> Result<Option<String>, DatabaseError> {
    map.map(|m| {
        serde_json::to_string(m).map_err(|e| {
            DatabaseError::ConstraintViolation(format!("bad review-of-systems payload: {e}"))
        })
    })
    .transpose()
}

fn collect_records(
    rows: rusqlite::MappedRows<
        '_,
        impl FnMut(&Row<'_>) -> rusqlite::Result<Result<ClinicalRecord, DatabaseError>>,
    >,
) -> Result<Vec<ClinicalRecord>, DatabaseError> {
    let mut records = Vec::new();
    for row in rows {
        records.push(row??);
    }
    Ok(records)
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<Result<ClinicalRecord, DatabaseError>> {
    let admission_raw: String = row.get(4)?;
    let closure_raw: Option<String> = row.get(5)?;
    let ros_raw: Option<String> = row.get(8)?;
    let diagnoses_raw: String = row.get(18)?;
    let created_raw: String = row.get(21)?;
    let updated_raw: String = row.get(22)?;

    let vitals = VitalSigns {
        fc: row.get(10)?,
        fr: row.get(11)?,
        blood_pressure: row.get(12)?,
        temperature: row.get(13)?,
        saturation: row.get(14)?,
        weight_kg: row.get(15)?,
        height_cm: row.get(16)?,
        bmi: row.get(17)?,
    };

    let id: i64 = row.get(0)?;
    let patient_id: i64 = row.get(1)?;
    let medico_responsable_id: i64 = row.get(2)?;
    let usuario_registra_id: Option<i64> = row.get(3)?;
    let chief_complaint: Option<String> = row.get(6)?;
    let clinical_summary: Option<String> = row.get(7)?;
    let physical_exam: Option<String> = row.get(9)?;
    let treatment_plan: Option<String> = row.get(19)?;
    let recommendations: Option<String> = row.get(20)?;

    Ok((|| {
        let diagnoses: Vec<DiagnosisEntry> = serde_json::from_str(&diagnoses_raw)
            .map_err(|e| DatabaseError::ConstraintViolation(format!("bad diagnoses column: {e}")))?;
        let review_of_systems = ros_raw
            .as_deref()
            .map(|raw| {
                serde_json::from_str(raw).map_err(|e| {
                    DatabaseError::ConstraintViolation(format!("bad review-of-systems column: {e}"))
                })
            })
            .transpose()?;

        Ok(ClinicalRecord {
            id,
            patient_id,
            medico_responsable_id,
            usuario_registra_id,
            admission_date: parse_date(&admission_raw)?,
            closure_date: closure_raw.as_deref().map(parse_date).transpose()?,
            chief_complaint,
            clinical_summary,
            review_of_systems,
            physical_exam,
            vitals,
            diagnoses,
            treatment_plan,
            recommendations,
            created_at: parse_datetime(&created_raw)?,
            updated_at: parse_datetime(&updated_raw)?,
        })
    })())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;
    use crate::db::repository::{patients, users};
    use crate::models::PatientDraft;
    use crate::roles::Role;
    use chrono::NaiveDate;
    use clinica_types::{Identification, NonEmptyText};

    fn seed(conn: &Connection) -> (i64, i64) {
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
        (medico, patient)
    }

    fn minimal_draft(patient_id: i64) -> RecordDraft {
        RecordDraft {
            patient_id,
            admission_date: None,
            closure_date: None,
            chief_complaint: Some("Dolor torácico".into()),
            clinical_summary: None,
            review_of_systems: None,
            physical_exam: None,
            vitals: VitalSigns::default(),
            diagnoses: vec![DiagnosisEntry {
                codigo: Some("I10".into()),
                descripcion: "Hipertensión".into(),
            }],
            treatment_plan: None,
            recommendations: None,
        }
    }

    #[test]
    fn insert_and_read_back() {
        let conn = open_memory_database().unwrap();
        let (medico, patient) = seed(&conn);

        let id =
            insert_record(&conn, &minimal_draft(patient), medico, Some(medico), None).unwrap();
        let record = get_record(&conn, id).unwrap().unwrap();

        assert_eq!(record.patient_id, patient);
        assert_eq!(record.medico_responsable_id, medico);
        assert_eq!(record.usuario_registra_id, Some(medico));
        assert_eq!(record.diagnoses.len(), 1);
        assert_eq!(record.diagnoses[0].descripcion, "Hipertensión");
        assert_eq!(record.vitals.bmi, None);
    }

    #[test]
    fn one_record_per_patient_is_a_storage_constraint() {
        let conn = open_memory_database().unwrap();
        let (medico, patient) = seed(&conn);

        insert_record(&conn, &minimal_draft(patient), medico, None, None).unwrap();
        let second = insert_record(&conn, &minimal_draft(patient), medico, None, None);
        assert!(matches!(second, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn record_requires_existing_patient() {
        let conn = open_memory_database().unwrap();
        let (medico, _) = seed(&conn);

        let orphan = insert_record(&conn, &minimal_draft(9999), medico, None, None);
        assert!(matches!(orphan, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn deleting_patient_cascades_to_record_and_children() {
        let conn = open_memory_database().unwrap();
        let (medico, patient) = seed(&conn);
        let record = insert_record(&conn, &minimal_draft(patient), medico, None, None).unwrap();
        conn.execute(
            "INSERT INTO diagnoses (record_id, description) VALUES (?1, 'HTA')",
            params![record],
        )
        .unwrap();

        patients::delete_patient(&conn, patient).unwrap();

        assert!(get_record(&conn, record).unwrap().is_none());
        let orphans: i64 = conn
            .query_row("SELECT COUNT(*) FROM diagnoses", [], |row| row.get(0))
            .unwrap();
        assert_eq!(orphans, 0);
        let referencing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM clinical_records WHERE patient_id = ?1",
                params![patient],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(referencing, 0);
    }

    #[test]
    fn delete_refuses_while_dependents_exist() {
        let conn = open_memory_database().unwrap();
        let (medico, patient) = seed(&conn);
        let record = insert_record(&conn, &minimal_draft(patient), medico, None, None).unwrap();
        conn.execute(
            "INSERT INTO medications (record_id, name) VALUES (?1, 'Losartán')",
            params![record],
        )
        .unwrap();

        let refused = delete_record(&conn, record);
        match refused {
            Err(DatabaseError::ConstraintViolation(msg)) => {
                assert!(msg.contains("medicamentos (1)"), "{msg}");
            }
            other => panic!("unexpected result: {other:?}"),
        }

        // Still queryable afterwards.
        assert!(get_record(&conn, record).unwrap().is_some());

        conn.execute("DELETE FROM medications WHERE record_id = ?1", params![record])
            .unwrap();
        delete_record(&conn, record).unwrap();
        assert!(get_record(&conn, record).unwrap().is_none());
    }

    #[test]
    fn medico_scoped_listing() {
        let conn = open_memory_database().unwrap();
        let (medico, patient) = seed(&conn);
        let other = users::insert_user(
            &conn,
            "otro@clinic.example.co",
            "Dr. Gil",
            Role::Medico,
            "h",
            false,
        )
        .unwrap();
        insert_record(&conn, &minimal_draft(patient), medico, None, None).unwrap();

        assert_eq!(list_records(&conn).unwrap().len(), 1);
        assert_eq!(list_records_for_medico(&conn, medico).unwrap().len(), 1);
        assert_eq!(list_records_for_medico(&conn, other).unwrap().len(), 0);
    }
}
