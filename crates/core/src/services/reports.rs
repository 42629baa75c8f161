//! Reporting: the attended-patients CSV export and dashboard counts.

use chrono::Utc;
use rusqlite::Connection;

use crate::context::RequestContext;
use crate::db::sqlite::parse_datetime;
use crate::db::DatabaseError;
use crate::error::{CoreError, CoreResult};
use crate::models::DiagnosisEntry;
use crate::roles::{authorize, has_capability, Capability};

const CSV_HEADER: &str = "ID Historia,Paciente,Documento,Sexo,Médico Responsable,\
Fecha Atención,Motivo Consulta,Diagnósticos";

/// A rendered CSV file ready to be served as a download.
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub file_name: String,
    pub content: String,
}

/// Exports every patient with a clinical record, one row per record.
///
/// Column layout and the timestamped file name are fixed; downstream
/// spreadsheets are built against them.
pub fn export_attended_patients(conn: &Connection, ctx: &RequestContext) -> CoreResult<CsvExport> {
    authorize(ctx, Capability::ExportReports)?;

    let mut stmt = conn.prepare(
        "SELECT r.id, p.full_name, p.identification, u.name, r.created_at,
                r.chief_complaint, r.diagnoses
         FROM clinical_records r
         JOIN patients p ON p.id = r.patient_id
         JOIN users u ON u.id = r.medico_responsable_id
         ORDER BY r.id",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, Option<String>>(5)?,
            row.get::<_, String>(6)?,
        ))
    })?;

    let mut content = String::from(CSV_HEADER);
    content.push('\n');
    for row in rows {
        let (id, patient, identification, medico, created_raw, complaint, diagnoses_raw) =
            row.map_err(DatabaseError::from)?;
        let attended = parse_datetime(&created_raw)
            .map_err(CoreError::Database)?
            .format("%Y-%m-%d %H:%M")
            .to_string();
        let diagnoses: Vec<DiagnosisEntry> =
            serde_json::from_str(&diagnoses_raw).unwrap_or_default();
        let diagnoses_cell = diagnoses
            .iter()
            .map(|d| d.descripcion.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let cells = [
            id.to_string(),
            patient,
            identification,
            // No sex field is captured for patients; the column stays
            // in the layout and renders empty.
            String::new(),
            medico,
            attended,
            complaint.unwrap_or_default(),
            diagnoses_cell,
        ];
        content.push_str(
            &cells
                .iter()
                .map(|c| escape_csv(c))
                .collect::<Vec<_>>()
                .join(","),
        );
        content.push('\n');
    }

    let file_name = format!(
        "reporte_pacientes_atendidos_{}.csv",
        Utc::now().format("%Y%m%d-%H%M%S")
    );
    tracing::info!(file = %file_name, "attended patients report generated");
    Ok(CsvExport { file_name, content })
}

/// Counts shown on the landing dashboard, scoped to what the caller
/// may see. A Paciente gets all zeroes rather than an error.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct DashboardCounts {
    pub patients: i64,
    pub records: i64,
    pub appointments_scheduled: i64,
    pub appointments_attended: i64,
}

pub fn dashboard_counts(conn: &Connection, ctx: &RequestContext) -> CoreResult<DashboardCounts> {
    let user = ctx.user().ok_or(CoreError::PermissionDenied)?;
    if !has_capability(user.role, Capability::ViewPatients) {
        return Ok(DashboardCounts::default());
    }

    let scoped = !has_capability(user.role, Capability::ViewAnyRecord);
    let records = if scoped {
        count(conn, "SELECT COUNT(*) FROM clinical_records WHERE medico_responsable_id = ?1", Some(user.id))?
    } else {
        count(conn, "SELECT COUNT(*) FROM clinical_records", None)?
    };
    let (scheduled, attended) = if scoped {
        (
            count(
                conn,
                "SELECT COUNT(*) FROM appointments a
                 JOIN clinical_records r ON r.id = a.record_id
                 WHERE a.status = 'PROGRAMADA' AND r.medico_responsable_id = ?1",
                Some(user.id),
            )?,
            count(
                conn,
                "SELECT COUNT(*) FROM appointments a
                 JOIN clinical_records r ON r.id = a.record_id
                 WHERE a.status = 'ATENDIDA' AND r.medico_responsable_id = ?1",
                Some(user.id),
            )?,
        )
    } else {
        (
            count(conn, "SELECT COUNT(*) FROM appointments WHERE status = 'PROGRAMADA'", None)?,
            count(conn, "SELECT COUNT(*) FROM appointments WHERE status = 'ATENDIDA'", None)?,
        )
    };

    Ok(DashboardCounts {
        patients: count(conn, "SELECT COUNT(*) FROM patients", None)?,
        records,
        appointments_scheduled: scheduled,
        appointments_attended: attended,
    })
}

fn count(conn: &Connection, sql: &str, arg: Option<i64>) -> Result<i64, DatabaseError> {
    let result = match arg {
        Some(arg) => conn.query_row(sql, rusqlite::params![arg], |row| row.get(0)),
        None => conn.query_row(sql, [], |row| row.get(0)),
    };
    Ok(result?)
}

/// RFC 4180 quoting: a cell containing a comma, quote or newline is
/// wrapped in quotes with inner quotes doubled.
fn escape_csv(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ActingUser;
    use crate::db::open_memory_database;
    use crate::db::repository::{children, patients, records, users};
    use crate::models::{
        AppointmentStatus, DiagnosisEntry, NewAppointment, PatientDraft, RecordDraft, VitalSigns,
    };
    use crate::roles::Role;
    use chrono::NaiveDate;
    use clinica_types::{Identification, NonEmptyText};

    fn ctx(id: i64, role: Role) -> RequestContext {
        RequestContext::authenticated(ActingUser {
            id,
            name: format!("user-{id}"),
            email: format!("user{id}@clinic.example.co"),
            role,
        })
    }

    fn seed_record(conn: &Connection, identification: &str, diagnoses: Vec<DiagnosisEntry>) -> i64 {
        let medico = match users::get_user_by_email(conn, "m@clinic.example.co").unwrap() {
            Some(u) => u.id,
            None => users::insert_user(conn, "m@clinic.example.co", "Dra. Ruiz", Role::Medico, "h", false)
                .unwrap(),
        };
        let patient = patients::insert_patient(
            conn,
            &PatientDraft {
                full_name: NonEmptyText::new("Ana, López").unwrap(),
                identification: Identification::new(identification).unwrap(),
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
            chief_complaint: Some("Control".into()),
            clinical_summary: None,
            review_of_systems: None,
            physical_exam: None,
            vitals: VitalSigns::default(),
            diagnoses,
            treatment_plan: None,
            recommendations: None,
        };
        records::insert_record(conn, &draft, medico, None, None).unwrap()
    }

    #[test]
    fn export_requires_the_capability() {
        let conn = open_memory_database().unwrap();
        assert!(export_attended_patients(&conn, &ctx(1, Role::Admin)).is_ok());
        assert!(export_attended_patients(&conn, &ctx(2, Role::Recepcionista)).is_ok());
        assert!(matches!(
            export_attended_patients(&conn, &ctx(3, Role::Medico)),
            Err(CoreError::PermissionDenied)
        ));
    }

    #[test]
    fn export_joins_diagnoses_and_quotes_commas() {
        let conn = open_memory_database().unwrap();
        seed_record(
            &conn,
            "1094",
            vec![
                DiagnosisEntry {
                    codigo: Some("I10".into()),
                    descripcion: "Hipertensión".into(),
                },
                DiagnosisEntry {
                    codigo: Some("E11".into()),
                    descripcion: "Diabetes".into(),
                },
            ],
        );

        let export = export_attended_patients(&conn, &ctx(1, Role::Admin)).unwrap();
        let lines: Vec<&str> = export.content.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines.len(), 2);
        // Both the comma-bearing name and the joined diagnoses are quoted.
        assert!(lines[1].contains("\"Ana, López\""));
        assert!(lines[1].contains("\"Hipertensión, Diabetes\""));
        assert!(export.file_name.starts_with("reporte_pacientes_atendidos_"));
        assert!(export.file_name.ends_with(".csv"));
    }

    #[test]
    fn dashboard_scopes_by_role() {
        let conn = open_memory_database().unwrap();
        let record = seed_record(&conn, "1094", vec![]);
        children::insert_appointment(
            &conn,
            record,
            &NewAppointment {
                scheduled_at: chrono::NaiveDateTime::parse_from_str(
                    "2026-09-15 10:30:00",
                    "%Y-%m-%d %H:%M:%S",
                )
                .unwrap(),
                reason: "Control".into(),
                status: Some(AppointmentStatus::Atendida),
            },
        )
        .unwrap();
        let medico = users::get_user_by_email(&conn, "m@clinic.example.co")
            .unwrap()
            .unwrap();

        let admin_counts = dashboard_counts(&conn, &ctx(1, Role::Admin)).unwrap();
        assert_eq!(admin_counts.patients, 1);
        assert_eq!(admin_counts.records, 1);
        assert_eq!(admin_counts.appointments_attended, 1);

        let own = dashboard_counts(&conn, &ctx(medico.id, Role::Medico)).unwrap();
        assert_eq!(own.records, 1);

        let other = dashboard_counts(&conn, &ctx(medico.id + 100, Role::Medico)).unwrap();
        assert_eq!(other.records, 0);
        assert_eq!(other.patients, 1);

        let paciente = dashboard_counts(&conn, &ctx(50, Role::Paciente)).unwrap();
        assert_eq!(paciente.patients, 0);
        assert_eq!(paciente.records, 0);
    }
}
