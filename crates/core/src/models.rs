//! Domain entities as stored in SQLite, plus the draft shapes the
//! services accept for writes.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clinica_types::{Email, Identification, NonEmptyText};
use serde::{Deserialize, Serialize};

use crate::db::DatabaseError;
use crate::roles::Role;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_active: bool,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for account creation. Email and name are validated types, so
/// a `NewUser` can only hold well-formed values.
#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: Email,
    pub name: NonEmptyText,
    pub role: Role,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insurer {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub contact_email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewInsurer {
    pub name: NonEmptyText,
    pub code: NonEmptyText,
    pub contact_email: Option<Email>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Patient {
    pub id: i64,
    pub full_name: String,
    pub identification: String,
    pub birth_date: NaiveDate,
    pub contact: Option<String>,
    pub insurer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PatientDraft {
    pub full_name: NonEmptyText,
    pub identification: Identification,
    pub birth_date: NaiveDate,
    #[serde(default)]
    pub contact: Option<String>,
    #[serde(default)]
    pub insurer_id: Option<i64>,
}

/// Vital signs captured on a clinical record. `bmi` is derived and
/// recomputed on every save; any value submitted for it is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Heart rate, beats per minute.
    #[serde(default)]
    pub fc: Option<u32>,
    /// Respiratory rate, breaths per minute.
    #[serde(default)]
    pub fr: Option<u32>,
    /// Systolic/diastolic, free text such as `120/80`.
    #[serde(default)]
    pub blood_pressure: Option<String>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub saturation: Option<f64>,
    #[serde(default)]
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub height_cm: Option<f64>,
    #[serde(default)]
    pub bmi: Option<f64>,
}

/// One entry of the structured CIE-10 diagnoses field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiagnosisEntry {
    #[serde(default)]
    pub codigo: Option<String>,
    pub descripcion: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClinicalRecord {
    pub id: i64,
    pub patient_id: i64,
    pub medico_responsable_id: i64,
    pub usuario_registra_id: Option<i64>,
    pub admission_date: NaiveDate,
    pub closure_date: Option<NaiveDate>,
    pub chief_complaint: Option<String>,
    pub clinical_summary: Option<String>,
    /// Review of systems as a free key-value map.
    pub review_of_systems: Option<serde_json::Map<String, serde_json::Value>>,
    pub physical_exam: Option<String>,
    pub vitals: VitalSigns,
    pub diagnoses: Vec<DiagnosisEntry>,
    pub treatment_plan: Option<String>,
    pub recommendations: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Writable fields of a clinical record.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordDraft {
    pub patient_id: i64,
    #[serde(default)]
    pub admission_date: Option<NaiveDate>,
    #[serde(default)]
    pub closure_date: Option<NaiveDate>,
    #[serde(default)]
    pub chief_complaint: Option<String>,
    #[serde(default)]
    pub clinical_summary: Option<String>,
    #[serde(default)]
    pub review_of_systems: Option<serde_json::Map<String, serde_json::Value>>,
    #[serde(default)]
    pub physical_exam: Option<String>,
    #[serde(default)]
    pub vitals: VitalSigns,
    #[serde(default)]
    pub diagnoses: Vec<DiagnosisEntry>,
    #[serde(default)]
    pub treatment_plan: Option<String>,
    #[serde(default)]
    pub recommendations: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub id: i64,
    pub record_id: i64,
    pub description: String,
    pub cie10_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewDiagnosis {
    pub description: String,
    #[serde(default)]
    pub cie10_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Medication {
    pub id: i64,
    pub record_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewMedication {
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Observation {
    pub id: i64,
    pub record_id: i64,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewObservation {
    pub detail: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppointmentStatus {
    Programada,
    Atendida,
    Cancelada,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Programada => "PROGRAMADA",
            AppointmentStatus::Atendida => "ATENDIDA",
            AppointmentStatus::Cancelada => "CANCELADA",
        }
    }
}

impl std::str::FromStr for AppointmentStatus {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PROGRAMADA" => Ok(AppointmentStatus::Programada),
            "ATENDIDA" => Ok(AppointmentStatus::Atendida),
            "CANCELADA" => Ok(AppointmentStatus::Cancelada),
            other => Err(DatabaseError::InvalidEnum {
                field: "status",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Appointment {
    pub id: i64,
    pub record_id: i64,
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAppointment {
    pub scheduled_at: NaiveDateTime,
    pub reason: String,
    #[serde(default)]
    pub status: Option<AppointmentStatus>,
}

/// Attachment metadata. The binary content itself is stored outside
/// this system.
#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub id: i64,
    pub record_id: i64,
    pub file_name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewAttachment {
    pub file_name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Nested collections submitted together with a record draft.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordChildren {
    #[serde(default)]
    pub diagnoses: Vec<NewDiagnosis>,
    #[serde(default)]
    pub medications: Vec<NewMedication>,
    #[serde(default)]
    pub observations: Vec<NewObservation>,
    #[serde(default)]
    pub attachments: Vec<NewAttachment>,
}

/// A clinical record together with all of its child collections.
#[derive(Debug, Clone, Serialize)]
pub struct RecordWithChildren {
    #[serde(flatten)]
    pub record: ClinicalRecord,
    pub diagnoses_rel: Vec<Diagnosis>,
    pub medications_rel: Vec<Medication>,
    pub observations: Vec<Observation>,
    pub appointments: Vec<Appointment>,
    pub attachments: Vec<Attachment>,
}

/// Append-only deletion audit row. Never updated, never deleted.
#[derive(Debug, Clone, Serialize)]
pub struct DeletionAuditEntry {
    pub id: i64,
    pub actor_id: Option<i64>,
    pub entity: String,
    pub entity_id: i64,
    pub detail: String,
    pub created_at: DateTime<Utc>,
}
