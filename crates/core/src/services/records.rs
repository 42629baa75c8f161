//! Clinical record workflow: creation, editing, consultation,
//! deletion and the nested child entities.

use chrono::Utc;
use rusqlite::Connection;

use crate::audit::{DeletedEntity, DeletionEvent, ObserverSet};
use crate::context::RequestContext;
use crate::db::repository::{children, patients, records};
use crate::db::DatabaseError;
use crate::error::{CoreError, CoreResult};
use crate::models::{
    Appointment, ClinicalRecord, NewAppointment, RecordChildren, RecordDraft, RecordWithChildren,
    VitalSigns,
};
use crate::roles::{
    authorize, can_delete_record, can_edit_record, can_view_record, has_capability, Capability,
};

/// Body mass index from weight and height, rounded to two decimals.
///
/// Missing or non-positive measurements yield `None`; a record is
/// never rejected over an uncomputable BMI.
pub fn compute_bmi(vitals: &VitalSigns) -> Option<f64> {
    let weight = vitals.weight_kg?;
    let height = vitals.height_cm?;
    if weight <= 0.0 || height <= 0.0 {
        return None;
    }
    let meters = height / 100.0;
    let bmi = weight / (meters * meters);
    Some((bmi * 100.0).round() / 100.0)
}

/// Creates a clinical record with its nested children in a single
/// transaction; either everything is stored or nothing is.
pub fn create_record(
    conn: &mut Connection,
    ctx: &RequestContext,
    draft: &RecordDraft,
    new_children: &RecordChildren,
) -> CoreResult<RecordWithChildren> {
    let medico = authorize(ctx, Capability::CreateRecord)?;
    let medico_id = medico.id;
    let registra_id = ctx.user_id();

    let patient =
        patients::get_patient(conn, draft.patient_id)?.ok_or(CoreError::NotFound {
            entity: "patient",
            id: draft.patient_id,
        })?;
    if records::record_id_for_patient(conn, draft.patient_id)?.is_some() {
        return Err(already_has_record(&patient.full_name));
    }
    validate_draft(draft)?;
    validate_children(new_children)?;

    let bmi = compute_bmi(&draft.vitals);
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    let id = match records::insert_record(&tx, draft, medico_id, registra_id, bmi) {
        Ok(id) => id,
        // Lost the race against a concurrent create for the same patient.
        Err(DatabaseError::Sqlite(e)) if is_unique_violation(&e) => {
            return Err(already_has_record(&patient.full_name));
        }
        Err(e) => return Err(e.into()),
    };
    children::insert_children(&tx, id, new_children)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(record_id = id, patient_id = draft.patient_id, "clinical record created");
    load_record(conn, id)
}

/// Rewrites a record and replaces its nested children atomically.
/// Only the responsible Medico may edit; child replacement here emits
/// no deletion audit events.
pub fn edit_record(
    conn: &mut Connection,
    ctx: &RequestContext,
    id: i64,
    draft: &RecordDraft,
    new_children: &RecordChildren,
) -> CoreResult<RecordWithChildren> {
    let existing = records::get_record(conn, id)?.ok_or(CoreError::NotFound {
        entity: "clinical record",
        id,
    })?;
    if !can_edit_record(ctx.user(), &existing) {
        return Err(CoreError::PermissionDenied);
    }
    if draft.patient_id != existing.patient_id {
        return Err(CoreError::Validation(
            "a clinical record cannot be moved to another patient".into(),
        ));
    }
    validate_draft(draft)?;
    validate_children(new_children)?;

    let bmi = compute_bmi(&draft.vitals);
    let tx = conn.transaction().map_err(DatabaseError::from)?;
    records::update_record(&tx, id, draft, bmi)?;
    children::replace_children(&tx, id, new_children)?;
    tx.commit().map_err(DatabaseError::from)?;

    tracing::info!(record_id = id, "clinical record updated");
    load_record(conn, id)
}

pub fn get_record(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
) -> CoreResult<RecordWithChildren> {
    let record = records::get_record(conn, id)?.ok_or(CoreError::NotFound {
        entity: "clinical record",
        id,
    })?;
    if !can_view_record(ctx.user(), &record) {
        return Err(CoreError::PermissionDenied);
    }
    with_children(conn, record)
}

/// Lists the records the caller may see: everything for Admin and
/// Recepcionista, own records for a Medico.
pub fn list_records(conn: &Connection, ctx: &RequestContext) -> CoreResult<Vec<ClinicalRecord>> {
    let user = ctx.user().ok_or(CoreError::PermissionDenied)?;
    if has_capability(user.role, Capability::ViewAnyRecord) {
        Ok(records::list_records(conn)?)
    } else if has_capability(user.role, Capability::ViewOwnRecord) {
        Ok(records::list_records_for_medico(conn, user.id)?)
    } else {
        Err(CoreError::PermissionDenied)
    }
}

/// Deletes a clinical record, refusing while any dependent child rows
/// exist. On success the deletion observers run with the patient's
/// name in the event detail.
pub fn delete_record(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    if !can_delete_record(ctx.user()) {
        return Err(CoreError::PermissionDenied);
    }
    let record = records::get_record(conn, id)?.ok_or(CoreError::NotFound {
        entity: "clinical record",
        id,
    })?;

    let dependencies = records::dependency_counts(conn, id)?;
    if !dependencies.is_empty() {
        return Err(CoreError::Dependencies(dependencies));
    }

    let patient_name = patients::get_patient(conn, record.patient_id)?
        .map(|p| p.full_name)
        .unwrap_or_default();
    records::delete_record(conn, id)?;

    observers.notify(
        conn,
        &DeletionEvent {
            entity: DeletedEntity::Record,
            entity_id: id,
            record_id: Some(id),
            detail: format!("Paciente: {patient_name}"),
            actor_id: ctx.user_id(),
            actor_name: ctx.user().map(|u| u.name.clone()),
            occurred_at: Utc::now(),
        },
    );
    Ok(())
}

/// Schedules an appointment on a record. The responsible Medico and
/// anyone who manages patients may schedule.
pub fn add_appointment(
    conn: &Connection,
    ctx: &RequestContext,
    record_id: i64,
    new: &NewAppointment,
) -> CoreResult<Appointment> {
    let record = records::get_record(conn, record_id)?.ok_or(CoreError::NotFound {
        entity: "clinical record",
        id: record_id,
    })?;
    let allowed = can_edit_record(ctx.user(), &record)
        || ctx
            .user()
            .is_some_and(|u| has_capability(u.role, Capability::ManagePatients));
    if !allowed {
        return Err(CoreError::PermissionDenied);
    }
    if new.reason.trim().is_empty() {
        return Err(CoreError::Validation("appointment reason is required".into()));
    }

    let id = children::insert_appointment(conn, record_id, new)?;
    children::get_appointment(conn, id)?.ok_or(CoreError::NotFound {
        entity: "appointment",
        id,
    })
}

pub fn delete_appointment(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    let appointment = children::get_appointment(conn, id)?.ok_or(CoreError::NotFound {
        entity: "appointment",
        id,
    })?;
    delete_child(
        conn,
        ctx,
        observers,
        "appointments",
        DeletedEntity::Appointment,
        id,
        appointment.record_id,
        appointment.reason,
    )
}

pub fn delete_diagnosis(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    let diagnosis = children::get_diagnosis(conn, id)?.ok_or(CoreError::NotFound {
        entity: "diagnosis",
        id,
    })?;
    delete_child(
        conn,
        ctx,
        observers,
        "diagnoses",
        DeletedEntity::Diagnosis,
        id,
        diagnosis.record_id,
        diagnosis.description,
    )
}

pub fn delete_medication(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    let medication = children::get_medication(conn, id)?.ok_or(CoreError::NotFound {
        entity: "medication",
        id,
    })?;
    delete_child(
        conn,
        ctx,
        observers,
        "medications",
        DeletedEntity::Medication,
        id,
        medication.record_id,
        medication.name,
    )
}

pub fn delete_observation(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    let observation = children::get_observation(conn, id)?.ok_or(CoreError::NotFound {
        entity: "observation",
        id,
    })?;
    delete_child(
        conn,
        ctx,
        observers,
        "observations",
        DeletedEntity::Observation,
        id,
        observation.record_id,
        observation.detail,
    )
}

pub fn delete_attachment(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    let attachment = children::get_attachment(conn, id)?.ok_or(CoreError::NotFound {
        entity: "attachment",
        id,
    })?;
    delete_child(
        conn,
        ctx,
        observers,
        "attachments",
        DeletedEntity::Attachment,
        id,
        attachment.record_id,
        attachment.file_name,
    )
}

#[allow(clippy::too_many_arguments)]
fn delete_child(
    conn: &Connection,
    ctx: &RequestContext,
    observers: &ObserverSet,
    table: &'static str,
    entity: DeletedEntity,
    id: i64,
    record_id: i64,
    detail: String,
) -> CoreResult<()> {
    let record = records::get_record(conn, record_id)?.ok_or(CoreError::NotFound {
        entity: "clinical record",
        id: record_id,
    })?;
    if !can_edit_record(ctx.user(), &record) && !can_delete_record(ctx.user()) {
        return Err(CoreError::PermissionDenied);
    }

    children::delete_child_row(conn, table, id)?;
    observers.notify(
        conn,
        &DeletionEvent {
            entity,
            entity_id: id,
            record_id: Some(record_id),
            detail,
            actor_id: ctx.user_id(),
            actor_name: ctx.user().map(|u| u.name.clone()),
            occurred_at: Utc::now(),
        },
    );
    Ok(())
}

fn load_record(conn: &Connection, id: i64) -> CoreResult<RecordWithChildren> {
    let record = records::get_record(conn, id)?.ok_or(CoreError::NotFound {
        entity: "clinical record",
        id,
    })?;
    with_children(conn, record)
}

fn with_children(conn: &Connection, record: ClinicalRecord) -> CoreResult<RecordWithChildren> {
    let id = record.id;
    Ok(RecordWithChildren {
        record,
        diagnoses_rel: children::diagnoses_for_record(conn, id)?,
        medications_rel: children::medications_for_record(conn, id)?,
        observations: children::observations_for_record(conn, id)?,
        appointments: children::appointments_for_record(conn, id)?,
        attachments: children::attachments_for_record(conn, id)?,
    })
}

fn already_has_record(patient_name: &str) -> CoreError {
    CoreError::Validation(format!(
        "patient {patient_name} already has a clinical record"
    ))
}

fn validate_draft(draft: &RecordDraft) -> CoreResult<()> {
    if let (Some(admission), Some(closure)) = (draft.admission_date, draft.closure_date) {
        if closure < admission {
            return Err(CoreError::Validation(
                "closure date cannot precede the admission date".into(),
            ));
        }
    }
    for entry in &draft.diagnoses {
        if entry.descripcion.trim().is_empty() {
            return Err(CoreError::Validation(
                "diagnosis description is required".into(),
            ));
        }
    }
    for value in [draft.vitals.temperature, draft.vitals.saturation] {
        if value.is_some_and(|v| v <= 0.0) {
            return Err(CoreError::Validation(
                "vital signs must be positive when present".into(),
            ));
        }
    }
    Ok(())
}

fn validate_children(new_children: &RecordChildren) -> CoreResult<()> {
    if new_children.diagnoses.iter().any(|d| d.description.trim().is_empty()) {
        return Err(CoreError::Validation("diagnosis description is required".into()));
    }
    if new_children.medications.iter().any(|m| m.name.trim().is_empty()) {
        return Err(CoreError::Validation("medication name is required".into()));
    }
    if new_children.observations.iter().any(|o| o.detail.trim().is_empty()) {
        return Err(CoreError::Validation("observation detail is required".into()));
    }
    if new_children.attachments.iter().any(|a| a.file_name.trim().is_empty()) {
        return Err(CoreError::Validation("attachment file name is required".into()));
    }
    Ok(())
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
