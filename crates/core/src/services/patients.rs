//! Patient registry operations.

use chrono::Utc;
use rusqlite::Connection;

use crate::audit::{DeletedEntity, DeletionEvent, ObserverSet};
use crate::context::RequestContext;
use crate::db::repository::{insurers, patients};
use crate::error::{CoreError, CoreResult};
use crate::models::{Patient, PatientDraft};
use crate::roles::{authorize, Capability};

const MAX_AGE_YEARS: i64 = 120;

pub fn create_patient(
    conn: &Connection,
    ctx: &RequestContext,
    draft: &PatientDraft,
) -> CoreResult<Patient> {
    authorize(ctx, Capability::ManagePatients)?;
    validate_draft(conn, draft)?;

    if patients::get_patient_by_identification(conn, draft.identification.as_str())?.is_some() {
        return Err(CoreError::Validation(format!(
            "a patient with identification {} already exists",
            draft.identification
        )));
    }

    let id = patients::insert_patient(conn, draft)?;
    tracing::info!(patient_id = id, "patient registered");
    patients::get_patient(conn, id)?.ok_or(CoreError::NotFound {
        entity: "patient",
        id,
    })
}

pub fn update_patient(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    draft: &PatientDraft,
) -> CoreResult<Patient> {
    authorize(ctx, Capability::ManagePatients)?;
    validate_draft(conn, draft)?;

    if let Some(existing) =
        patients::get_patient_by_identification(conn, draft.identification.as_str())?
    {
        if existing.id != id {
            return Err(CoreError::Validation(format!(
                "a patient with identification {} already exists",
                draft.identification
            )));
        }
    }

    patients::update_patient(conn, id, draft)?;
    patients::get_patient(conn, id)?.ok_or(CoreError::NotFound {
        entity: "patient",
        id,
    })
}

pub fn get_patient(conn: &Connection, ctx: &RequestContext, id: i64) -> CoreResult<Patient> {
    authorize(ctx, Capability::ViewPatients)?;
    patients::get_patient(conn, id)?.ok_or(CoreError::NotFound {
        entity: "patient",
        id,
    })
}

pub fn list_patients(conn: &Connection, ctx: &RequestContext) -> CoreResult<Vec<Patient>> {
    authorize(ctx, Capability::ViewPatients)?;
    Ok(patients::list_patients(conn)?)
}

pub fn search_patients(
    conn: &Connection,
    ctx: &RequestContext,
    query: &str,
) -> CoreResult<Vec<Patient>> {
    authorize(ctx, Capability::ViewPatients)?;
    Ok(patients::search_patients(conn, query.trim())?)
}

/// Removes a patient, cascading over the clinical record and all of
/// its children, then notifies the deletion observers.
pub fn delete_patient(
    conn: &Connection,
    ctx: &RequestContext,
    id: i64,
    observers: &ObserverSet,
) -> CoreResult<()> {
    authorize(ctx, Capability::DeletePatient)?;
    let patient = patients::get_patient(conn, id)?.ok_or(CoreError::NotFound {
        entity: "patient",
        id,
    })?;

    patients::delete_patient(conn, id)?;

    observers.notify(
        conn,
        &DeletionEvent {
            entity: DeletedEntity::Patient,
            entity_id: id,
            record_id: None,
            detail: format!("{} ({})", patient.full_name, patient.identification),
            actor_id: ctx.user_id(),
            actor_name: ctx.user().map(|u| u.name.clone()),
            occurred_at: Utc::now(),
        },
    );
    Ok(())
}

fn validate_draft(conn: &Connection, draft: &PatientDraft) -> CoreResult<()> {
    let today = Utc::now().date_naive();
    if draft.birth_date > today {
        return Err(CoreError::Validation(
            "birth date cannot be in the future".into(),
        ));
    }
    if (today - draft.birth_date).num_days() / 365 > MAX_AGE_YEARS {
        return Err(CoreError::Validation(format!(
            "birth date implies an age over {MAX_AGE_YEARS} years"
        )));
    }
    if let Some(insurer_id) = draft.insurer_id {
        if insurers::get_insurer(conn, insurer_id)?.is_none() {
            return Err(CoreError::NotFound {
                entity: "insurer",
                id: insurer_id,
            });
        }
    }
    Ok(())
}
