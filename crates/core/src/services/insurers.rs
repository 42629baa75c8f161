//! Insurer (EPS) catalog operations.

use rusqlite::Connection;

use crate::context::RequestContext;
use crate::db::repository::insurers;
use crate::error::{CoreError, CoreResult};
use crate::models::{Insurer, NewInsurer};
use crate::roles::{authorize, Capability};

pub fn create_insurer(
    conn: &Connection,
    ctx: &RequestContext,
    new: &NewInsurer,
) -> CoreResult<Insurer> {
    authorize(ctx, Capability::ManageInsurers)?;

    let taken = insurers::list_insurers(conn)?
        .iter()
        .any(|i| i.name == new.name.as_str() || i.code == new.code.as_str());
    if taken {
        return Err(CoreError::Validation(
            "an insurer with that name or code already exists".into(),
        ));
    }

    let id = insurers::insert_insurer(conn, new)?;
    tracing::info!(insurer_id = id, "insurer created");
    insurers::get_insurer(conn, id)?.ok_or(CoreError::NotFound {
        entity: "insurer",
        id,
    })
}

pub fn list_insurers(conn: &Connection, ctx: &RequestContext) -> CoreResult<Vec<Insurer>> {
    authorize(ctx, Capability::ViewPatients)?;
    Ok(insurers::list_insurers(conn)?)
}

/// Removes an insurer from the catalog. Patients keep their rows;
/// their insurer link is cleared by the storage layer.
pub fn delete_insurer(conn: &Connection, ctx: &RequestContext, id: i64) -> CoreResult<()> {
    authorize(ctx, Capability::ManageInsurers)?;
    Ok(insurers::delete_insurer(conn, id)?)
}
