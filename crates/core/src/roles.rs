//! Roles, capabilities and the record-level access predicates.
//!
//! The role is a closed enumeration; what a role may do comes from a
//! single static capability table evaluated by [`authorize`] and the
//! `can_*` predicates. Nothing here caches: role or ownership can
//! change between requests, so every decision is recomputed per call.

use std::str::FromStr;

use crate::context::{ActingUser, RequestContext};
use crate::db::DatabaseError;
use crate::error::{CoreError, CoreResult};
use crate::models::ClinicalRecord;

/// Business classification of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Admin,
    Medico,
    Recepcionista,
    Paciente,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Medico => "MEDICO",
            Role::Recepcionista => "RECEPCIONISTA",
            Role::Paciente => "PACIENTE",
        }
    }

    /// Role-named group an account joins at creation, if any.
    pub fn group_name(&self) -> Option<&'static str> {
        match self {
            Role::Admin => Some("Administrators"),
            Role::Medico => Some("Physicians"),
            Role::Recepcionista => Some("Receptionists"),
            Role::Paciente => None,
        }
    }
}

impl FromStr for Role {
    type Err = DatabaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADMIN" => Ok(Role::Admin),
            "MEDICO" => Ok(Role::Medico),
            "RECEPCIONISTA" => Ok(Role::Recepcionista),
            "PACIENTE" => Ok(Role::Paciente),
            other => Err(DatabaseError::InvalidEnum {
                field: "role",
                value: other.to_owned(),
            }),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a role can be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// View any clinical record regardless of ownership.
    ViewAnyRecord,
    /// View clinical records the user is responsible for.
    ViewOwnRecord,
    /// Edit clinical records the user is responsible for.
    EditOwnRecord,
    CreateRecord,
    DeleteRecord,
    ViewPatients,
    ManagePatients,
    DeletePatient,
    ManageInsurers,
    ExportReports,
    ViewLogs,
}

/// The single role → capability table.
pub fn capabilities(role: Role) -> &'static [Capability] {
    use Capability::*;
    match role {
        Role::Admin => &[
            ViewAnyRecord,
            DeleteRecord,
            ViewPatients,
            ManagePatients,
            DeletePatient,
            ManageInsurers,
            ExportReports,
            ViewLogs,
        ],
        Role::Medico => &[ViewOwnRecord, EditOwnRecord, CreateRecord, ViewPatients],
        Role::Recepcionista => &[
            ViewAnyRecord,
            ViewPatients,
            ManagePatients,
            ManageInsurers,
            ExportReports,
        ],
        Role::Paciente => &[],
    }
}

pub fn has_capability(role: Role, capability: Capability) -> bool {
    capabilities(role).contains(&capability)
}

/// Requires `capability` of the context's user.
///
/// Returns the acting user on success so callers do not have to
/// unwrap the context a second time.
pub fn authorize(ctx: &RequestContext, capability: Capability) -> CoreResult<&ActingUser> {
    match ctx.user() {
        Some(user) if has_capability(user.role, capability) => Ok(user),
        _ => Err(CoreError::PermissionDenied),
    }
}

/// True if `user` may view `record`.
///
/// A responsible Medico sees their own records; Admin and
/// Recepcionista see every record. Pure, never panics, never mutates.
pub fn can_view_record(user: Option<&ActingUser>, record: &ClinicalRecord) -> bool {
    let Some(user) = user else { return false };
    has_capability(user.role, Capability::ViewAnyRecord)
        || (has_capability(user.role, Capability::ViewOwnRecord)
            && record.medico_responsable_id == user.id)
}

/// True only for the responsible Medico. Admin cannot edit.
pub fn can_edit_record(user: Option<&ActingUser>, record: &ClinicalRecord) -> bool {
    let Some(user) = user else { return false };
    has_capability(user.role, Capability::EditOwnRecord)
        && record.medico_responsable_id == user.id
}

/// True only for Admin.
pub fn can_delete_record(user: Option<&ActingUser>) -> bool {
    user.is_some_and(|u| has_capability(u.role, Capability::DeleteRecord))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn acting(id: i64, role: Role) -> ActingUser {
        ActingUser {
            id,
            name: format!("user-{id}"),
            email: format!("user{id}@clinic.example.co"),
            role,
        }
    }

    fn record_owned_by(medico_id: i64) -> ClinicalRecord {
        ClinicalRecord {
            id: 1,
            patient_id: 1,
            medico_responsable_id: medico_id,
            usuario_registra_id: Some(medico_id),
            admission_date: Utc::now().date_naive(),
            closure_date: None,
            chief_complaint: None,
            clinical_summary: None,
            review_of_systems: None,
            physical_exam: None,
            vitals: Default::default(),
            diagnoses: vec![],
            treatment_plan: None,
            recommendations: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn role_round_trips_through_strings() {
        for role in [Role::Admin, Role::Medico, Role::Recepcionista, Role::Paciente] {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
        assert!("DOCTOR".parse::<Role>().is_err());
    }

    #[test]
    fn view_allows_owner_admin_and_receptionist() {
        let record = record_owned_by(10);

        assert!(can_view_record(Some(&acting(10, Role::Medico)), &record));
        assert!(can_view_record(Some(&acting(2, Role::Admin)), &record));
        assert!(can_view_record(Some(&acting(3, Role::Recepcionista)), &record));

        assert!(!can_view_record(Some(&acting(11, Role::Medico)), &record));
        assert!(!can_view_record(Some(&acting(4, Role::Paciente)), &record));
        assert!(!can_view_record(None, &record));
    }

    #[test]
    fn edit_requires_owning_medico_only() {
        let record = record_owned_by(10);

        assert!(can_edit_record(Some(&acting(10, Role::Medico)), &record));

        // Every other role/ownership combination is denied, including Admin.
        assert!(!can_edit_record(Some(&acting(11, Role::Medico)), &record));
        assert!(!can_edit_record(Some(&acting(2, Role::Admin)), &record));
        assert!(!can_edit_record(Some(&acting(3, Role::Recepcionista)), &record));
        assert!(!can_edit_record(Some(&acting(4, Role::Paciente)), &record));
        assert!(!can_edit_record(None, &record));
    }

    #[test]
    fn delete_requires_admin_only() {
        assert!(can_delete_record(Some(&acting(2, Role::Admin))));
        assert!(!can_delete_record(Some(&acting(10, Role::Medico))));
        assert!(!can_delete_record(Some(&acting(3, Role::Recepcionista))));
        assert!(!can_delete_record(Some(&acting(4, Role::Paciente))));
        assert!(!can_delete_record(None));
    }

    #[test]
    fn authorize_checks_the_capability_table() {
        let admin = RequestContext::authenticated(acting(1, Role::Admin));
        assert!(authorize(&admin, Capability::ViewLogs).is_ok());

        let medico = RequestContext::authenticated(acting(2, Role::Medico));
        assert!(matches!(
            authorize(&medico, Capability::ViewLogs),
            Err(CoreError::PermissionDenied)
        ));

        let anon = RequestContext::anonymous();
        assert!(matches!(
            authorize(&anon, Capability::ViewPatients),
            Err(CoreError::PermissionDenied)
        ));
    }

    #[test]
    fn group_names_match_roles() {
        assert_eq!(Role::Medico.group_name(), Some("Physicians"));
        assert_eq!(Role::Admin.group_name(), Some("Administrators"));
        assert_eq!(Role::Recepcionista.group_name(), Some("Receptionists"));
        assert_eq!(Role::Paciente.group_name(), None);
    }
}
