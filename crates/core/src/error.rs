use crate::db::DatabaseError;

/// Renders a dependency list as `name (count), name (count)`.
fn dependency_list(deps: &[(String, i64)]) -> String {
    deps.iter()
        .map(|(name, count)| format!("{name} ({count})"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Error taxonomy for every service operation.
///
/// Permission and validation errors are meant to be translated into
/// user-facing responses at the boundary; they never abort the
/// process.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The acting identity lacks the role or ownership the operation
    /// requires.
    #[error("permission denied")]
    PermissionDenied,
    /// Login with an unknown email, wrong password or inactive account.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// Submitted data violates a field-level or record-level rule.
    #[error("{0}")]
    Validation(String),
    /// Deletion refused because dependent rows still exist.
    #[error("cannot delete: associated records exist: {}", dependency_list(.0))]
    Dependencies(Vec<(String, i64)>),
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error(transparent)]
    Database(#[from] DatabaseError),
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(DatabaseError::Sqlite(err))
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dependencies_message_enumerates_collections() {
        let err = CoreError::Dependencies(vec![
            ("diagnosticos".into(), 2),
            ("citas".into(), 1),
        ]);
        assert_eq!(
            err.to_string(),
            "cannot delete: associated records exist: diagnosticos (2), citas (1)"
        );
    }
}
