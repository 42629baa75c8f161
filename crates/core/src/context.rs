use crate::roles::Role;

/// Marker used wherever an acting user cannot be resolved.
pub const UNKNOWN_ACTOR: &str = "Desconocido";

/// The authenticated identity behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

/// Per-request context passed explicitly into every service call.
///
/// There is no ambient request or session state anywhere in this
/// crate; authorization decisions only ever see what the caller hands
/// them here.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    user: Option<ActingUser>,
}

impl RequestContext {
    /// A context with no authenticated identity.
    pub fn anonymous() -> Self {
        Self { user: None }
    }

    pub fn authenticated(user: ActingUser) -> Self {
        Self { user: Some(user) }
    }

    pub fn user(&self) -> Option<&ActingUser> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user.as_ref().map(|u| u.id)
    }

    /// Display name for audit trails; falls back to
    /// [`UNKNOWN_ACTOR`] when the identity cannot be resolved.
    pub fn display_name(&self) -> &str {
        self.user.as_ref().map_or(UNKNOWN_ACTOR, |u| u.name.as_str())
    }
}
