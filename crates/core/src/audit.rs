//! Post-commit deletion notifications.
//!
//! Every destructive operation builds a [`DeletionEvent`] and hands it
//! to the configured [`ObserverSet`] after the database change has
//! committed. Observers are side-effect sinks: a failing observer logs
//! a warning and never fails the deletion that already happened.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::context::UNKNOWN_ACTOR;
use crate::db::repository::audit as audit_repo;
use crate::logs::{LogFiles, LogKind};

/// Entity kinds that produce an audit trail when removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletedEntity {
    Record,
    Patient,
    Diagnosis,
    Medication,
    Observation,
    Appointment,
    Attachment,
}

impl DeletedEntity {
    /// Display name used in audit lines and audit table rows.
    pub fn display_name(&self) -> &'static str {
        match self {
            DeletedEntity::Record => "Historia Clínica",
            DeletedEntity::Patient => "Paciente",
            DeletedEntity::Diagnosis => "Diagnóstico",
            DeletedEntity::Medication => "Medicamento",
            DeletedEntity::Observation => "Observación",
            DeletedEntity::Appointment => "Cita",
            DeletedEntity::Attachment => "Adjunto",
        }
    }

    fn phrase(&self) -> String {
        match self {
            DeletedEntity::Record => "Historia Clínica eliminada".to_owned(),
            DeletedEntity::Observation => "Observación eliminada".to_owned(),
            DeletedEntity::Appointment => "Cita eliminada".to_owned(),
            other => format!("{} eliminado", other.display_name()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeletionEvent {
    pub entity: DeletedEntity,
    pub entity_id: i64,
    /// The clinical record the entity belonged to, when there was one.
    pub record_id: Option<i64>,
    /// Human-readable summary of what was removed.
    pub detail: String,
    pub actor_id: Option<i64>,
    pub actor_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

impl DeletionEvent {
    pub fn actor_display(&self) -> &str {
        self.actor_name.as_deref().unwrap_or(UNKNOWN_ACTOR)
    }
}

pub trait DeletionObserver: Send + Sync {
    fn on_deletion(&self, conn: &Connection, event: &DeletionEvent);
}

/// The ordered list of observers to notify after each deletion.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn DeletionObserver>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, observer: Box<dyn DeletionObserver>) {
        self.observers.push(observer);
    }

    pub fn notify(&self, conn: &Connection, event: &DeletionEvent) {
        for observer in &self.observers {
            observer.on_deletion(conn, event);
        }
    }
}

/// Writes one line per deletion to the audit log file, mirroring it
/// through tracing.
pub struct AuditLogObserver {
    logs: LogFiles,
}

impl AuditLogObserver {
    pub fn new(logs: LogFiles) -> Self {
        AuditLogObserver { logs }
    }
}

impl DeletionObserver for AuditLogObserver {
    fn on_deletion(&self, _conn: &Connection, event: &DeletionEvent) {
        let record_part = match event.record_id {
            Some(id) => format!(" | Historia {id}"),
            None => String::new(),
        };
        let line = format!(
            "[AUDITORÍA] {} | ID {}{} | {} | Usuario: {} | Fecha: {}",
            event.entity.phrase(),
            event.entity_id,
            record_part,
            event.detail,
            event.actor_display(),
            event.occurred_at.format("%Y-%m-%d %H:%M:%S"),
        );
        tracing::info!(
            entity = event.entity.display_name(),
            entity_id = event.entity_id,
            actor = event.actor_display(),
            "deletion recorded"
        );
        self.logs.append(LogKind::Audit, &line);
    }
}

/// Persists each deletion as a row in the append-only audit table.
pub struct AuditTableObserver;

impl DeletionObserver for AuditTableObserver {
    fn on_deletion(&self, conn: &Connection, event: &DeletionEvent) {
        let result = audit_repo::insert_deletion_entry(
            conn,
            event.actor_id,
            event.entity.display_name(),
            event.entity_id,
            &event.detail,
            event.occurred_at,
        );
        if let Err(e) = result {
            tracing::warn!(error = %e, "audit table insert failed");
        }
    }
}
