use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::Connection;

use clinica_core::audit::ObserverSet;
use clinica_core::logs::{LogFiles, LogKind};
use clinica_core::{CoreConfig, CoreError};

use crate::error::ApiError;

/// Application state shared across REST API handlers.
///
/// The SQLite connection is serialized behind a mutex; SQLite itself
/// runs one writer at a time, so a single guarded connection keeps the
/// commit order straightforward.
#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    config: Arc<CoreConfig>,
    logs: LogFiles,
    observers: Arc<ObserverSet>,
}

impl AppState {
    pub fn new(
        conn: Connection,
        config: CoreConfig,
        logs: LogFiles,
        observers: ObserverSet,
    ) -> Self {
        AppState {
            db: Arc::new(Mutex::new(conn)),
            config: Arc::new(config),
            logs,
            observers: Arc::new(observers),
        }
    }

    /// Locks the database connection. A poisoned lock is recovered:
    /// the connection itself stays valid after a handler panic.
    pub fn db(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn logs(&self) -> &LogFiles {
        &self.logs
    }

    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    /// Converts a core error into an API error, recording database
    /// failures in the errors log on the way out.
    pub fn fail(&self, err: CoreError) -> ApiError {
        if let CoreError::Database(ref db_err) = err {
            self.logs.append(LogKind::Errors, &db_err.to_string());
        }
        ApiError::from(err)
    }
}
