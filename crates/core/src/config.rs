use std::env;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// Default session lifetime, in seconds. Fifteen minutes.
pub const DEFAULT_SESSION_TTL_SECS: i64 = 900;

/// Immutable runtime configuration for the core services.
///
/// Built once at startup (usually via [`CoreConfig::from_env`]) and
/// shared behind an `Arc`.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    database_path: PathBuf,
    log_dir: PathBuf,
    session_ttl_secs: i64,
}

impl CoreConfig {
    /// Creates a configuration from explicit values.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the session lifetime is
    /// not a positive number of seconds.
    pub fn new(
        database_path: PathBuf,
        log_dir: PathBuf,
        session_ttl_secs: i64,
    ) -> CoreResult<Self> {
        if session_ttl_secs <= 0 {
            return Err(CoreError::Validation(
                "session lifetime must be a positive number of seconds".into(),
            ));
        }
        Ok(Self {
            database_path,
            log_dir,
            session_ttl_secs,
        })
    }

    /// Reads configuration from environment variables.
    ///
    /// - `CLINICA_DB`: SQLite database path (default `clinica.db`)
    /// - `CLINICA_LOG_DIR`: application log directory (default `logs`)
    /// - `CLINICA_SESSION_TTL_SECS`: session lifetime (default 900)
    pub fn from_env() -> CoreResult<Self> {
        let database_path = env::var("CLINICA_DB").unwrap_or_else(|_| "clinica.db".into());
        let log_dir = env::var("CLINICA_LOG_DIR").unwrap_or_else(|_| "logs".into());
        let ttl = match env::var("CLINICA_SESSION_TTL_SECS") {
            Ok(raw) => raw.parse::<i64>().map_err(|_| {
                CoreError::Validation(format!(
                    "CLINICA_SESSION_TTL_SECS is not a valid integer: {raw}"
                ))
            })?,
            Err(_) => DEFAULT_SESSION_TTL_SECS,
        };
        Self::new(PathBuf::from(database_path), PathBuf::from(log_dir), ttl)
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn session_ttl_secs(&self) -> i64 {
        self.session_ttl_secs
    }
}
