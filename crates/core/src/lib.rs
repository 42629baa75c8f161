//! # Clinica Core
//!
//! Core business logic for the clinic records service.
//!
//! This crate contains the domain model and persistence:
//! - Role and capability rules, evaluated per call
//! - SQLite storage with embedded migrations
//! - Account, session, patient, record and report services
//! - Deletion audit observers and append-only application logs
//!
//! **No API concerns**: HTTP routing, JSON wire shapes and OpenAPI
//! docs belong to the `clinica-run` binary.

pub mod audit;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod logs;
pub mod models;
pub mod password;
pub mod roles;
pub mod services;

pub use config::CoreConfig;
pub use context::{ActingUser, RequestContext};
pub use error::{CoreError, CoreResult};
pub use roles::{Capability, Role};
