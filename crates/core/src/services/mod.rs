//! Business operations, one module per area.
//!
//! Every entry point takes the caller's [`crate::RequestContext`]
//! explicitly and authorizes against the capability table before
//! touching the database.

pub mod accounts;
pub mod insurers;
pub mod patients;
pub mod records;
pub mod reports;
pub mod sessions;
