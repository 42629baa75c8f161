//! Row-level persistence functions.
//!
//! Every function takes a borrowed [`rusqlite::Connection`] (or a
//! transaction, which derefs to one) and returns `DatabaseError` on
//! failure. Business rules live in the service layer, with one
//! deliberate exception: [`records::delete_record`] re-checks the
//! dependency rule so that a direct repository call cannot bypass it.

pub mod audit;
pub mod children;
pub mod insurers;
pub mod patients;
pub mod records;
pub mod sessions;
pub mod users;
