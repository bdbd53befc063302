//! SeaORM entity definitions for the gitrail database schema.

pub mod agreement;
pub mod agreement_status;
pub mod branch;
pub mod branch_commit;
pub mod commit;
pub mod contributor;
pub mod job_lock;
pub mod prelude;
pub mod project;
pub mod user;
