//! JobLock entity - rows backing the TTL single-flight lock.

use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "job_locks")]
pub struct Model {
    /// Lock name, e.g. `poller:cycle`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub key: String,
    /// Token of the current holder; release only succeeds with a matching token.
    pub holder: Uuid,
    /// After this instant the lock may be taken over by anyone.
    pub expires_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
