//! Agreement entity - a collaboration between a project owner and another user.
//!
//! Only read by the sync pipeline: a commit authored by a counterparty of an
//! active agreement is linked to that agreement.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::entity::agreement_status::AgreementStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agreements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub project_id: Uuid,
    /// The collaborator on the other side of the agreement.
    pub counterparty_id: Uuid,
    pub status: AgreementStatus,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::project::Entity",
        from = "Column::ProjectId",
        to = "super::project::Column::Id"
    )]
    Project,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CounterpartyId",
        to = "super::user::Column::Id"
    )]
    Counterparty,
}

impl Related<super::project::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Project.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_active(&self) -> bool {
        self.status == AgreementStatus::Active
    }
}
