use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Staff member orders can be assigned to. Credentials and authentication
/// live outside this service; only the assignment relation is modeled here.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    AssignedOrders,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssignedOrders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
