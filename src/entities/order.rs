use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle state of an order. Stored as its lowercase string form in the
/// `state` column; orders start in `new` and only ever move forward.
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderState {
    New,
    Paid,
    Completed,
}

/// The two events the lifecycle state machine understands.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OrderEvent {
    Pay,
    Complete,
}

impl OrderEvent {
    /// The transition table. Returns the target state when `self` is legal
    /// from `from`, `None` otherwise. Exhaustive over (state, event) pairs;
    /// anything not listed is an illegal transition.
    pub fn transition(self, from: OrderState) -> Option<OrderState> {
        match (from, self) {
            (OrderState::New, OrderEvent::Pay) => Some(OrderState::Paid),
            (OrderState::Paid, OrderEvent::Complete) => Some(OrderState::Completed),
            _ => None,
        }
    }
}

/// A persisted completion date may never lie in the future relative to
/// validation time. Guards both tampering through the edit path and clock
/// or logic errors in the transition path.
pub fn completion_date_in_past(completed_on: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match completed_on {
        Some(ts) => ts <= now,
        None => true,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub customer_name: String,
    pub customer_email: String,
    pub description: String,
    pub price: Decimal,

    pub frame_id: Uuid,
    pub assigned_to: Option<Uuid>,

    /// Lifecycle columns. Written only by the lifecycle service; the generic
    /// update path has no access to them.
    pub state: String,
    pub paid_for_on: Option<DateTime<Utc>>,
    pub completed_on: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

impl Model {
    /// Parses the stored `state` column back into the typed enum.
    pub fn order_state(&self) -> Result<OrderState, strum::ParseError> {
        self.state.parse()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::frame::Entity",
        from = "Column::FrameId",
        to = "super::frame::Column::Id"
    )]
    Frame,
    #[sea_orm(
        belongs_to = "super::employee::Entity",
        from = "Column::AssignedTo",
        to = "super::employee::Column::Id"
    )]
    AssignedEmployee,
}

impl Related<super::frame::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Frame.def()
    }
}

impl Related<super::employee::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AssignedEmployee.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
