use std::sync::Arc;

use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter, TransactionTrait,
};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::order::{
        self, completion_date_in_past, Entity as OrderEntity, Model as OrderModel, OrderEvent,
        OrderState,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Owns the three lifecycle columns of an order: `state`, `paid_for_on`,
/// `completed_on`. Every write to them goes through [`apply_event`]; the
/// generic update path cannot reach them.
///
/// [`apply_event`]: OrderLifecycleService::apply_event
#[derive(Clone)]
pub struct OrderLifecycleService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderLifecycleService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Marks an order as paid. Legal only from state `new`.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn pay(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        self.apply_event(order_id, OrderEvent::Pay).await
    }

    /// Marks an order as completed. Legal only from state `paid`; an order
    /// cannot skip payment.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn complete(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        self.apply_event(order_id, OrderEvent::Complete).await
    }

    /// Single entry point for lifecycle transitions: loads the order, looks
    /// the event up in the transition table, applies the mandated timestamp
    /// side effect, and persists state + timestamp + version as one
    /// compare-and-set guarded by the observed state and version. A losing
    /// racer sees zero rows affected and fails with `InvalidTransition`
    /// against the state that actually won.
    #[instrument(skip(self), fields(order_id = %order_id, event = %event))]
    pub async fn apply_event(
        &self,
        order_id: Uuid,
        event: OrderEvent,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db;

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for transition");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order for transition");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for transition");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        let current = parse_state(&order)?;

        let next = event.transition(current).ok_or_else(|| {
            warn!(order_id = %order_id, state = %current, event = %event, "Illegal transition rejected");
            ServiceError::InvalidTransition {
                from: current,
                event,
            }
        })?;

        let now = Utc::now();

        // Apply the side effect the table mandates for the target state.
        let mut update = OrderEntity::update_many()
            .col_expr(order::Column::State, Expr::value(next.to_string()))
            .col_expr(order::Column::UpdatedAt, Expr::value(Some(now)))
            .col_expr(order::Column::Version, Expr::value(order.version + 1))
            .filter(order::Column::Id.eq(order_id))
            .filter(order::Column::State.eq(current.to_string()))
            .filter(order::Column::Version.eq(order.version));

        match next {
            OrderState::Paid => {
                update = update.col_expr(order::Column::PaidForOn, Expr::value(Some(now)));
            }
            OrderState::Completed => {
                if !completion_date_in_past(Some(now), Utc::now()) {
                    return Err(ServiceError::ValidationError(
                        "completed_on: cannot be in the future".to_string(),
                    ));
                }
                update = update.col_expr(order::Column::CompletedOn, Expr::value(Some(now)));
            }
            OrderState::New => {}
        }

        let result = update.exec(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to persist transition");
            ServiceError::DatabaseError(e)
        })?;

        if result.rows_affected == 0 {
            // A concurrent transition won the race between our read and our
            // write. Release the transaction, then report against the state
            // that is now persisted.
            txn.rollback().await.map_err(ServiceError::DatabaseError)?;

            let fresh = OrderEntity::find_by_id(order_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

            let from = parse_state(&fresh)?;
            warn!(order_id = %order_id, state = %from, event = %event, "Lost transition race");
            return Err(ServiceError::InvalidTransition { from, event });
        }

        let updated = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit transition");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            from = %current,
            to = %next,
            "Order transitioned"
        );

        if let Some(event_sender) = &self.event_sender {
            let domain_event = match next {
                OrderState::Paid => Event::OrderPaid(order_id),
                OrderState::Completed => Event::OrderCompleted(order_id),
                OrderState::New => Event::OrderUpdated(order_id),
            };
            if let Err(e) = event_sender.send(domain_event).await {
                warn!(error = %e, order_id = %order_id, "Failed to send transition event");
            }
        }

        Ok(updated)
    }
}

fn parse_state(order: &OrderModel) -> Result<OrderState, ServiceError> {
    order.order_state().map_err(|_| {
        error!(order_id = %order.id, state = %order.state, "Order has unrecognized state");
        ServiceError::InternalError(format!(
            "Order {} has unrecognized state '{}'",
            order.id, order.state
        ))
    })
}
