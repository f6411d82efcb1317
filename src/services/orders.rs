use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Select,
    Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::brand::Entity as BrandEntity,
    entities::employee::Entity as EmployeeEntity,
    entities::frame::{self, Entity as FrameEntity},
    entities::order::{
        self, completion_date_in_past, ActiveModel as OrderActiveModel, Entity as OrderEntity,
        Model as OrderModel, OrderState,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

/// Request/Response types for the order service

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub customer_name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub customer_email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub description: String,
    pub price: Decimal,
    pub frame_id: Uuid,
    pub assigned_to: Option<Uuid>,
}

/// Allow-list for the generic edit path. The lifecycle columns (`state`,
/// `paid_for_on`, `completed_on`) are structurally absent from this type, so
/// values supplied for them in a payload are dropped at deserialization and
/// can never reach the database.
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub customer_name: Option<String>,
    #[validate(email(message = "must be a valid email address"))]
    pub customer_email: Option<String>,
    #[validate(length(min = 1, message = "is required"))]
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub frame_id: Option<Uuid>,
    /// Absent means "leave assignment unchanged"; an explicit null unassigns.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "double_option"
    )]
    #[schema(value_type = Option<Uuid>)]
    pub assigned_to: Option<Option<Uuid>>,
}

/// Keeps "field present with null" distinguishable from "field absent":
/// a present field always deserializes to `Some(inner)`.
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_name: String,
    pub customer_email: String,
    pub description: String,
    pub price: Decimal,
    pub frame_id: Uuid,
    /// Derived through the frame at read time; never stored on the order.
    pub brand_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
    pub state: OrderState,
    pub paid_for_on: Option<DateTime<Utc>>,
    pub completed_on: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Read-only views over the order collection, composed as an intersection of
/// independent predicates; applying them in any order yields the same set.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrderFilter {
    /// `Some(true)` = paid (`paid_for_on` set), `Some(false)` = unpaid.
    pub paid: Option<bool>,
    /// `Some(true)` = finished (`completed_on` set), `Some(false)` = unfinished.
    pub finished: Option<bool>,
    /// Orders assigned to this employee.
    pub assigned_to: Option<Uuid>,
}

impl OrderFilter {
    /// The work queue for an employee: assigned to them, paid for, and not
    /// yet completed.
    pub fn work_queue(employee_id: Uuid) -> Self {
        Self {
            paid: Some(true),
            finished: Some(false),
            assigned_to: Some(employee_id),
        }
    }

    fn apply(self, mut query: Select<OrderEntity>) -> Select<OrderEntity> {
        match self.paid {
            Some(true) => query = query.filter(order::Column::PaidForOn.is_not_null()),
            Some(false) => query = query.filter(order::Column::PaidForOn.is_null()),
            None => {}
        }
        match self.finished {
            Some(true) => query = query.filter(order::Column::CompletedOn.is_not_null()),
            Some(false) => query = query.filter(order::Column::CompletedOn.is_null()),
            None => {}
        }
        if let Some(employee_id) = self.assigned_to {
            query = query.filter(order::Column::AssignedTo.eq(employee_id));
        }
        query
    }
}

/// Service for creating, editing, and querying orders. Lifecycle transitions
/// live in [`OrderLifecycleService`]; this service never touches `state`,
/// `paid_for_on`, or `completed_on` beyond their initial null defaults.
///
/// [`OrderLifecycleService`]: crate::services::order_lifecycle::OrderLifecycleService
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a new order in state `new` with both lifecycle timestamps null.
    #[instrument(skip(self, request), fields(customer_name = %request.customer_name))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db;
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        ensure_frame_exists(&txn, request.frame_id).await?;
        if let Some(employee_id) = request.assigned_to {
            ensure_employee_exists(&txn, employee_id).await?;
        }

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            customer_name: Set(request.customer_name.clone()),
            customer_email: Set(request.customer_email),
            description: Set(request.description),
            price: Set(request.price),
            frame_id: Set(request.frame_id),
            assigned_to: Set(request.assigned_to),
            state: Set(OrderState::New.to_string()),
            paid_for_on: Set(None),
            completed_on: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        let brand_id = resolve_brand_id(&txn, order_model.frame_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Order created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        model_to_response(order_model, brand_id)
    }

    /// Retrieves an order by ID, including its derived brand.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order");
                ServiceError::DatabaseError(e)
            })?;

        match order {
            Some(order_model) => {
                let brand_id = resolve_brand_id(db, order_model.frame_id).await?;
                Ok(Some(model_to_response(order_model, brand_id)?))
            }
            None => Ok(None),
        }
    }

    /// Applies an allow-listed edit to an order. Lifecycle columns are not
    /// reachable through this path; everything else re-validates before the
    /// write, including the rule that a stored completion date may never lie
    /// in the future.
    #[instrument(skip(self, request), fields(order_id = %order_id))]
    pub async fn update_order(
        &self,
        order_id: Uuid,
        request: UpdateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let db = &*self.db;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to start transaction for order update");
            ServiceError::DatabaseError(e)
        })?;

        let order = OrderEntity::find_by_id(order_id)
            .one(&txn)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to find order for update");
                ServiceError::DatabaseError(e)
            })?
            .ok_or_else(|| {
                warn!(order_id = %order_id, "Order not found for update");
                ServiceError::NotFound(format!("Order {} not found", order_id))
            })?;

        if !completion_date_in_past(order.completed_on, now) {
            return Err(ServiceError::ValidationError(
                "completed_on: cannot be in the future".to_string(),
            ));
        }

        if let Some(frame_id) = request.frame_id {
            ensure_frame_exists(&txn, frame_id).await?;
        }
        if let Some(Some(employee_id)) = request.assigned_to {
            ensure_employee_exists(&txn, employee_id).await?;
        }

        let current_version = order.version;
        let mut order_active_model: OrderActiveModel = order.into();

        if let Some(customer_name) = request.customer_name {
            order_active_model.customer_name = Set(customer_name);
        }
        if let Some(customer_email) = request.customer_email {
            order_active_model.customer_email = Set(customer_email);
        }
        if let Some(description) = request.description {
            order_active_model.description = Set(description);
        }
        if let Some(price) = request.price {
            order_active_model.price = Set(price);
        }
        if let Some(frame_id) = request.frame_id {
            order_active_model.frame_id = Set(frame_id);
        }
        if let Some(assignment) = request.assigned_to {
            order_active_model.assigned_to = Set(assignment);
        }
        order_active_model.updated_at = Set(Some(now));
        order_active_model.version = Set(current_version + 1);

        let updated_order = order_active_model.update(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to update order");
            ServiceError::DatabaseError(e)
        })?;

        let brand_id = resolve_brand_id(&txn, updated_order.frame_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order update");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, "Order updated");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderUpdated(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order updated event");
            }
        }

        model_to_response(updated_order, brand_id)
    }

    /// Deletes an order. No cascading side effects on frames or employees.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db;

        let result = OrderEntity::delete_by_id(order_id).exec(db).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to delete order");
            ServiceError::DatabaseError(e)
        })?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound(format!(
                "Order {} not found",
                order_id
            )));
        }

        info!(order_id = %order_id, "Order deleted");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderDeleted(order_id)).await {
                warn!(error = %e, order_id = %order_id, "Failed to send order deleted event");
            }
        }

        Ok(())
    }

    /// Lists orders matching the filter, newest first, paginated.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        filter: OrderFilter,
        page: u64,
        per_page: u64,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db;
        let page = page.max(1);

        let paginator = filter
            .apply(OrderEntity::find())
            .order_by_desc(order::Column::CreatedAt)
            .paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let brand_ids = resolve_brand_ids(db, &orders).await?;
        let order_responses: Vec<OrderResponse> = orders
            .into_iter()
            .map(|order| {
                let brand_id = brand_ids.get(&order.frame_id).copied().flatten();
                model_to_response(order, brand_id)
            })
            .collect::<Result<_, _>>()?;

        Ok(OrderListResponse {
            orders: order_responses,
            total,
            page,
            per_page,
        })
    }
}

/// Two-hop derived read: order → frame → brand. Nil-safe; a frame without a
/// brand (or with a dangling brand pointer) yields `None`.
async fn resolve_brand_id<C: sea_orm::ConnectionTrait>(
    conn: &C,
    frame_id: Uuid,
) -> Result<Option<Uuid>, ServiceError> {
    let frame = FrameEntity::find_by_id(frame_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let Some(brand_id) = frame.and_then(|f| f.brand_id) else {
        return Ok(None);
    };

    let brand = BrandEntity::find_by_id(brand_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    Ok(brand.map(|b| b.id))
}

/// Batch variant of [`resolve_brand_id`] for list pages: one query for the
/// frames, one for their brands.
async fn resolve_brand_ids<C: sea_orm::ConnectionTrait>(
    conn: &C,
    orders: &[OrderModel],
) -> Result<HashMap<Uuid, Option<Uuid>>, ServiceError> {
    let frame_ids: HashSet<Uuid> = orders.iter().map(|o| o.frame_id).collect();
    if frame_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let frames = FrameEntity::find()
        .filter(frame::Column::Id.is_in(frame_ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    let brand_ids: HashSet<Uuid> = frames.iter().filter_map(|f| f.brand_id).collect();
    let existing_brands: HashSet<Uuid> = if brand_ids.is_empty() {
        HashSet::new()
    } else {
        BrandEntity::find()
            .filter(crate::entities::brand::Column::Id.is_in(brand_ids.iter().copied()))
            .all(conn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|b| b.id)
            .collect()
    };

    Ok(frames
        .into_iter()
        .map(|f| {
            let brand = f.brand_id.filter(|id| existing_brands.contains(id));
            (f.id, brand)
        })
        .collect())
}

async fn ensure_frame_exists<C: sea_orm::ConnectionTrait>(
    conn: &C,
    frame_id: Uuid,
) -> Result<(), ServiceError> {
    let found = FrameEntity::find_by_id(frame_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if found.is_none() {
        return Err(ServiceError::ValidationError(format!(
            "frame_id: no frame with id {}",
            frame_id
        )));
    }
    Ok(())
}

async fn ensure_employee_exists<C: sea_orm::ConnectionTrait>(
    conn: &C,
    employee_id: Uuid,
) -> Result<(), ServiceError> {
    let found = EmployeeEntity::find_by_id(employee_id)
        .one(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if found.is_none() {
        return Err(ServiceError::ValidationError(format!(
            "assigned_to: no employee with id {}",
            employee_id
        )));
    }
    Ok(())
}

/// Converts an order model to response format
fn model_to_response(
    model: OrderModel,
    brand_id: Option<Uuid>,
) -> Result<OrderResponse, ServiceError> {
    let state = model.order_state().map_err(|_| {
        ServiceError::InternalError(format!(
            "Order {} has unrecognized state '{}'",
            model.id, model.state
        ))
    })?;
    Ok(OrderResponse {
        id: model.id,
        customer_name: model.customer_name,
        customer_email: model.customer_email,
        description: model.description,
        price: model.price,
        frame_id: model.frame_id,
        brand_id,
        assigned_to: model.assigned_to,
        state,
        paid_for_on: model.paid_for_on,
        completed_on: model.completed_on,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn model_to_response_conversion() {
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let frame_id = Uuid::new_v4();
        let brand_id = Uuid::new_v4();

        let model = OrderModel {
            id: order_id,
            customer_name: "Ada Lovelace".to_string(),
            customer_email: "ada@example.com".to_string(),
            description: "Walnut frame for a 40x60 print".to_string(),
            price: dec!(129.95),
            frame_id,
            assigned_to: None,
            state: "paid".to_string(),
            paid_for_on: Some(now),
            completed_on: None,
            created_at: now,
            updated_at: Some(now),
            version: 2,
        };

        let response = model_to_response(model, Some(brand_id)).unwrap();

        assert_eq!(response.id, order_id);
        assert_eq!(response.state, OrderState::Paid);
        assert_eq!(response.brand_id, Some(brand_id));
        assert_eq!(response.paid_for_on, Some(now));
        assert_eq!(response.completed_on, None);
        assert_eq!(response.price, dec!(129.95));
    }

    #[test]
    fn update_request_drops_protected_fields_at_deserialization() {
        // A payload smuggling lifecycle fields must deserialize cleanly with
        // the protected values discarded.
        let payload = serde_json::json!({
            "description": "Now with matting",
            "state": "completed",
            "paid_for_on": "2024-05-01T00:00:00Z",
            "completed_on": "2024-05-02T00:00:00Z"
        });

        let request: UpdateOrderRequest = serde_json::from_value(payload).unwrap();

        assert_eq!(request.description.as_deref(), Some("Now with matting"));
        assert!(request.customer_name.is_none());
        assert!(request.frame_id.is_none());
        assert!(request.assigned_to.is_none());
    }

    #[test]
    fn update_request_distinguishes_unassign_from_untouched() {
        let untouched: UpdateOrderRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(untouched.assigned_to, None);

        let unassigned: UpdateOrderRequest =
            serde_json::from_value(serde_json::json!({ "assigned_to": null })).unwrap();
        assert_eq!(unassigned.assigned_to, Some(None));

        let employee_id = Uuid::new_v4();
        let assigned: UpdateOrderRequest =
            serde_json::from_value(serde_json::json!({ "assigned_to": employee_id })).unwrap();
        assert_eq!(assigned.assigned_to, Some(Some(employee_id)));
    }

    #[test]
    fn create_request_validation_names_offending_fields() {
        let request = CreateOrderRequest {
            customer_name: "".to_string(),
            customer_email: "not-an-email".to_string(),
            description: "Oak frame".to_string(),
            price: dec!(10.00),
            frame_id: Uuid::new_v4(),
            assigned_to: None,
        };

        let err = request.validate().unwrap_err().to_string();
        assert!(err.contains("customer_name"));
        assert!(err.contains("customer_email"));
        assert!(!err.contains("description"));
    }

    #[test]
    fn work_queue_filter_composes_all_three_predicates() {
        let employee_id = Uuid::new_v4();
        let filter = OrderFilter::work_queue(employee_id);

        assert_eq!(filter.paid, Some(true));
        assert_eq!(filter.finished, Some(false));
        assert_eq!(filter.assigned_to, Some(employee_id));
    }
}
