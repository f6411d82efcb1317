use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::services::orders::{
    CreateOrderRequest, OrderFilter, OrderResponse, UpdateOrderRequest,
};
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

/// Query parameters for listing orders. The three view predicates compose as
/// an intersection; each one is independent of the others.
#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    #[serde(default = "crate::default_page")]
    pub page: u64,
    #[serde(default = "crate::default_limit")]
    pub limit: u64,
    /// true = paid orders only, false = unpaid only
    pub paid: Option<bool>,
    /// true = finished orders only, false = unfinished only
    pub finished: Option<bool>,
    /// Only orders assigned to this employee
    pub assigned_to: Option<Uuid>,
}

impl OrderListQuery {
    fn filter(&self) -> OrderFilter {
        OrderFilter {
            paid: self.paid,
            finished: self.finished,
            assigned_to: self.assigned_to,
        }
    }
}

/// List orders with pagination and view filtering
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders retrieved successfully"),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let result = state
        .services
        .orders
        .list_orders(query.filter(), query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.orders,
        result.total,
        result.page,
        result.per_page,
    ))))
}

/// Create a new order. Orders always start in state `new` with both
/// lifecycle timestamps null.
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully"),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
    )
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let order = state.services.orders.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Get an order by ID, including its derived brand
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order retrieved successfully"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    Ok(Json(ApiResponse::success(order)))
}

/// Update an order's editable fields. Lifecycle fields (`state`,
/// `paid_for_on`, `completed_on`) present in the payload are silently
/// dropped; only the pay/complete operations can write them.
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderRequest,
    responses(
        (status = 200, description = "Order updated successfully"),
        (status = 400, description = "Validation error", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateOrderRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.update_order(id, request).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Delete an order
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order deleted successfully"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(Json(ApiResponse::success(
        serde_json::json!({ "deleted": id }),
    )))
}

/// Mark an order as paid. Legal only from state `new`; stamps
/// `paid_for_on` with the transition time.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/pay",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order marked as paid"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not in a payable state", body = crate::errors::ErrorResponse),
    )
)]
pub async fn pay_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    state.services.lifecycle.pay(id).await?;

    // Re-read through the order service so the response carries the derived
    // brand like every other order payload.
    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    Ok(Json(ApiResponse::success(order)))
}

/// Mark an order as completed. Legal only from state `paid`; an order
/// cannot skip payment. Stamps `completed_on` with the transition time.
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/complete",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order marked as completed"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Order is not in a completable state", body = crate::errors::ErrorResponse),
    )
)]
pub async fn complete_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    state.services.lifecycle.complete(id).await?;

    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    Ok(Json(ApiResponse::success(order)))
}
