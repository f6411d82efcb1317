use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::entities::employee;
use crate::services::employees::CreateEmployeeRequest;
use crate::services::orders::{OrderFilter, OrderResponse};
use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery, PaginatedResponse};

/// List employees
pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<employee::Model>>>, ServiceError> {
    let (employees, total) = state
        .services
        .employees
        .list_employees(query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        employees,
        total,
        query.page,
        query.limit,
    ))))
}

/// Create an employee record
pub async fn create_employee(
    State(state): State<AppState>,
    Json(request): Json<CreateEmployeeRequest>,
) -> Result<(StatusCode, Json<ApiResponse<employee::Model>>), ServiceError> {
    let employee = state.services.employees.create_employee(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(employee))))
}

/// The work queue for one employee: orders assigned to them that are paid
/// for but not yet completed. The employee is always an explicit path
/// parameter; there is no ambient "current employee".
#[utoipa::path(
    get,
    path = "/api/v1/employees/{id}/work-queue",
    params(
        ("id" = Uuid, Path, description = "Employee ID"),
        crate::ListQuery,
    ),
    responses(
        (status = 200, description = "Work queue retrieved successfully"),
        (status = 404, description = "Employee not found", body = crate::errors::ErrorResponse),
    )
)]
pub async fn work_queue(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    state
        .services
        .employees
        .get_employee(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", id)))?;

    let result = state
        .services
        .orders
        .list_orders(OrderFilter::work_queue(id), query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        result.orders,
        result.total,
        result.page,
        result.per_page,
    ))))
}
