use axum::response::Json;
use utoipa::OpenApi;

/// OpenAPI document for the v1 surface. Served as plain JSON; UI tooling is
/// a consumer concern.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Framery API",
        description = "Custom-framing order tracking: lifecycle transitions, staff assignment, and order views",
    ),
    paths(
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order,
        crate::handlers::orders::delete_order,
        crate::handlers::orders::pay_order,
        crate::handlers::orders::complete_order,
        crate::handlers::employees::work_queue,
    ),
    components(schemas(
        crate::entities::order::OrderState,
        crate::entities::order::OrderEvent,
        crate::services::orders::CreateOrderRequest,
        crate::services::orders::UpdateOrderRequest,
        crate::services::orders::OrderResponse,
        crate::services::frames::CreateFrameRequest,
        crate::services::employees::CreateEmployeeRequest,
        crate::errors::ErrorResponse,
    ))
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
