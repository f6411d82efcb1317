use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use uuid::Uuid;

use crate::entities::{brand, frame};
use crate::services::frames::CreateFrameRequest;
use crate::{errors::ServiceError, ApiResponse, AppState, ListQuery, PaginatedResponse};

/// List frames
pub async fn list_frames(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<frame::Model>>>, ServiceError> {
    let (frames, total) = state
        .services
        .frames
        .list_frames(query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse::new(
        frames,
        total,
        query.page,
        query.limit,
    ))))
}

/// Create a frame
pub async fn create_frame(
    State(state): State<AppState>,
    Json(request): Json<CreateFrameRequest>,
) -> Result<(StatusCode, Json<ApiResponse<frame::Model>>), ServiceError> {
    let frame = state.services.frames.create_frame(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(frame))))
}

/// Get a frame by ID
pub async fn get_frame(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<frame::Model>>, ServiceError> {
    let frame = state
        .services
        .frames
        .get_frame(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Frame {} not found", id)))?;

    Ok(Json(ApiResponse::success(frame)))
}

/// List brands
pub async fn list_brands(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<brand::Model>>>, ServiceError> {
    let brands = state.services.frames.list_brands().await?;
    Ok(Json(ApiResponse::success(brands)))
}
