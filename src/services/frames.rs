use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, QueryOrder, Set};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::brand::{Entity as BrandEntity, Model as BrandModel},
    entities::frame::{self, ActiveModel as FrameActiveModel, Entity as FrameEntity, Model as FrameModel},
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateFrameRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    pub brand_id: Option<Uuid>,
}

/// Service for the shop's frame catalog. Read-mostly; orders validate their
/// frame reference against it.
#[derive(Clone)]
pub struct FrameService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl FrameService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_frame(
        &self,
        request: CreateFrameRequest,
    ) -> Result<FrameModel, ServiceError> {
        request.validate()?;

        let db = &*self.db;

        if let Some(brand_id) = request.brand_id {
            let brand = BrandEntity::find_by_id(brand_id)
                .one(db)
                .await
                .map_err(ServiceError::DatabaseError)?;
            if brand.is_none() {
                return Err(ServiceError::ValidationError(format!(
                    "brand_id: no brand with id {}",
                    brand_id
                )));
            }
        }

        let frame_id = Uuid::new_v4();
        let frame = FrameActiveModel {
            id: Set(frame_id),
            name: Set(request.name),
            brand_id: Set(request.brand_id),
            created_at: Set(Utc::now()),
        };

        let model = frame.insert(db).await.map_err(|e| {
            error!(error = %e, frame_id = %frame_id, "Failed to create frame");
            ServiceError::DatabaseError(e)
        })?;

        info!(frame_id = %frame_id, "Frame created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::FrameCreated(frame_id)).await {
                warn!(error = %e, frame_id = %frame_id, "Failed to send frame created event");
            }
        }

        Ok(model)
    }

    #[instrument(skip(self), fields(frame_id = %frame_id))]
    pub async fn get_frame(&self, frame_id: Uuid) -> Result<Option<FrameModel>, ServiceError> {
        FrameEntity::find_by_id(frame_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_frames(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<FrameModel>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = FrameEntity::find()
            .order_by_asc(frame::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let frames = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((frames, total))
    }

    #[instrument(skip(self))]
    pub async fn list_brands(&self) -> Result<Vec<BrandModel>, ServiceError> {
        BrandEntity::find()
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}
