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
    entities::employee::{
        self, ActiveModel as EmployeeActiveModel, Entity as EmployeeEntity, Model as EmployeeModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, message = "is required"))]
    pub name: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

/// Service for staff records. Only what the assignment relation needs;
/// credentials and sign-in are an external concern.
#[derive(Clone)]
pub struct EmployeeService {
    db: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl EmployeeService {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_employee(
        &self,
        request: CreateEmployeeRequest,
    ) -> Result<EmployeeModel, ServiceError> {
        request.validate()?;

        let employee_id = Uuid::new_v4();
        let employee = EmployeeActiveModel {
            id: Set(employee_id),
            name: Set(request.name),
            email: Set(request.email),
            created_at: Set(Utc::now()),
        };

        let model = employee.insert(&*self.db).await.map_err(|e| {
            error!(error = %e, employee_id = %employee_id, "Failed to create employee");
            ServiceError::DatabaseError(e)
        })?;

        info!(employee_id = %employee_id, "Employee created");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::EmployeeCreated(employee_id)).await {
                warn!(error = %e, employee_id = %employee_id, "Failed to send employee created event");
            }
        }

        Ok(model)
    }

    #[instrument(skip(self), fields(employee_id = %employee_id))]
    pub async fn get_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<EmployeeModel>, ServiceError> {
        EmployeeEntity::find_by_id(employee_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    #[instrument(skip(self))]
    pub async fn list_employees(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<EmployeeModel>, u64), ServiceError> {
        let page = page.max(1);
        let paginator = EmployeeEntity::find()
            .order_by_asc(employee::Column::Name)
            .paginate(&*self.db, per_page);

        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let employees = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((employees, total))
    }
}
