pub mod employees;
pub mod frames;
pub mod orders;

use std::sync::Arc;

use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    employees::EmployeeService, frames::FrameService, order_lifecycle::OrderLifecycleService,
    orders::OrderService,
};

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<OrderService>,
    pub lifecycle: Arc<OrderLifecycleService>,
    pub frames: Arc<FrameService>,
    pub employees: Arc<EmployeeService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            orders: Arc::new(OrderService::new(db.clone(), event_sender.clone())),
            lifecycle: Arc::new(OrderLifecycleService::new(db.clone(), event_sender.clone())),
            frames: Arc::new(FrameService::new(db.clone(), event_sender.clone())),
            employees: Arc::new(EmployeeService::new(db, event_sender)),
        }
    }
}
