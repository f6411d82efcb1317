use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{self, Body},
    http::{header, Method, Request, StatusCode},
    response::Response,
    routing::get,
    Router,
};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use framery_api::{
    config::AppConfig,
    db::{self, DbConfig},
    entities::{brand, employee, frame},
    events,
    handlers::AppServices,
    AppState,
};

/// Helper harness for spinning up an application backed by a throwaway
/// SQLite database. Each instance gets its own database file so tests can
/// run in parallel.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    db_file: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_file =
            std::env::temp_dir().join(format!("framery_test_{}.db", Uuid::new_v4().simple()));

        let cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        // A single connection keeps SQLite happy and serializes transactions.
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);

        let (event_sender, event_rx) = events::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let services = AppServices::new(db_arc.clone(), Some(Arc::new(event_sender.clone())));

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let router = Router::new()
            .route("/", get(|| async { "framery-api up" }))
            .route("/health", get(framery_api::health::health_check))
            .nest("/api/v1", framery_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            db_file,
            _event_task: event_task,
        }
    }

    /// Issue a request against the in-process router.
    pub async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        let builder = Request::builder().method(method).uri(uri);

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request build"),
            None => builder.body(Body::empty()).expect("request build"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("request dispatch")
    }

    pub async fn seed_brand(&self, name: &str) -> brand::Model {
        brand::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed brand")
    }

    pub async fn seed_frame(&self, name: &str, brand_id: Option<Uuid>) -> frame::Model {
        frame::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            brand_id: Set(brand_id),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed frame")
    }

    pub async fn seed_employee(&self, name: &str, email: &str) -> employee::Model {
        employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("seed employee")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.db_file);
    }
}

/// Read a response body as JSON.
pub async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Assert a status and return the parsed body in one step.
pub async fn assert_json(response: Response, expected: StatusCode) -> Value {
    let status = response.status();
    let body = response_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {body}");
    body
}
