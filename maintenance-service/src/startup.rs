use crate::config::{MaintenanceConfig, StoreBackend};
use crate::handlers::{self, bills, configs};
use crate::jobs::spawn_interest_job;
use crate::services::{
    init_metrics, BillRepository, BillingService, ConfigRepository, HttpNotifier, InMemoryStore,
    LogNotifier, MongoDb, MongoStore, Notifier,
};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::tracing::request_id_middleware;
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub config: MaintenanceConfig,
    pub billing: Arc<BillingService>,
    /// Present for the MongoDB backend; the in-memory store is always healthy.
    pub db: Option<MongoDb>,
}

impl AppState {
    pub async fn store_health(&self) -> Result<(), AppError> {
        match &self.db {
            Some(db) => db.health_check().await,
            None => Ok(()),
        }
    }
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
    interest_job: Option<JoinHandle<()>>,
}

impl Application {
    pub async fn build(config: MaintenanceConfig) -> Result<Self, AppError> {
        init_metrics();

        let (bill_store, config_store, db) = match config.store.backend {
            StoreBackend::Mongo => {
                let uri = config.store.mongodb_uri.as_deref().ok_or_else(|| {
                    AppError::ConfigError(anyhow::anyhow!("MONGODB_URI is required for the mongo backend"))
                })?;
                let db = MongoDb::connect(uri, &config.store.mongodb_database).await?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                let store = Arc::new(MongoStore::new(db.clone()));
                let bills: Arc<dyn BillRepository> = store.clone();
                let configs: Arc<dyn ConfigRepository> = store;
                (bills, configs, Some(db))
            }
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; data is lost on restart");
                let store = Arc::new(InMemoryStore::new());
                let bills: Arc<dyn BillRepository> = store.clone();
                let configs: Arc<dyn ConfigRepository> = store;
                (bills, configs, None)
            }
        };

        let notifier: Arc<dyn Notifier> = match &config.notification.service_url {
            Some(url) => Arc::new(HttpNotifier::new(url, config.notification.timeout)),
            None => {
                tracing::info!("NOTIFICATION_SERVICE_URL not set, notifications are logged only");
                Arc::new(LogNotifier::new())
            }
        };

        let billing = Arc::new(BillingService::new(
            bill_store,
            config_store,
            notifier,
            config.generation.clone(),
            config.notification.timeout,
        ));
        let interest_job = spawn_interest_job(billing.clone(), config.interest_job.clone());

        let state = AppState {
            config: config.clone(),
            billing,
            db,
        };

        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
            interest_job,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn interest_job_running(&self) -> bool {
        self.interest_job.as_ref().is_some_and(|job| !job.is_finished())
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let result = self.server.await;
        if let Some(job) = self.interest_job {
            job.abort();
        }
        result
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route(
            "/societies/:society_id/bills",
            get(bills::list_bills).post(bills::create_single_bill),
        )
        .route("/societies/:society_id/bills/generate", post(bills::generate_bills))
        .route(
            "/societies/:society_id/bills/recalculate-interest",
            post(bills::recalculate_interest),
        )
        .route(
            "/societies/:society_id/bills/:bill_id",
            get(bills::get_bill)
                .patch(bills::update_bill)
                .delete(bills::delete_bill),
        )
        .route(
            "/societies/:society_id/bills/:bill_id/transitions",
            post(bills::transition_bill),
        )
        .route(
            "/societies/:society_id/billing-configs",
            get(configs::list_billing_configs).post(configs::add_billing_config),
        )
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}
