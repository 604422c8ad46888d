use axum::{middleware, routing::get, Router};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tracing::{info, warn};

use expense_tracker_rs::{
    handlers::{
        cors_middleware, create_expense_router, health_check, method_not_allowed_middleware,
        metrics_handler,
    },
    init_observability,
    observability::{observability_middleware, Metrics},
    repositories::DynamoDbExpenseRepository,
    services::{AlertPublisher, ExpenseService, SnsAlertPublisher},
    shutdown_observability, Config,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration first (basic logging only)
    let config = Config::from_environment().await?;
    println!("Configuration loaded successfully");

    init_observability(
        &config.observability.service_name,
        &config.observability.service_version,
        &config.observability.otlp_endpoint,
        config.observability.enable_json_logging,
    )?;

    info!("Starting expense-tracker-rs service");
    info!(
        "Service: {} v{}",
        config.observability.service_name, config.observability.service_version
    );
    info!("Region: {}", config.aws.region);
    info!(
        "DynamoDB table: expenses={}",
        config.database.expenses_table_name
    );

    let metrics = Arc::new(Metrics::new()?);
    info!("Metrics initialized successfully");

    // AWS clients come from config, already configured with region and retries
    let dynamodb_client = Arc::new(config.aws.dynamodb_client.clone());
    info!("AWS clients initialized successfully");

    let expense_repository = Arc::new(DynamoDbExpenseRepository::new(
        dynamodb_client,
        config.database.expenses_table_name.clone(),
        config.database.region.clone(),
    ));
    info!("Repository initialized successfully");

    // Wire the spend alert publisher if enabled. A misconfigured topic must
    // not keep the service from serving expense traffic.
    let expense_service = if config.alerts.alerts_enabled {
        match SnsAlertPublisher::new(
            config.aws.sns_client.clone(),
            config.alerts.topic_arn.clone(),
            config.alerts.alert_retry_attempts,
        ) {
            Ok(publisher) => {
                info!("Spend alert publisher initialized successfully");
                info!("Alerts topic_arn={}", config.alerts.topic_arn);
                Arc::new(ExpenseService::new_with_publisher(
                    expense_repository,
                    Arc::new(publisher) as Arc<dyn AlertPublisher>,
                    config.alerts.spend_limit,
                    config.identity.default_user_id.clone(),
                ))
            }
            Err(e) => {
                warn!(
                    "Failed to initialize spend alert publisher: {}, continuing without alerts",
                    e
                );
                Arc::new(ExpenseService::new(
                    expense_repository,
                    config.alerts.spend_limit,
                    config.identity.default_user_id.clone(),
                ))
            }
        }
    } else {
        info!("Spend alerts disabled");
        Arc::new(ExpenseService::new(
            expense_repository,
            config.alerts.spend_limit,
            config.identity.default_user_id.clone(),
        ))
    };
    info!("Services initialized successfully");

    let app = create_app(metrics, expense_service, config.server.request_timeout());

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);

    info!("Server listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    let shutdown_signal = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install CTRL+C signal handler");
        info!("Shutdown signal received");
        shutdown_observability().await;
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

fn create_app(
    metrics: Arc<Metrics>,
    expense_service: Arc<ExpenseService>,
    request_timeout: Duration,
) -> Router {
    let metrics_for_middleware = metrics.clone();

    Router::new()
        // Health and metrics endpoints (with metrics state)
        .route("/health/status", get(health_check))
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
        // Expense endpoints (with API state)
        .merge(create_expense_router(expense_service))
        // Middleware layers (order matters, outer to inner)
        .layer(middleware::from_fn(cors_middleware))
        .layer(middleware::from_fn(method_not_allowed_middleware))
        .layer(middleware::from_fn(move |req, next| {
            observability_middleware(metrics_for_middleware.clone(), req, next)
        }))
        .layer(TimeoutLayer::new(request_timeout))
}
