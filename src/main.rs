//! Stackpark server binary
//!
//! Multi-site mechanical parking backend: pallet allocation, booking
//! lifecycle, memberships and site administration over REST.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use stackpark::api::{create_api_router, AppState};
use stackpark::auth::{AuthState, JwtConfig};
use stackpark::config::Config;
use stackpark::services::{
    BookingService, CustomerService, HeartbeatService, MachineService, SiteService,
};
use stackpark::shared::shutdown::{listen_for_shutdown_signals, ShutdownSignal};
use stackpark::storage::{InMemoryStorage, Storage};

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .init();
    info!(env = %config.server.env, "Starting Stackpark server");

    // Prometheus recorder must be installed before any metrics calls.
    let prometheus = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    info!("📊 Prometheus metrics recorder installed");

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStorage::new());

    let machines = Arc::new(MachineService::new(storage.clone()));
    let state = AppState {
        bookings: Arc::new(BookingService::new(
            storage.clone(),
            machines.clone(),
            config.otp.booking_expire_minutes,
        )),
        customers: Arc::new(CustomerService::new(storage.clone())),
        machines,
        sites: Arc::new(SiteService::new(storage.clone())),
        heartbeats: Arc::new(HeartbeatService::new(storage.clone())),
        prometheus,
        env: config.server.env.clone(),
        started_at: Instant::now(),
    };
    let auth_state = AuthState {
        jwt: JwtConfig::from_security(&config.security),
        storage: storage.clone(),
    };

    let app = create_api_router(state, auth_state, &config.cors.allowed_origins).layer(
        tower_http::timeout::TimeoutLayer::new(std::time::Duration::from_secs(
            config.server.operation_timeout_secs,
        )),
    );

    let shutdown = ShutdownSignal::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            listen_for_shutdown_signals(shutdown).await;
        });
    }

    if let Err(e) = stackpark::server::serve(app, config.server.port, shutdown).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }

    info!("✅ Graceful shutdown completed");
}
