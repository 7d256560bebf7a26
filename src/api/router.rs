//! API Router with Swagger UI
//!
//! One router per module nested under `/api/v1`, the auth middleware layered
//! on everything except `/health`, `/metrics` and the public membership
//! endpoints.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::dto::*;
use crate::api::handlers::{bookings, customers, health, machines, public, sites};
use crate::auth::middleware::auth_middleware;
use crate::auth::AuthState;
use crate::services::{
    BookingService, CustomerService, HeartbeatService, MachineService, SiteService,
};

/// Shared state for every handler
#[derive(Clone)]
pub struct AppState {
    pub bookings: Arc<BookingService>,
    pub customers: Arc<CustomerService>,
    pub machines: Arc<MachineService>,
    pub sites: Arc<SiteService>,
    pub heartbeats: Arc<HeartbeatService>,
    pub prometheus: PrometheusHandle,
    pub env: String,
    pub started_at: Instant,
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token"))
                        .build(),
                ),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // Health
        health::health_check,
        health::metrics,
        // Bookings
        bookings::list_bookings,
        bookings::create_booking,
        bookings::get_booking,
        bookings::update_booking,
        bookings::cancel_booking,
        bookings::complete_booking,
        bookings::regenerate_otp,
        bookings::extend_booking,
        bookings::verify_otp,
        bookings::search_bookings,
        bookings::active_bookings,
        bookings::booking_stats,
        bookings::bookings_by_machine,
        bookings::bookings_by_vehicle,
        // Customers
        customers::list_customers,
        customers::create_customer,
        customers::search_customers,
        customers::get_customer,
        customers::delete_customer,
        customers::add_vehicle,
        customers::remove_vehicle,
        customers::create_membership,
        customers::deactivate_membership,
        customers::membership_history,
        customers::validate_membership,
        // Machines
        machines::list_machines,
        machines::create_machine,
        machines::get_machine,
        machines::update_machine,
        machines::delete_machine,
        machines::available_machines,
        machines::occupy_pallet,
        machines::release_pallet,
        machines::release_vehicle,
        machines::pallet_maintenance,
        machines::update_heartbeat,
        machines::maintenance_due,
        machines::heartbeat_statuses,
        machines::connection_stats,
        // Sites
        sites::list_sites,
        sites::create_site,
        sites::get_site,
        sites::update_site,
        sites::delete_site,
        sites::site_statistics,
        sites::site_users,
        sites::assign_user,
        // Public
        public::purchase_membership,
        public::validate_membership,
    ),
    components(
        schemas(
            BookingDto,
            CreatedBookingDto,
            BookingStatsDto,
            CreateBookingRequest,
            UpdateBookingRequest,
            CompleteBookingRequest,
            CancelBookingRequest,
            ExtendBookingRequest,
            VerifyOtpRequest,
            CustomerDto,
            VehicleDto,
            MembershipDto,
            MembershipPaymentDto,
            CreateCustomerRequest,
            VehicleRequest,
            CreateMembershipRequest,
            ValidateMembershipRequest,
            PublicMembershipPurchaseRequest,
            MachineDto,
            PalletDto,
            OccupantDto,
            CreateMachineRequest,
            UpdateMachineRequest,
            OccupyPalletRequest,
            ReleasePalletRequest,
            ReleaseVehicleRequest,
            PalletMaintenanceRequest,
            HeartbeatRequest,
            MachineLivenessDto,
            ConnectionStatsDto,
            SiteDto,
            CreateSiteRequest,
            UpdateSiteRequest,
            AssignUserRequest,
            SiteStatisticsDto,
            SiteUserDto,
            health::HealthDto,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and metrics endpoints."),
        (name = "Bookings", description = "Parking session lifecycle: creation with OTP issuance, retrieval OTP redemption, completion with payment capture, soft cancellation, extension and queries."),
        (name = "Customers", description = "Customer registry with embedded vehicles and the customer-level membership (6-digit number + 4-digit PIN)."),
        (name = "Machines", description = "Mechanical parking machines and their pallet arrays: allocation, release, maintenance, heartbeats and availability."),
        (name = "Sites", description = "Multi-tenant site administration: CRUD, user assignment and on-demand statistics. Creation and permanent deletion are admin-only; updates and assignments are open to each site's site-admin/supervisor roles."),
        (name = "Public", description = "Unauthenticated customer-facing membership purchase and validation."),
    ),
    info(
        title = "Stackpark API",
        version = "1.0.0",
        description = "Operational backbone of a multi-site mechanical parking network: pallet allocation, booking lifecycle, memberships and site administration."
    )
)]
pub struct ApiDoc;

/// Create the API router with all routes. An empty origin allow-list means
/// any origin.
pub fn create_api_router(
    state: AppState,
    auth_state: AuthState,
    allowed_origins: &[String],
) -> Router {
    let origins: Vec<axum::http::HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let booking_routes = Router::new()
        .route("/", get(bookings::list_bookings).post(bookings::create_booking))
        .route("/search", get(bookings::search_bookings))
        .route("/active", get(bookings::active_bookings))
        .route("/stats", get(bookings::booking_stats))
        .route("/verify-otp", post(bookings::verify_otp))
        .route("/machine/{machine_number}", get(bookings::bookings_by_machine))
        .route("/vehicle/{vehicle_number}", get(bookings::bookings_by_vehicle))
        .route(
            "/{id}",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::cancel_booking),
        )
        .route("/{id}/complete", post(bookings::complete_booking))
        .route("/{id}/regenerate-otp", post(bookings::regenerate_otp))
        .route("/{id}/extend", post(bookings::extend_booking))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let customer_routes = Router::new()
        .route("/", get(customers::list_customers).post(customers::create_customer))
        .route("/search", get(customers::search_customers))
        .route("/validate-membership", post(customers::validate_membership))
        .route(
            "/{id}",
            get(customers::get_customer).delete(customers::delete_customer),
        )
        .route("/{id}/vehicles", post(customers::add_vehicle))
        .route(
            "/{id}/vehicles/{vehicle_id}",
            axum::routing::delete(customers::remove_vehicle),
        )
        .route(
            "/{id}/membership",
            post(customers::create_membership).delete(customers::deactivate_membership),
        )
        .route("/{id}/memberships", get(customers::membership_history))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    let machine_routes = Router::new()
        .route("/", get(machines::list_machines).post(machines::create_machine))
        .route("/available", get(machines::available_machines))
        .route("/maintenance-due", get(machines::maintenance_due))
        .route("/heartbeats", get(machines::heartbeat_statuses))
        .route("/connection-stats", get(machines::connection_stats))
        .route(
            "/{id}",
            get(machines::get_machine)
                .put(machines::update_machine)
                .delete(machines::delete_machine),
        )
        .route("/{id}/pallets/{pallet}/occupy", post(machines::occupy_pallet))
        .route("/{id}/pallets/{pallet}/release", post(machines::release_pallet))
        .route(
            "/{id}/pallets/{pallet}/release-vehicle",
            post(machines::release_vehicle),
        )
        .route(
            "/{id}/pallets/{pallet}/maintenance",
            post(machines::pallet_maintenance),
        )
        .route("/{id}/heartbeat", post(machines::update_heartbeat))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // Site creation/permanent deletion check for the global admin role in
    // the handler; the rest is open to each site's managing roles.
    let site_routes = Router::new()
        .route("/", get(sites::list_sites).post(sites::create_site))
        .route(
            "/{id}",
            get(sites::get_site)
                .put(sites::update_site)
                .delete(sites::delete_site),
        )
        .route("/{id}/statistics", get(sites::site_statistics))
        .route("/{id}/users", get(sites::site_users))
        .route("/{id}/assign-user", post(sites::assign_user))
        .layer(middleware::from_fn_with_state(
            auth_state.clone(),
            auth_middleware,
        ))
        .with_state(state.clone());

    // Customer-facing endpoints, no auth.
    let public_routes = Router::new()
        .route("/membership/purchase", post(public::purchase_membership))
        .route("/membership/validate", post(public::validate_membership))
        .with_state(state.clone());

    let swagger_routes =
        SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    Router::new()
        .merge(swagger_routes)
        .route("/health", get(health::health_check))
        .route("/metrics", get(health::metrics))
        .nest("/api/v1/bookings", booking_routes)
        .nest("/api/v1/customers", customer_routes)
        .nest("/api/v1/machines", machine_routes)
        .nest("/api/v1/sites", site_routes)
        .nest("/api/v1/public", public_routes)
        .with_state(state)
        .layer(middleware::from_fn(
            crate::api::metrics::http_metrics_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
