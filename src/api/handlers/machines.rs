//! Machine API handlers

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::{parse_machine_kind, parse_machine_status, parse_vehicle_class, require_admin};
use crate::api::common::ValidatedJson;
use crate::api::dto::{
    error_response, ApiError, ApiResponse, AvailableMachinesQuery, ConnectionStatsDto,
    CreateMachineRequest, HeartbeatRequest, MachineDto, MachineListQuery, MachineLivenessDto,
    OccupyPalletRequest, PalletMaintenanceRequest, ReleasePalletRequest, ReleaseVehicleRequest,
    UpdateMachineRequest,
};
use crate::api::router::AppState;
use crate::auth::AuthenticatedUser;
use crate::domain::{Machine, PalletKey};
use crate::services::{CreateMachineInput, ReleaseBy};

type MachineResult = Result<Json<ApiResponse<MachineDto>>, ApiError>;

/// Load a machine and apply read scoping.
async fn scoped_machine(
    state: &AppState,
    user: &AuthenticatedUser,
    id: &str,
) -> Result<Machine, ApiError> {
    let machine = state.machines.get_machine(id).await.map_err(error_response)?;
    user.ensure_site_read(&machine.site_id, "machine")
        .map_err(error_response)?;
    Ok(machine)
}

/// List machines, optionally per site
#[utoipa::path(
    get,
    path = "/api/v1/machines",
    tag = "Machines",
    params(MachineListQuery),
    responses(
        (status = 200, description = "Machines", body = ApiResponse<Vec<MachineDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_machines(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<MachineListQuery>,
) -> Result<Json<ApiResponse<Vec<MachineDto>>>, ApiError> {
    if let Some(site_id) = &query.site_id {
        user.ensure_site_read(site_id, "machine")
            .map_err(error_response)?;
    }
    let mut machines = state
        .machines
        .list_machines(query.site_id.as_deref())
        .await
        .map_err(error_response)?;
    if !user.is_admin() {
        machines.retain(|m| user.can_access_site(&m.site_id));
    }
    machines.sort_by(|a, b| a.code.cmp(&b.code));
    let items: Vec<MachineDto> = machines.into_iter().map(MachineDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Machines retrieved", items)))
}

/// Register a machine; pallets are auto-initialized (admin)
#[utoipa::path(
    post,
    path = "/api/v1/machines",
    tag = "Machines",
    request_body = CreateMachineRequest,
    responses(
        (status = 200, description = "Machine registered", body = ApiResponse<MachineDto>),
        (status = 409, description = "Code already used at the site")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_machine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<CreateMachineRequest>,
) -> MachineResult {
    require_admin(&user)?;
    let kind = parse_machine_kind(&body.machine_type).map_err(error_response)?;
    let vehicle_class = parse_vehicle_class(&body.parking_type).map_err(error_response)?;

    let machine = state
        .machines
        .create_machine(CreateMachineInput {
            site_id: body.site_id,
            code: body.machine_number,
            kind,
            vehicle_class,
            total_pallets: body.total_pallets,
            pricing: None,
        })
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Machine registered",
        MachineDto::from_domain(machine),
    )))
}

/// Get one machine with its pallet array
#[utoipa::path(
    get,
    path = "/api/v1/machines/{id}",
    tag = "Machines",
    params(("id" = String, Path, description = "Machine ID")),
    responses(
        (status = 200, description = "Machine details", body = ApiResponse<MachineDto>),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_machine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> MachineResult {
    let machine = scoped_machine(&state, &user, &id).await?;
    Ok(Json(ApiResponse::success(
        "Machine retrieved",
        MachineDto::from_domain(machine),
    )))
}

/// Update machine status or retarget kinematics/class (admin)
#[utoipa::path(
    put,
    path = "/api/v1/machines/{id}",
    tag = "Machines",
    params(("id" = String, Path, description = "Machine ID")),
    request_body = UpdateMachineRequest,
    responses(
        (status = 200, description = "Machine updated", body = ApiResponse<MachineDto>),
        (status = 400, description = "Machine still holds vehicles")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_machine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateMachineRequest>,
) -> MachineResult {
    require_admin(&user)?;
    let mut machine = state.machines.get_machine(&id).await.map_err(error_response)?;

    if body.machine_type.is_some() || body.parking_type.is_some() {
        let kind = match &body.machine_type {
            Some(s) => parse_machine_kind(s).map_err(error_response)?,
            None => machine.kind,
        };
        let class = match &body.parking_type {
            Some(s) => parse_vehicle_class(s).map_err(error_response)?,
            None => machine.vehicle_class,
        };
        machine = state
            .machines
            .retarget_machine(&id, kind, class)
            .await
            .map_err(error_response)?;
    }
    if let Some(status) = &body.status {
        let status = parse_machine_status(status).map_err(error_response)?;
        machine = state
            .machines
            .set_status(&id, status)
            .await
            .map_err(error_response)?;
    }

    Ok(Json(ApiResponse::success(
        "Machine updated",
        MachineDto::from_domain(machine),
    )))
}

/// Delete a machine; only legal when empty (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/machines/{id}",
    tag = "Machines",
    params(("id" = String, Path, description = "Machine ID")),
    responses(
        (status = 200, description = "Machine removed", body = ApiResponse<String>),
        (status = 400, description = "Machine still holds vehicles")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_machine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_admin(&user)?;
    state.machines.delete_machine(&id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success("Machine removed", id)))
}

/// Machines able to take one more vehicle of the class
#[utoipa::path(
    get,
    path = "/api/v1/machines/available",
    tag = "Machines",
    params(AvailableMachinesQuery),
    responses(
        (status = 200, description = "Available machines, most free capacity first", body = ApiResponse<Vec<MachineDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn available_machines(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<AvailableMachinesQuery>,
) -> Result<Json<ApiResponse<Vec<MachineDto>>>, ApiError> {
    let vehicle_class = parse_vehicle_class(&query.vehicle_type).map_err(error_response)?;
    if let Some(site_id) = &query.site_id {
        user.ensure_site_read(site_id, "machine")
            .map_err(error_response)?;
    }
    let mut machines = state
        .machines
        .find_available(vehicle_class, query.site_id.as_deref())
        .await
        .map_err(error_response)?;
    if !user.is_admin() {
        machines.retain(|m| user.can_access_site(&m.site_id));
    }
    let items: Vec<MachineDto> = machines.into_iter().map(MachineDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Available machines", items)))
}

/// Park a vehicle on a pallet
#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/pallets/{pallet}/occupy",
    tag = "Machines",
    params(
        ("id" = String, Path, description = "Machine ID"),
        ("pallet" = String, Path, description = "Pallet number or custom name")
    ),
    request_body = OccupyPalletRequest,
    responses(
        (status = 200, description = "Pallet occupied", body = ApiResponse<MachineDto>),
        (status = 400, description = "Machine offline, pallet full/maintenance or position taken")
    ),
    security(("bearer_auth" = []))
)]
pub async fn occupy_pallet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((id, pallet)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<OccupyPalletRequest>,
) -> MachineResult {
    let machine = scoped_machine(&state, &user, &id).await?;
    user.ensure_site_operate(&machine.site_id)
        .map_err(error_response)?;

    let updated = state
        .machines
        .occupy_pallet(
            &id,
            PalletKey::from(pallet.as_str()),
            &body.booking_id,
            &body.vehicle_number,
            body.position,
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Pallet occupied",
        MachineDto::from_domain(updated),
    )))
}

/// Release a pallet occupant by booking id
#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/pallets/{pallet}/release",
    tag = "Machines",
    params(
        ("id" = String, Path, description = "Machine ID"),
        ("pallet" = String, Path, description = "Pallet number or custom name")
    ),
    request_body = ReleasePalletRequest,
    responses(
        (status = 200, description = "Pallet released", body = ApiResponse<MachineDto>),
        (status = 400, description = "No matching occupant")
    ),
    security(("bearer_auth" = []))
)]
pub async fn release_pallet(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((id, pallet)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<ReleasePalletRequest>,
) -> MachineResult {
    let machine = scoped_machine(&state, &user, &id).await?;
    user.ensure_site_operate(&machine.site_id)
        .map_err(error_response)?;

    let updated = state
        .machines
        .release_pallet(
            &id,
            PalletKey::from(pallet.as_str()),
            ReleaseBy::Booking(body.booking_id),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Pallet released",
        MachineDto::from_domain(updated),
    )))
}

/// Release a pallet occupant by vehicle plate
#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/pallets/{pallet}/release-vehicle",
    tag = "Machines",
    params(
        ("id" = String, Path, description = "Machine ID"),
        ("pallet" = String, Path, description = "Pallet number or custom name")
    ),
    request_body = ReleaseVehicleRequest,
    responses(
        (status = 200, description = "Vehicle released", body = ApiResponse<MachineDto>),
        (status = 400, description = "No matching occupant")
    ),
    security(("bearer_auth" = []))
)]
pub async fn release_vehicle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((id, pallet)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<ReleaseVehicleRequest>,
) -> MachineResult {
    let machine = scoped_machine(&state, &user, &id).await?;
    user.ensure_site_operate(&machine.site_id)
        .map_err(error_response)?;

    let updated = state
        .machines
        .release_pallet(
            &id,
            PalletKey::from(pallet.as_str()),
            ReleaseBy::Vehicle(body.vehicle_number),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Vehicle released",
        MachineDto::from_domain(updated),
    )))
}

/// Declare or clear pallet maintenance
#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/pallets/{pallet}/maintenance",
    tag = "Machines",
    params(
        ("id" = String, Path, description = "Machine ID"),
        ("pallet" = String, Path, description = "Pallet number or custom name")
    ),
    request_body = PalletMaintenanceRequest,
    responses(
        (status = 200, description = "Maintenance state changed", body = ApiResponse<MachineDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn pallet_maintenance(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((id, pallet)): Path<(String, String)>,
    ValidatedJson(body): ValidatedJson<PalletMaintenanceRequest>,
) -> MachineResult {
    let machine = scoped_machine(&state, &user, &id).await?;
    user.ensure_site_operate(&machine.site_id)
        .map_err(error_response)?;

    let key = PalletKey::from(pallet.as_str());
    let updated = if body.active.unwrap_or(true) {
        state
            .machines
            .set_pallet_maintenance(&id, key, body.notes, Some(&user.operator_id))
            .await
            .map_err(error_response)?
    } else {
        state
            .machines
            .clear_pallet_maintenance(&id, key)
            .await
            .map_err(error_response)?
    };
    Ok(Json(ApiResponse::success(
        "Pallet maintenance updated",
        MachineDto::from_domain(updated),
    )))
}

/// Controller heartbeat
#[utoipa::path(
    post,
    path = "/api/v1/machines/{id}/heartbeat",
    tag = "Machines",
    params(("id" = String, Path, description = "Machine ID")),
    request_body = HeartbeatRequest,
    responses(
        (status = 200, description = "Heartbeat recorded", body = ApiResponse<MachineDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<HeartbeatRequest>>,
) -> MachineResult {
    let firmware = body.and_then(|Json(b)| b.firmware_version);
    let machine = state
        .machines
        .update_heartbeat(&id, firmware)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Heartbeat recorded",
        MachineDto::from_domain(machine),
    )))
}

/// Machines needing attention (past-due service or pallets in maintenance)
#[utoipa::path(
    get,
    path = "/api/v1/machines/maintenance-due",
    tag = "Machines",
    responses(
        (status = 200, description = "Machines needing attention", body = ApiResponse<Vec<MachineDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn maintenance_due(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<MachineDto>>>, ApiError> {
    let mut machines = state.machines.maintenance_due().await.map_err(error_response)?;
    if !user.is_admin() {
        machines.retain(|m| user.can_access_site(&m.site_id));
    }
    let items: Vec<MachineDto> = machines.into_iter().map(MachineDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Maintenance due", items)))
}

/// Heartbeat/liveness snapshot per machine
#[utoipa::path(
    get,
    path = "/api/v1/machines/heartbeats",
    tag = "Machines",
    responses(
        (status = 200, description = "Liveness snapshots", body = ApiResponse<Vec<MachineLivenessDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn heartbeat_statuses(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<MachineLivenessDto>>>, ApiError> {
    let mut statuses = state.heartbeats.statuses(None).await.map_err(error_response)?;
    if !user.is_admin() {
        statuses.retain(|s| user.can_access_site(&s.site_id));
    }
    let items: Vec<MachineLivenessDto> = statuses
        .into_iter()
        .map(MachineLivenessDto::from_domain)
        .collect();
    Ok(Json(ApiResponse::success("Heartbeat statuses", items)))
}

/// Fleet-wide connection statistics
#[utoipa::path(
    get,
    path = "/api/v1/machines/connection-stats",
    tag = "Machines",
    responses(
        (status = 200, description = "Connection statistics", body = ApiResponse<ConnectionStatsDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn connection_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ConnectionStatsDto>>, ApiError> {
    let stats = state
        .heartbeats
        .connection_stats()
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Connection statistics",
        ConnectionStatsDto::from_domain(stats),
    )))
}
