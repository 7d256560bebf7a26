//! Site API handlers
//!
//! Site creation and permanent deletion are reserved to the global admin
//! role. Everything else follows the site-scoping rule: reads need the site
//! among the caller's assignments, mutations need a managing site role
//! (site-admin or supervisor) there.

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::{parse_site_role, parse_site_status, require_admin};
use crate::api::common::ValidatedJson;
use crate::api::dto::{
    error_response, ApiError, ApiResponse, AssignUserRequest, CreateSiteRequest, DeleteSiteQuery,
    SiteDto, SiteStatisticsDto, SiteUserDto, UpdateSiteRequest,
};
use crate::api::router::AppState;
use crate::auth::AuthenticatedUser;
use crate::services::{CreateSiteInput, UpdateSiteInput};

/// List sites visible to the caller
#[utoipa::path(
    get,
    path = "/api/v1/sites",
    tag = "Sites",
    responses(
        (status = 200, description = "Sites", body = ApiResponse<Vec<SiteDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_sites(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<SiteDto>>>, ApiError> {
    let mut sites = state.sites.list_sites().await.map_err(error_response)?;
    if !user.is_admin() {
        sites.retain(|s| user.can_access_site(&s.id));
    }
    sites.sort_by(|a, b| a.code.cmp(&b.code));
    let items: Vec<SiteDto> = sites.into_iter().map(SiteDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Sites retrieved", items)))
}

/// Create a site (admin)
#[utoipa::path(
    post,
    path = "/api/v1/sites",
    tag = "Sites",
    request_body = CreateSiteRequest,
    responses(
        (status = 200, description = "Site created", body = ApiResponse<SiteDto>),
        (status = 403, description = "Requires administrator role"),
        (status = 409, description = "Site code already used")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_site(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<CreateSiteRequest>,
) -> Result<Json<ApiResponse<SiteDto>>, ApiError> {
    require_admin(&user)?;
    let site = state
        .sites
        .create_site(
            CreateSiteInput {
                code: body.site_code,
                name: body.name,
                address: body.address.into_domain(),
                location: body.location,
                operating_hours: body.operating_hours,
                pricing: body.pricing,
                declared_machine_count: body.total_machines.unwrap_or(0),
                declared_capacity: body.total_capacity.unwrap_or(0),
            },
            Some(user.operator_id.clone()),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Site created",
        SiteDto::from_domain(site),
    )))
}

/// Get one site
#[utoipa::path(
    get,
    path = "/api/v1/sites/{id}",
    tag = "Sites",
    params(("id" = String, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site details", body = ApiResponse<SiteDto>),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_site(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SiteDto>>, ApiError> {
    let site = state.sites.get_site(&id).await.map_err(error_response)?;
    user.ensure_site_read(&site.id, "site").map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Site retrieved",
        SiteDto::from_domain(site),
    )))
}

/// Update a site; status "inactive" routes through deactivation rules.
/// Open to admins and the site's own managing roles.
#[utoipa::path(
    put,
    path = "/api/v1/sites/{id}",
    tag = "Sites",
    params(("id" = String, Path, description = "Site ID")),
    request_body = UpdateSiteRequest,
    responses(
        (status = 200, description = "Site updated", body = ApiResponse<SiteDto>),
        (status = 400, description = "Active bookings block deactivation"),
        (status = 403, description = "No managing role at this site")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_site(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateSiteRequest>,
) -> Result<Json<ApiResponse<SiteDto>>, ApiError> {
    user.ensure_site_read(&id, "site").map_err(error_response)?;
    user.ensure_site_manage(&id).map_err(error_response)?;

    let status = body
        .status
        .as_deref()
        .map(parse_site_status)
        .transpose()
        .map_err(error_response)?;

    // Deactivation has its own preconditions (no active bookings, machines
    // forced offline); everything else is a plain field update.
    let wants_deactivation = status == Some(crate::domain::SiteStatus::Inactive);

    let mut site = state
        .sites
        .update_site(
            &id,
            UpdateSiteInput {
                name: body.name,
                address: body.address.map(|a| a.into_domain()),
                location: body.location,
                operating_hours: body.operating_hours,
                pricing: body.pricing,
                declared_machine_count: body.total_machines,
                declared_capacity: body.total_capacity,
                status: status.filter(|_| !wants_deactivation),
            },
        )
        .await
        .map_err(error_response)?;
    if wants_deactivation {
        site = state.sites.deactivate_site(&id).await.map_err(error_response)?;
    }
    Ok(Json(ApiResponse::success(
        "Site updated",
        SiteDto::from_domain(site),
    )))
}

/// Permanently delete a site; `force=true` drops machines and bookings
/// (admin)
#[utoipa::path(
    delete,
    path = "/api/v1/sites/{id}",
    tag = "Sites",
    params(
        ("id" = String, Path, description = "Site ID"),
        DeleteSiteQuery
    ),
    responses(
        (status = 200, description = "Site deleted", body = ApiResponse<String>),
        (status = 400, description = "Site not empty and force not set"),
        (status = 403, description = "Requires administrator role")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_site(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    Query(query): Query<DeleteSiteQuery>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    require_admin(&user)?;
    state
        .sites
        .delete_site_permanently(&id, query.force.unwrap_or(false))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success("Site deleted", id)))
}

/// On-demand statistics for one site
#[utoipa::path(
    get,
    path = "/api/v1/sites/{id}/statistics",
    tag = "Sites",
    params(("id" = String, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Site statistics", body = ApiResponse<SiteStatisticsDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn site_statistics(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SiteStatisticsDto>>, ApiError> {
    user.ensure_site_read(&id, "site").map_err(error_response)?;
    let stats = state.sites.site_statistics(&id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Site statistics",
        SiteStatisticsDto::from_domain(stats),
    )))
}

/// Users assigned to the site; visible to its managers
#[utoipa::path(
    get,
    path = "/api/v1/sites/{id}/users",
    tag = "Sites",
    params(("id" = String, Path, description = "Site ID")),
    responses(
        (status = 200, description = "Assigned users", body = ApiResponse<Vec<SiteUserDto>>),
        (status = 403, description = "No managing role at this site")
    ),
    security(("bearer_auth" = []))
)]
pub async fn site_users(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<SiteUserDto>>>, ApiError> {
    user.ensure_site_read(&id, "site").map_err(error_response)?;
    user.ensure_site_manage(&id).map_err(error_response)?;
    let users = state.sites.site_users(&id).await.map_err(error_response)?;
    let items: Vec<SiteUserDto> = users.iter().map(|u| SiteUserDto::from_domain(u, &id)).collect();
    Ok(Json(ApiResponse::success("Site users", items)))
}

/// Assign (or re-assign) a user to the site; open to its managers
#[utoipa::path(
    post,
    path = "/api/v1/sites/{id}/assign-user",
    tag = "Sites",
    params(("id" = String, Path, description = "Site ID")),
    request_body = AssignUserRequest,
    responses(
        (status = 200, description = "User assigned", body = ApiResponse<String>),
        (status = 403, description = "No managing role at this site"),
        (status = 404, description = "Site or user not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<AssignUserRequest>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    user.ensure_site_read(&id, "site").map_err(error_response)?;
    user.ensure_site_manage(&id).map_err(error_response)?;
    let role = parse_site_role(&body.site_role).map_err(error_response)?;
    state
        .sites
        .assign_user(&id, &body.user_id, role, body.permissions.unwrap_or_default())
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success("User assigned", body.user_id)))
}
