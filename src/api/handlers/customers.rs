//! Customer API handlers

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::{parse_membership_plan, parse_payment_method, parse_vehicle_class, parse_vehicle_classes};
use crate::api::common::ValidatedJson;
use crate::api::dto::{
    error_response, ApiError, ApiResponse, CreateCustomerRequest, CreateMembershipRequest,
    CustomerDto, CustomerSearchQuery, DeleteCustomerRequest, MembershipPaymentDto, PageMeta,
    PaginationQuery, ValidateMembershipRequest, VehicleRequest,
};
use crate::api::router::AppState;
use crate::auth::AuthenticatedUser;
use crate::services::{CreateCustomerInput, CustomerSearchKind, MembershipPaymentInput, VehicleInput};
use crate::shared::types::PaginatedResult;
use crate::shared::validations;

fn vehicle_input(request: VehicleRequest) -> Result<VehicleInput, ApiError> {
    Ok(VehicleInput {
        class: parse_vehicle_class(&request.vehicle_type).map_err(error_response)?,
        plate: request.vehicle_number,
        make: request.make,
        model: request.model,
        color: request.color,
    })
}

/// List customers (paginated)
#[utoipa::path(
    get,
    path = "/api/v1/customers",
    tag = "Customers",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Paginated customers", body = ApiResponse<Vec<CustomerDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_customers(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<CustomerDto>>>, ApiError> {
    let page = validations::validate_pagination(pagination.page, pagination.limit, 10);
    let mut customers = state.customers.list_customers().await.map_err(error_response)?;
    customers.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let result = PaginatedResult::paginate(customers, page);
    let meta = PageMeta::from_result(&result);
    let items: Vec<CustomerDto> = result
        .items
        .into_iter()
        .map(CustomerDto::from_domain)
        .collect();
    Ok(Json(
        ApiResponse::success("Customers retrieved", items).with_pagination(meta),
    ))
}

/// Register a customer
#[utoipa::path(
    post,
    path = "/api/v1/customers",
    tag = "Customers",
    request_body = CreateCustomerRequest,
    responses(
        (status = 200, description = "Customer created", body = ApiResponse<CustomerDto>),
        (status = 409, description = "Phone already registered")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<CreateCustomerRequest>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let mut vehicles = Vec::new();
    for request in body.vehicles.unwrap_or_default() {
        vehicles.push(vehicle_input(request)?);
    }

    let customer = state
        .customers
        .create_customer(
            CreateCustomerInput {
                first_name: body.first_name,
                last_name: body.last_name.unwrap_or_default(),
                phone: body.phone,
                email: body.email,
                vehicles,
            },
            Some(user.operator_id.clone()),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Customer created",
        CustomerDto::from_domain(customer),
    )))
}

/// Search customers by phone, name or vehicle
#[utoipa::path(
    get,
    path = "/api/v1/customers/search",
    tag = "Customers",
    params(CustomerSearchQuery),
    responses(
        (status = 200, description = "Matches (max 50)", body = ApiResponse<Vec<CustomerDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_customers(
    State(state): State<AppState>,
    Query(query): Query<CustomerSearchQuery>,
) -> Result<Json<ApiResponse<Vec<CustomerDto>>>, ApiError> {
    let kind = query
        .search_type
        .as_deref()
        .map(CustomerSearchKind::from_str)
        .unwrap_or(CustomerSearchKind::All);
    let customers = state
        .customers
        .search_customers(&query.q, kind)
        .await
        .map_err(error_response)?;
    let items: Vec<CustomerDto> = customers.into_iter().map(CustomerDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Search results", items)))
}

/// Get one customer
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Customer details", body = ApiResponse<CustomerDto>),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let customer = state.customers.get_customer(&id).await.map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Customer retrieved",
        CustomerDto::from_domain(customer),
    )))
}

/// Soft-delete a customer
#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    request_body = DeleteCustomerRequest,
    responses(
        (status = 200, description = "Customer deactivated", body = ApiResponse<CustomerDto>),
        (status = 400, description = "Customer has active bookings")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_customer(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<Json<DeleteCustomerRequest>>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let reason = body.and_then(|Json(b)| b.reason);
    let customer = state
        .customers
        .soft_delete_customer(&id, reason, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Customer deactivated",
        CustomerDto::from_domain(customer),
    )))
}

/// Attach a vehicle
#[utoipa::path(
    post,
    path = "/api/v1/customers/{id}/vehicles",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    request_body = VehicleRequest,
    responses(
        (status = 200, description = "Vehicle added", body = ApiResponse<CustomerDto>),
        (status = 409, description = "Plate already registered")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_vehicle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<VehicleRequest>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let input = vehicle_input(body)?;
    let customer = state
        .customers
        .add_vehicle(&id, input, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Vehicle added",
        CustomerDto::from_domain(customer),
    )))
}

/// Soft-delete a vehicle
#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}/vehicles/{vehicle_id}",
    tag = "Customers",
    params(
        ("id" = String, Path, description = "Customer ID"),
        ("vehicle_id" = String, Path, description = "Vehicle ID")
    ),
    responses(
        (status = 200, description = "Vehicle removed", body = ApiResponse<CustomerDto>),
        (status = 400, description = "Vehicle has an active booking")
    ),
    security(("bearer_auth" = []))
)]
pub async fn remove_vehicle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path((id, vehicle_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let customer = state
        .customers
        .remove_vehicle(&id, &vehicle_id, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Vehicle removed",
        CustomerDto::from_domain(customer),
    )))
}

/// Issue or extend the customer's membership
#[utoipa::path(
    post,
    path = "/api/v1/customers/{id}/membership",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    request_body = CreateMembershipRequest,
    responses(
        (status = 200, description = "Membership issued or extended", body = ApiResponse<CustomerDto>),
        (status = 409, description = "Coverage already present")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_membership(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<CreateMembershipRequest>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let plan = parse_membership_plan(&body.membership_type).map_err(error_response)?;
    let covered = parse_vehicle_classes(&body.covered_vehicle_types).map_err(error_response)?;
    let method = parse_payment_method(&body.payment_method).map_err(error_response)?;

    let customer = state
        .customers
        .create_membership(
            &id,
            plan,
            body.validity_term_months,
            covered,
            MembershipPaymentInput {
                amount: body.amount,
                method,
                transaction_ref: body.transaction_ref,
            },
            Some(user.operator_id.clone()),
        )
        .await
        .map_err(error_response)?;
    // The fresh PIN is disclosed exactly once, on this response.
    Ok(Json(ApiResponse::success(
        "Membership processed",
        CustomerDto::from_domain_with_pin(customer),
    )))
}

/// Deactivate the membership; ledger rows stay
#[utoipa::path(
    delete,
    path = "/api/v1/customers/{id}/membership",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Membership deactivated", body = ApiResponse<CustomerDto>),
        (status = 404, description = "No membership")
    ),
    security(("bearer_auth" = []))
)]
pub async fn deactivate_membership(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let customer = state
        .customers
        .deactivate_membership(&id, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Membership deactivated",
        CustomerDto::from_domain(customer),
    )))
}

/// Membership payment ledger for one customer
#[utoipa::path(
    get,
    path = "/api/v1/customers/{id}/memberships",
    tag = "Customers",
    params(("id" = String, Path, description = "Customer ID")),
    responses(
        (status = 200, description = "Ledger rows", body = ApiResponse<Vec<MembershipPaymentDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn membership_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<MembershipPaymentDto>>>, ApiError> {
    // 404 on unknown customer, not an empty list.
    state.customers.get_customer(&id).await.map_err(error_response)?;
    let rows = state
        .customers
        .membership_payments(&id)
        .await
        .map_err(error_response)?;
    let items: Vec<MembershipPaymentDto> = rows
        .into_iter()
        .map(MembershipPaymentDto::from_domain)
        .collect();
    Ok(Json(ApiResponse::success("Membership history", items)))
}

/// Check a membership credential tuple
#[utoipa::path(
    post,
    path = "/api/v1/customers/validate-membership",
    tag = "Customers",
    request_body = ValidateMembershipRequest,
    responses(
        (status = 200, description = "Credential valid", body = ApiResponse<CustomerDto>),
        (status = 400, description = "Credential invalid")
    ),
    security(("bearer_auth" = []))
)]
pub async fn validate_membership(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<ValidateMembershipRequest>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let for_class = body
        .vehicle_type
        .as_deref()
        .map(parse_vehicle_class)
        .transpose()
        .map_err(error_response)?;

    let result = state
        .customers
        .validate_membership(&body.membership_number, &body.pin, for_class)
        .await
        .map_err(error_response)?;
    match result {
        Some(customer) => Ok(Json(ApiResponse::success(
            "Membership valid",
            CustomerDto::from_domain(customer),
        ))),
        // Deliberately vague: never reveal which factor failed.
        None => Err(error_response(crate::shared::types::DomainError::BadRequest(
            "invalid membership credentials".to_string(),
        ))),
    }
}
