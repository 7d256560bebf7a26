//! Public (unauthenticated) membership endpoints
//!
//! Customer-facing purchase and validation. No actor audit on these paths;
//! ledger rows record a null creator.

use axum::extract::State;
use axum::Json;

use super::{parse_membership_plan, parse_payment_method, parse_vehicle_class, parse_vehicle_classes};
use crate::api::common::ValidatedJson;
use crate::api::dto::{
    error_response, ApiError, ApiResponse, CustomerDto, PublicMembershipPurchaseRequest,
    ValidateMembershipRequest,
};
use crate::api::router::AppState;
use crate::services::{CreateCustomerInput, MembershipPaymentInput};
use crate::shared::types::DomainError;

/// Self-service membership purchase; registers the customer when the phone
/// is unknown
#[utoipa::path(
    post,
    path = "/api/v1/public/membership/purchase",
    tag = "Public",
    request_body = PublicMembershipPurchaseRequest,
    responses(
        (status = 200, description = "Membership issued", body = ApiResponse<CustomerDto>),
        (status = 409, description = "Coverage already present")
    )
)]
pub async fn purchase_membership(
    State(state): State<AppState>,
    ValidatedJson(body): ValidatedJson<PublicMembershipPurchaseRequest>,
) -> Result<Json<ApiResponse<CustomerDto>>, ApiError> {
    let plan = parse_membership_plan(&body.membership_type).map_err(error_response)?;
    let covered = parse_vehicle_classes(&body.covered_vehicle_types).map_err(error_response)?;
    let method = parse_payment_method(&body.payment_method).map_err(error_response)?;

    let customer = match state
        .customers
        .find_by_phone(&body.phone)
        .await
        .map_err(error_response)?
    {
        Some(existing) => existing,
        None => {
            let mut parts = body.customer_name.trim().splitn(2, ' ');
            let first = parts.next().unwrap_or_default().to_string();
            let last = parts.next().unwrap_or_default().to_string();
            state
                .customers
                .create_customer(
                    CreateCustomerInput {
                        first_name: first,
                        last_name: last,
                        phone: body.phone.clone(),
                        email: body.email.clone(),
                        vehicles: vec![],
                    },
                    None,
                )
                .await
                .map_err(error_response)?
        }
    };

    let customer = state
        .customers
        .create_membership(
            &customer.id,
            plan,
            body.validity_term_months,
            covered,
            MembershipPaymentInput {
                amount: body.amount,
                method,
                transaction_ref: body.transaction_ref,
            },
            None,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(ApiResponse::success(
        "Membership issued",
        CustomerDto::from_domain_with_pin(customer),
    )))
}

/// Self-service credential check
#[utoipa::path(
    post,
    path = "/api/v1/public/membership/validate",
    tag = "Public",
    request_body = ValidateMembershipRequest,
    responses(
        (status = 200, description = "Credential valid", body = ApiResponse<CustomerDto>),
        (status = 400, description = "Credential invalid")
    )
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
        None => Err(error_response(DomainError::BadRequest(
            "invalid membership credentials".to_string(),
        ))),
    }
}
