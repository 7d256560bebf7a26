//! Booking API handlers

use axum::extract::{Path, Query, State};
use axum::{Extension, Json};

use super::{parse_booking_status, parse_payment_method, parse_vehicle_class};
use crate::api::common::ValidatedJson;
use crate::api::dto::{
    error_response, ApiError, ApiResponse, BookingDto, BookingListQuery, BookingSearchQuery,
    BookingStatsDto, BookingStatsQuery, CancelBookingRequest, CompleteBookingRequest,
    CreateBookingRequest, CreatedBookingDto, ExtendBookingRequest, PageMeta, PaginationQuery,
    UpdateBookingRequest, VerifyOtpRequest,
};
use crate::api::router::AppState;
use crate::auth::AuthenticatedUser;
use crate::domain::{Booking, Role};
use crate::services::{BookingFilters, BookingSearchFilter, CreateBookingInput, PaymentInput};
use crate::shared::types::DomainError;
use crate::shared::validations;

type BookingResult = Result<Json<ApiResponse<BookingDto>>, ApiError>;

/// Load a booking and apply read scoping for the caller.
async fn scoped_booking(
    state: &AppState,
    user: &AuthenticatedUser,
    id: &str,
) -> Result<Booking, ApiError> {
    let booking = state.bookings.get_booking(id).await.map_err(error_response)?;
    user.ensure_site_read(&booking.site_id, "booking")
        .map_err(error_response)?;
    Ok(booking)
}

/// List bookings with filters and pagination
#[utoipa::path(
    get,
    path = "/api/v1/bookings",
    tag = "Bookings",
    params(BookingListQuery, PaginationQuery),
    responses(
        (status = 200, description = "Paginated bookings", body = ApiResponse<Vec<BookingDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<BookingListQuery>,
    Query(pagination): Query<PaginationQuery>,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    if let Some(site_id) = &query.site_id {
        user.ensure_site_read(site_id, "booking")
            .map_err(error_response)?;
    }

    let status = query
        .status
        .as_deref()
        .map(parse_booking_status)
        .transpose()
        .map_err(error_response)?;

    let filters = BookingFilters {
        site_id: query.site_id,
        status,
        machine_number: query.machine_number,
        vehicle_number: query.vehicle_number,
        date_from: query.date_from,
        date_to: query.date_to,
        search: query.search,
    };
    let page = validations::validate_pagination(pagination.page, pagination.limit, 20);

    let mut result = state
        .bookings
        .list_bookings(filters, page)
        .await
        .map_err(error_response)?;
    if !user.is_admin() {
        result.items.retain(|b| user.can_access_site(&b.site_id));
    }

    let meta = PageMeta::from_result(&result);
    let items: Vec<BookingDto> = result.items.into_iter().map(BookingDto::from_domain).collect();
    Ok(Json(
        ApiResponse::success("Bookings retrieved", items).with_pagination(meta),
    ))
}

/// Create a parking session
#[utoipa::path(
    post,
    path = "/api/v1/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 200, description = "Booking created", body = ApiResponse<CreatedBookingDto>),
        (status = 422, description = "Validation failure")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<CreateBookingRequest>,
) -> Result<Json<ApiResponse<CreatedBookingDto>>, ApiError> {
    let vehicle_class = parse_vehicle_class(&body.vehicle_type).map_err(error_response)?;
    let site_id = user.default_site();
    if let Some(site_id) = &site_id {
        user.ensure_site_operate(site_id).map_err(error_response)?;
    }

    let outcome = state
        .bookings
        .create_booking(
            CreateBookingInput {
                customer_name: body.customer_name,
                phone_number: body.phone_number,
                vehicle_number: body.vehicle_number,
                vehicle_class,
                machine_number: body.machine_number,
                pallet_number: body.pallet_number,
                email: body.email,
                notes: body.notes,
                special_instructions: body.special_instructions,
            },
            Some(user.operator_id.clone()),
            site_id,
        )
        .await
        .map_err(error_response)?;

    let message = if outcome.is_new_customer {
        "Booking created; new customer registered"
    } else if outcome.customer_name_updated {
        "Booking created; customer name updated"
    } else {
        "Booking created"
    };
    Ok(Json(ApiResponse::success(
        message,
        CreatedBookingDto {
            booking: BookingDto::from_domain(outcome.booking),
            is_new_customer: outcome.is_new_customer,
            customer_name_updated: outcome.customer_name_updated,
        },
    )))
}

/// Get one booking
#[utoipa::path(
    get,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Booking details", body = ApiResponse<BookingDto>),
        (status = 404, description = "Not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> BookingResult {
    let booking = scoped_booking(&state, &user, &id).await?;
    Ok(Json(ApiResponse::success(
        "Booking retrieved",
        BookingDto::from_domain(booking),
    )))
}

/// Update notes / special instructions / vehicle class
#[utoipa::path(
    put,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = UpdateBookingRequest,
    responses(
        (status = 200, description = "Booking updated", body = ApiResponse<BookingDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<UpdateBookingRequest>,
) -> BookingResult {
    let booking = scoped_booking(&state, &user, &id).await?;
    user.ensure_site_operate(&booking.site_id)
        .map_err(error_response)?;

    let vehicle_class = body
        .vehicle_type
        .as_deref()
        .map(parse_vehicle_class)
        .transpose()
        .map_err(error_response)?;

    let updated = state
        .bookings
        .update_booking(
            &id,
            body.notes,
            body.special_instructions,
            vehicle_class,
            Some(user.operator_id.clone()),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Booking updated",
        BookingDto::from_domain(updated),
    )))
}

/// Cancel a booking (DELETE is a soft cancel)
#[utoipa::path(
    delete,
    path = "/api/v1/bookings/{id}",
    tag = "Bookings",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = CancelBookingRequest,
    responses(
        (status = 200, description = "Booking cancelled", body = ApiResponse<BookingDto>),
        (status = 400, description = "Already terminal")
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<Json<CancelBookingRequest>>,
) -> BookingResult {
    let booking = scoped_booking(&state, &user, &id).await?;
    user.ensure_site_operate(&booking.site_id)
        .map_err(error_response)?;

    let reason = body.and_then(|Json(b)| b.reason);
    let cancelled = state
        .bookings
        .cancel_booking(&id, reason, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Booking cancelled",
        BookingDto::from_domain(cancelled),
    )))
}

/// Complete a booking with payment capture
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/complete",
    tag = "Bookings",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = CompleteBookingRequest,
    responses(
        (status = 200, description = "Booking completed", body = ApiResponse<BookingDto>),
        (status = 400, description = "Not active")
    ),
    security(("bearer_auth" = []))
)]
pub async fn complete_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<CompleteBookingRequest>,
) -> BookingResult {
    let booking = scoped_booking(&state, &user, &id).await?;
    user.ensure_site_operate(&booking.site_id)
        .map_err(error_response)?;

    let payment = match (body.amount, body.payment_method.as_deref()) {
        (Some(amount), Some(method)) => Some(PaymentInput {
            amount,
            method: parse_payment_method(method).map_err(error_response)?,
            transaction_ref: body.transaction_ref,
            membership_number: body.membership_number,
        }),
        (None, None) => None,
        _ => {
            return Err(error_response(DomainError::BadRequest(
                "payment requires both amount and paymentMethod".to_string(),
            )))
        }
    };

    let completed = state
        .bookings
        .complete_booking(&id, payment, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Booking completed",
        BookingDto::from_domain(completed),
    )))
}

/// Issue a fresh retrieval OTP
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/regenerate-otp",
    tag = "Bookings",
    params(("id" = String, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "New OTP issued", body = ApiResponse<BookingDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn regenerate_otp(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> BookingResult {
    let booking = scoped_booking(&state, &user, &id).await?;
    user.ensure_site_operate(&booking.site_id)
        .map_err(error_response)?;

    let updated = state
        .bookings
        .regenerate_otp(&id, Some(user.operator_id.clone()))
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "New OTP issued",
        BookingDto::from_domain(updated),
    )))
}

/// Extend a booking (supervisor and up)
#[utoipa::path(
    post,
    path = "/api/v1/bookings/{id}/extend",
    tag = "Bookings",
    params(("id" = String, Path, description = "Booking ID")),
    request_body = ExtendBookingRequest,
    responses(
        (status = 200, description = "Booking extended", body = ApiResponse<BookingDto>),
        (status = 403, description = "Requires supervisor role")
    ),
    security(("bearer_auth" = []))
)]
pub async fn extend_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    ValidatedJson(body): ValidatedJson<ExtendBookingRequest>,
) -> BookingResult {
    if !matches!(user.role, Role::Admin | Role::Supervisor) {
        return Err(error_response(DomainError::Forbidden(
            "extensions require supervisor role".to_string(),
        )));
    }
    let booking = scoped_booking(&state, &user, &id).await?;
    user.ensure_site_operate(&booking.site_id)
        .map_err(error_response)?;

    let extended = state
        .bookings
        .extend_booking(
            &id,
            body.hours.unwrap_or(0),
            body.minutes.unwrap_or(0),
            body.reason,
            Some(user.operator_id.clone()),
        )
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Booking extended",
        BookingDto::from_domain(extended),
    )))
}

/// Redeem a retrieval OTP; the returned vehicle identity is the retrieval
/// instruction
#[utoipa::path(
    post,
    path = "/api/v1/bookings/verify-otp",
    tag = "Bookings",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "OTP accepted", body = ApiResponse<BookingDto>),
        (status = 400, description = "Invalid or expired OTP")
    ),
    security(("bearer_auth" = []))
)]
pub async fn verify_otp(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    ValidatedJson(body): ValidatedJson<VerifyOtpRequest>,
) -> BookingResult {
    let booking = state
        .bookings
        .verify_otp(&body.otp)
        .await
        .map_err(error_response)?;
    user.ensure_site_read(&booking.site_id, "booking")
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "OTP verified",
        BookingDto::from_domain(booking),
    )))
}

/// Substring search over one dimension
#[utoipa::path(
    get,
    path = "/api/v1/bookings/search",
    tag = "Bookings",
    params(BookingSearchQuery),
    responses(
        (status = 200, description = "Matches (max 50)", body = ApiResponse<Vec<BookingDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn search_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<BookingSearchQuery>,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    let filter = query
        .filter
        .as_deref()
        .map(BookingSearchFilter::from_str)
        .unwrap_or(BookingSearchFilter::All);
    let mut matches = state
        .bookings
        .search_bookings(&query.q, filter)
        .await
        .map_err(error_response)?;
    if !user.is_admin() {
        matches.retain(|b| user.can_access_site(&b.site_id));
    }
    let items: Vec<BookingDto> = matches.into_iter().map(BookingDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Search results", items)))
}

/// All currently active bookings
#[utoipa::path(
    get,
    path = "/api/v1/bookings/active",
    tag = "Bookings",
    responses(
        (status = 200, description = "Active bookings", body = ApiResponse<Vec<BookingDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn active_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    let mut bookings = state.bookings.active_bookings().await.map_err(error_response)?;
    if !user.is_admin() {
        bookings.retain(|b| user.can_access_site(&b.site_id));
    }
    let items: Vec<BookingDto> = bookings.into_iter().map(BookingDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Active bookings", items)))
}

/// Totals by status plus completed revenue
#[utoipa::path(
    get,
    path = "/api/v1/bookings/stats",
    tag = "Bookings",
    params(BookingStatsQuery),
    responses(
        (status = 200, description = "Booking statistics", body = ApiResponse<BookingStatsDto>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn booking_stats(
    State(state): State<AppState>,
    Query(query): Query<BookingStatsQuery>,
) -> Result<Json<ApiResponse<BookingStatsDto>>, ApiError> {
    let stats = state
        .bookings
        .booking_stats(query.date_from, query.date_to)
        .await
        .map_err(error_response)?;
    Ok(Json(ApiResponse::success(
        "Booking statistics",
        BookingStatsDto::from_stats(stats),
    )))
}

/// Bookings recorded against one machine code
#[utoipa::path(
    get,
    path = "/api/v1/bookings/machine/{machine_number}",
    tag = "Bookings",
    params(
        ("machine_number" = String, Path, description = "Machine code, e.g. M001"),
        ("status" = Option<String>, Query, description = "Optional status filter")
    ),
    responses(
        (status = 200, description = "Bookings for the machine", body = ApiResponse<Vec<BookingDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn bookings_by_machine(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(machine_number): Path<String>,
    Query(query): Query<std::collections::HashMap<String, String>>,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    let status = query
        .get("status")
        .map(|s| parse_booking_status(s))
        .transpose()
        .map_err(error_response)?;
    let mut bookings = state
        .bookings
        .bookings_by_machine(&machine_number, status)
        .await
        .map_err(error_response)?;
    if !user.is_admin() {
        bookings.retain(|b| user.can_access_site(&b.site_id));
    }
    let items: Vec<BookingDto> = bookings.into_iter().map(BookingDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Bookings for machine", items)))
}

/// Booking history for one plate
#[utoipa::path(
    get,
    path = "/api/v1/bookings/vehicle/{vehicle_number}",
    tag = "Bookings",
    params(("vehicle_number" = String, Path, description = "Vehicle plate")),
    responses(
        (status = 200, description = "Bookings for the vehicle", body = ApiResponse<Vec<BookingDto>>)
    ),
    security(("bearer_auth" = []))
)]
pub async fn bookings_by_vehicle(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(vehicle_number): Path<String>,
) -> Result<Json<ApiResponse<Vec<BookingDto>>>, ApiError> {
    let mut bookings = state
        .bookings
        .bookings_by_vehicle(&vehicle_number)
        .await
        .map_err(error_response)?;
    if !user.is_admin() {
        bookings.retain(|b| user.can_access_site(&b.site_id));
    }
    let items: Vec<BookingDto> = bookings.into_iter().map(BookingDto::from_domain).collect();
    Ok(Json(ApiResponse::success("Bookings for vehicle", items)))
}
