//! Booking DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{Booking, BookingPayment, DurationParts, OtpBlock};
use crate::services::BookingStats;

/// Booking API representation
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingDto {
    pub id: String,
    pub booking_number: String,
    pub customer_id: String,
    pub customer_name: String,
    pub phone_number: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    pub machine_number: String,
    pub pallet_number: u32,
    pub status: String,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub duration: DurationDto,
    pub otp: OtpDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
    pub site_id: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DurationDto {
    pub hours: i64,
    pub minutes: i64,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtpDto {
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDto {
    pub amount: f64,
    pub method: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership_number: Option<String>,
}

impl BookingDto {
    pub fn from_domain(booking: Booking) -> Self {
        let duration = booking.duration(Utc::now());
        Self {
            duration: DurationDto::from_parts(duration),
            otp: OtpDto::from_block(&booking.otp),
            payment: booking.payment.as_ref().map(PaymentDto::from_domain),
            id: booking.id,
            booking_number: booking.number,
            customer_id: booking.customer_id,
            customer_name: booking.customer_name,
            phone_number: booking.phone_number,
            vehicle_number: booking.vehicle_number,
            vehicle_type: booking.vehicle_class.as_str().to_string(),
            machine_number: booking.machine_number,
            pallet_number: booking.pallet_number,
            status: booking.status.as_str().to_string(),
            start_time: booking.start_time,
            end_time: booking.end_time,
            notes: booking.notes,
            special_instructions: booking.special_instructions,
            site_id: booking.site_id,
        }
    }
}

impl DurationDto {
    fn from_parts(parts: DurationParts) -> Self {
        Self {
            hours: parts.hours,
            minutes: parts.minutes,
        }
    }
}

impl OtpDto {
    fn from_block(otp: &OtpBlock) -> Self {
        Self {
            code: otp.code.clone(),
            expires_at: otp.expires_at,
            is_used: otp.is_used,
        }
    }
}

impl PaymentDto {
    fn from_domain(payment: &BookingPayment) -> Self {
        Self {
            amount: payment.amount,
            method: payment.method.as_str().to_string(),
            status: format!("{:?}", payment.status).to_lowercase(),
            transaction_ref: payment.transaction_ref.clone(),
            paid_at: payment.paid_at,
            membership_number: payment.membership_number.clone(),
        }
    }
}

/// Creation payload
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[validate(length(min = 1, max = 100))]
    pub customer_name: String,
    #[validate(length(min = 10, max = 10))]
    pub phone_number: String,
    #[validate(length(min = 4, max = 15))]
    pub vehicle_number: String,
    /// "two-wheeler" | "four-wheeler"
    pub vehicle_type: String,
    #[validate(length(min = 4, max = 4))]
    pub machine_number: String,
    pub pallet_number: i64,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 1000))]
    pub special_instructions: Option<String>,
}

/// Free-text / classification updates on an active booking
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBookingRequest {
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
    #[validate(length(max = 1000))]
    pub special_instructions: Option<String>,
    pub vehicle_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBookingRequest {
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    /// "cash" | "card" | "upi" | "membership"
    pub payment_method: Option<String>,
    pub transaction_ref: Option<String>,
    pub membership_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CancelBookingRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ExtendBookingRequest {
    #[validate(range(min = 0, max = 72))]
    pub hours: Option<i64>,
    #[validate(range(min = 0, max = 59))]
    pub minutes: Option<i64>,
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct VerifyOtpRequest {
    #[validate(length(min = 6, max = 6))]
    pub otp: String,
}

/// Listing filters
#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BookingListQuery {
    pub site_id: Option<String>,
    /// "active" | "completed" | "cancelled" | "expired"
    pub status: Option<String>,
    pub machine_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct BookingSearchQuery {
    pub q: String,
    /// "vehicle" | "pallet" | "otp" | "customer" | "phone" | "all"
    pub filter: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatsQuery {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatsDto {
    pub total: u64,
    pub active: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub expired: u64,
    pub revenue: f64,
}

impl BookingStatsDto {
    pub fn from_stats(stats: BookingStats) -> Self {
        Self {
            total: stats.total,
            active: stats.active,
            completed: stats.completed,
            cancelled: stats.cancelled,
            expired: stats.expired,
            revenue: stats.revenue,
        }
    }
}

/// Creation response: the booking plus the flags the UI message depends on
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreatedBookingDto {
    pub booking: BookingDto,
    pub is_new_customer: bool,
    pub customer_name_updated: bool,
}
