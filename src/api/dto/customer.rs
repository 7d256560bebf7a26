//! Customer and membership DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{Customer, Membership, MembershipPayment, Vehicle};

/// Customer API representation. The membership PIN only appears on
/// issuance responses, never on reads.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDto {
    pub id: String,
    pub customer_code: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub vehicles: Vec<VehicleDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub membership: Option<MembershipDto>,
    pub total_bookings: u64,
    pub total_amount: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_booking_at: Option<DateTime<Utc>>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleDto {
    pub id: String,
    pub vehicle_number: String,
    pub vehicle_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipDto {
    pub membership_number: String,
    /// Present only on issuance responses
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pin: Option<String>,
    pub membership_type: String,
    pub covered_vehicle_types: Vec<String>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validity_term_months: u32,
    pub is_active: bool,
    /// Derived on read
    pub is_expired: bool,
}

impl CustomerDto {
    pub fn from_domain(customer: Customer) -> Self {
        Self::build(customer, false)
    }

    /// Issuance response variant that discloses the fresh PIN.
    pub fn from_domain_with_pin(customer: Customer) -> Self {
        Self::build(customer, true)
    }

    fn build(customer: Customer, include_pin: bool) -> Self {
        Self {
            membership: customer
                .membership
                .as_ref()
                .map(|m| MembershipDto::from_domain(m, include_pin)),
            vehicles: customer
                .vehicles
                .iter()
                .map(VehicleDto::from_domain)
                .collect(),
            id: customer.id,
            customer_code: customer.code,
            first_name: customer.first_name,
            last_name: customer.last_name,
            phone: customer.phone,
            email: customer.email,
            total_bookings: customer.total_bookings,
            total_amount: customer.total_amount,
            last_booking_at: customer.last_booking_at,
            status: format!("{:?}", customer.status).to_lowercase(),
            created_at: customer.created_at,
        }
    }
}

impl VehicleDto {
    fn from_domain(vehicle: &Vehicle) -> Self {
        Self {
            id: vehicle.id.clone(),
            vehicle_number: vehicle.plate.clone(),
            vehicle_type: vehicle.class.as_str().to_string(),
            make: vehicle.make.clone(),
            model: vehicle.model.clone(),
            color: vehicle.color.clone(),
            is_active: vehicle.is_active,
        }
    }
}

impl MembershipDto {
    fn from_domain(membership: &Membership, include_pin: bool) -> Self {
        Self {
            membership_number: membership.number.clone(),
            pin: include_pin.then(|| membership.pin.clone()),
            membership_type: membership.plan.as_str().to_string(),
            covered_vehicle_types: membership
                .covered_classes
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            issued_at: membership.issued_at,
            expires_at: membership.expires_at,
            validity_term_months: membership.validity_term_months,
            is_active: membership.is_active,
            is_expired: membership.expires_at <= Utc::now(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MembershipPaymentDto {
    pub id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub membership_number: String,
    pub membership_type: String,
    pub amount: f64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    pub start_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl MembershipPaymentDto {
    pub fn from_domain(payment: MembershipPayment) -> Self {
        Self {
            id: payment.id,
            customer_name: payment.customer_name,
            customer_phone: payment.customer_phone,
            membership_number: payment.membership_number,
            membership_type: payment.plan.as_str().to_string(),
            amount: payment.amount,
            method: payment.method.as_str().to_string(),
            transaction_ref: payment.transaction_ref,
            start_date: payment.start_date,
            expiry_date: payment.expiry_date,
            status: format!("{:?}", payment.status).to_lowercase(),
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct VehicleRequest {
    #[validate(length(min = 4, max = 15))]
    pub vehicle_number: String,
    /// "two-wheeler" | "four-wheeler"
    pub vehicle_type: String,
    #[validate(length(max = 50))]
    pub make: Option<String>,
    #[validate(length(max = 50))]
    pub model: Option<String>,
    #[validate(length(max = 30))]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(max = 100))]
    pub last_name: Option<String>,
    #[validate(length(min = 10, max = 10))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(nested)]
    pub vehicles: Option<Vec<VehicleRequest>>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct CustomerSearchQuery {
    pub q: String,
    /// "phone" | "name" | "vehicle" | "all"
    #[serde(rename = "type")]
    pub search_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteCustomerRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMembershipRequest {
    /// "monthly" | "quarterly" | "yearly" | "premium"
    pub membership_type: String,
    #[validate(range(min = 1, max = 60))]
    pub validity_term_months: Option<u32>,
    /// Subset of {"two-wheeler", "four-wheeler"}
    #[validate(length(min = 1))]
    pub covered_vehicle_types: Vec<String>,
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    /// "cash" | "card" | "upi"
    pub payment_method: String,
    pub transaction_ref: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateMembershipRequest {
    #[validate(length(min = 6, max = 6))]
    pub membership_number: String,
    #[validate(length(min = 4, max = 4))]
    pub pin: String,
    /// Optional class the credential must cover
    pub vehicle_type: Option<String>,
}

/// Unauthenticated purchase payload for the public endpoint
#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PublicMembershipPurchaseRequest {
    #[validate(length(min = 1, max = 100))]
    pub customer_name: String,
    #[validate(length(min = 10, max = 10))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    pub membership_type: String,
    #[validate(range(min = 1, max = 60))]
    pub validity_term_months: Option<u32>,
    #[validate(length(min = 1))]
    pub covered_vehicle_types: Vec<String>,
    #[validate(range(min = 0.0))]
    pub amount: Option<f64>,
    pub payment_method: String,
    pub transaction_ref: Option<String>,
}
