//! HTTP handlers

pub mod bookings;
pub mod customers;
pub mod health;
pub mod machines;
pub mod public;
pub mod sites;

use crate::api::dto::{error_response, ApiError};
use crate::auth::AuthenticatedUser;
use crate::domain::{
    BookingStatus, MachineKind, MachineStatus, MembershipPlan, PaymentMethod, SiteRole,
    SiteStatus, VehicleClass,
};
use crate::shared::types::{DomainError, DomainResult};

/// Guard for the few operations reserved to the global admin role (site
/// creation and permanent deletion, machine registry changes).
pub(crate) fn require_admin(user: &AuthenticatedUser) -> Result<(), ApiError> {
    if user.is_admin() {
        Ok(())
    } else {
        Err(error_response(DomainError::Forbidden(
            "administrator role required".to_string(),
        )))
    }
}

// String-to-enum parsing for request fields. Each failure names the field so
// the envelope can point at it.

pub(crate) fn parse_vehicle_class(s: &str) -> DomainResult<VehicleClass> {
    VehicleClass::from_str(s).ok_or_else(|| {
        DomainError::validation("vehicleType", "must be two-wheeler or four-wheeler")
    })
}

pub(crate) fn parse_machine_kind(s: &str) -> DomainResult<MachineKind> {
    MachineKind::from_str(s)
        .ok_or_else(|| DomainError::validation("machineType", "must be rotary or puzzle"))
}

pub(crate) fn parse_machine_status(s: &str) -> DomainResult<MachineStatus> {
    match s {
        "online" => Ok(MachineStatus::Online),
        "offline" => Ok(MachineStatus::Offline),
        "maintenance" => Ok(MachineStatus::Maintenance),
        "error" => Ok(MachineStatus::Error),
        _ => Err(DomainError::validation(
            "status",
            "must be online, offline, maintenance or error",
        )),
    }
}

pub(crate) fn parse_booking_status(s: &str) -> DomainResult<BookingStatus> {
    BookingStatus::from_str(s).ok_or_else(|| {
        DomainError::validation(
            "status",
            "must be active, completed, cancelled or expired",
        )
    })
}

pub(crate) fn parse_site_status(s: &str) -> DomainResult<SiteStatus> {
    match s {
        "active" => Ok(SiteStatus::Active),
        "inactive" => Ok(SiteStatus::Inactive),
        "maintenance" => Ok(SiteStatus::Maintenance),
        "under-construction" => Ok(SiteStatus::UnderConstruction),
        _ => Err(DomainError::validation(
            "status",
            "must be active, inactive, maintenance or under-construction",
        )),
    }
}

pub(crate) fn parse_site_role(s: &str) -> DomainResult<SiteRole> {
    match s {
        "site-admin" => Ok(SiteRole::SiteAdmin),
        "supervisor" => Ok(SiteRole::Supervisor),
        "operator" => Ok(SiteRole::Operator),
        _ => Err(DomainError::validation(
            "siteRole",
            "must be site-admin, supervisor or operator",
        )),
    }
}

pub(crate) fn parse_membership_plan(s: &str) -> DomainResult<MembershipPlan> {
    MembershipPlan::from_str(s).ok_or_else(|| {
        DomainError::validation(
            "membershipType",
            "must be monthly, quarterly, yearly or premium",
        )
    })
}

pub(crate) fn parse_payment_method(s: &str) -> DomainResult<PaymentMethod> {
    PaymentMethod::from_str(s).ok_or_else(|| {
        DomainError::validation(
            "paymentMethod",
            "must be cash, card, upi or membership",
        )
    })
}

pub(crate) fn parse_vehicle_classes(values: &[String]) -> DomainResult<Vec<VehicleClass>> {
    values.iter().map(|v| parse_vehicle_class(v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_parsing_round_trips() {
        assert_eq!(
            parse_vehicle_class("two-wheeler").unwrap(),
            VehicleClass::TwoWheeler
        );
        assert!(parse_vehicle_class("three-wheeler").is_err());
        assert_eq!(parse_machine_kind("puzzle").unwrap(), MachineKind::Puzzle);
        assert!(parse_machine_kind("stacker").is_err());
        assert_eq!(
            parse_booking_status("cancelled").unwrap(),
            BookingStatus::Cancelled
        );
        assert_eq!(parse_site_role("site-admin").unwrap(), SiteRole::SiteAdmin);
        assert_eq!(
            parse_membership_plan("premium").unwrap(),
            MembershipPlan::Premium
        );
        assert_eq!(parse_payment_method("upi").unwrap(), PaymentMethod::Upi);
    }
}
