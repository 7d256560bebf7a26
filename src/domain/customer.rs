//! Customer domain entity
//!
//! A customer is identified by phone number and owns an embedded vehicle
//! list plus at most one customer-level membership block. Membership expiry
//! is derived on read, never stored.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

use super::booking::{PaymentMethod, PaymentStatus};
use super::machine::VehicleClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomerStatus {
    Active,
    Inactive,
    Blocked,
}

/// Vehicle embedded in a customer record, addressed by its embedded id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    /// Normalized uppercase plate
    pub plate: String,
    pub class: VehicleClass,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub is_active: bool,
    pub added_at: DateTime<Utc>,
    pub added_by: Option<String>,
    pub removed_at: Option<DateTime<Utc>>,
}

impl Vehicle {
    pub fn new(
        id: impl Into<String>,
        plate: impl Into<String>,
        class: VehicleClass,
        added_by: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            plate: plate.into(),
            class,
            make: None,
            model: None,
            color: None,
            is_active: true,
            added_at: Utc::now(),
            added_by,
            removed_at: None,
        }
    }
}

/// Membership plan tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MembershipPlan {
    Monthly,
    Quarterly,
    Yearly,
    Premium,
}

impl MembershipPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Premium => "premium",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "monthly" => Some(Self::Monthly),
            "quarterly" => Some(Self::Quarterly),
            "yearly" => Some(Self::Yearly),
            "premium" => Some(Self::Premium),
            _ => None,
        }
    }

    /// Charged when the caller does not override the amount.
    pub fn default_amount(&self) -> f64 {
        match self {
            Self::Monthly => 500.0,
            Self::Quarterly => 1200.0,
            Self::Yearly => 4000.0,
            Self::Premium => 6000.0,
        }
    }

    pub fn default_term_months(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
            Self::Yearly => 12,
            Self::Premium => 12,
        }
    }
}

/// Customer-level membership block; at most one per customer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Membership {
    /// Six digits, unique among active memberships
    pub number: String,
    /// Four digits
    pub pin: String,
    pub plan: MembershipPlan,
    pub covered_classes: Vec<VehicleClass>,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub validity_term_months: u32,
    pub is_active: bool,
}

impl Membership {
    /// Active and not past expiry.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.expires_at > now
    }

    /// Covers a class iff current and the class is in the coverage set.
    pub fn covers(&self, class: VehicleClass, now: DateTime<Utc>) -> bool {
        self.is_current(now) && self.covered_classes.contains(&class)
    }

    /// Whether `requested` adds nothing beyond the existing coverage.
    pub fn covers_all(&self, requested: &[VehicleClass]) -> bool {
        requested.iter().all(|c| self.covered_classes.contains(c))
    }

    /// Merge additional classes into the coverage set, keeping order stable.
    pub fn extend_coverage(&mut self, additional: &[VehicleClass]) {
        for class in additional {
            if !self.covered_classes.contains(class) {
                self.covered_classes.push(*class);
            }
        }
    }
}

/// Append-only ledger row recording a membership issuance or renewal.
/// Never mutated once `Completed`.
#[derive(Debug, Clone)]
pub struct MembershipPayment {
    pub id: String,
    pub customer_id: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub membership_number: String,
    pub plan: MembershipPlan,
    pub amount: f64,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
    pub start_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    pub validity_term_months: u32,
    pub covered_classes: Vec<VehicleClass>,
    pub status: PaymentStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Customer with embedded vehicles and optional membership
#[derive(Debug, Clone)]
pub struct Customer {
    pub id: String,
    /// `CUST` + 6-digit tail
    pub code: String,
    pub first_name: String,
    pub last_name: String,
    /// Primary identity; unique among active customers
    pub phone: String,
    pub email: Option<String>,
    pub vehicles: Vec<Vehicle>,
    pub membership: Option<Membership>,
    pub total_bookings: u64,
    pub total_amount: f64,
    pub last_booking_at: Option<DateTime<Utc>>,
    pub status: CustomerStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub delete_reason: Option<String>,
}

impl Customer {
    pub fn new(
        id: impl Into<String>,
        code: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            code: code.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: phone.into(),
            email: None,
            vehicles: Vec::new(),
            membership: None,
            total_bookings: 0,
            total_amount: 0.0,
            last_booking_at: None,
            status: CustomerStatus::Active,
            created_at: now,
            created_by: None,
            updated_at: now,
            updated_by: None,
            deleted_at: None,
            delete_reason: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == CustomerStatus::Active
    }

    pub fn full_name(&self) -> String {
        if self.last_name.is_empty() {
            self.first_name.clone()
        } else {
            format!("{} {}", self.first_name, self.last_name)
        }
    }

    /// Split a display name into first/last on the first space.
    pub fn set_full_name(&mut self, name: &str) {
        let mut parts = name.trim().splitn(2, ' ');
        self.first_name = parts.next().unwrap_or_default().to_string();
        self.last_name = parts.next().unwrap_or_default().to_string();
    }

    pub fn find_active_vehicle(&self, plate: &str) -> Option<&Vehicle> {
        self.vehicles
            .iter()
            .find(|v| v.is_active && v.plate == plate)
    }

    pub fn find_vehicle(&self, vehicle_id: &str) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == vehicle_id)
    }

    /// Soft-delete an embedded vehicle. Returns the plate, or None when the
    /// id does not match an active vehicle.
    pub fn remove_vehicle(&mut self, vehicle_id: &str, now: DateTime<Utc>) -> Option<String> {
        let vehicle = self
            .vehicles
            .iter_mut()
            .find(|v| v.id == vehicle_id && v.is_active)?;
        vehicle.is_active = false;
        vehicle.removed_at = Some(now);
        self.updated_at = now;
        Some(vehicle.plate.clone())
    }

    /// Bump the per-customer counters after a booking event.
    pub fn record_booking(&mut self, amount: Option<f64>, now: DateTime<Utc>) {
        self.total_bookings += 1;
        if let Some(amount) = amount {
            self.total_amount += amount;
        }
        self.last_booking_at = Some(now);
        self.updated_at = now;
    }

    /// Membership expiry for a fresh issue: `issued + term` calendar months.
    pub fn membership_expiry(issued_at: DateTime<Utc>, term_months: u32) -> DateTime<Utc> {
        issued_at
            .checked_add_months(Months::new(term_months))
            .unwrap_or(issued_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn customer() -> Customer {
        Customer::new("c1", "CUST123456", "Asha", "Rao", "9876543210")
    }

    fn membership(covered: Vec<VehicleClass>, expires_at: DateTime<Utc>) -> Membership {
        Membership {
            number: "123456".into(),
            pin: "4321".into(),
            plan: MembershipPlan::Yearly,
            covered_classes: covered,
            issued_at: Utc::now(),
            expires_at,
            validity_term_months: 12,
            is_active: true,
        }
    }

    #[test]
    fn full_name_round_trip() {
        let mut c = customer();
        assert_eq!(c.full_name(), "Asha Rao");
        c.set_full_name("Meera Kumari Iyer");
        assert_eq!(c.first_name, "Meera");
        assert_eq!(c.last_name, "Kumari Iyer");
        assert_eq!(c.full_name(), "Meera Kumari Iyer");
    }

    #[test]
    fn membership_coverage_requires_active_and_unexpired() {
        let now = Utc::now();
        let mut m = membership(vec![VehicleClass::TwoWheeler], now + Duration::days(30));
        assert!(m.covers(VehicleClass::TwoWheeler, now));
        assert!(!m.covers(VehicleClass::FourWheeler, now));

        m.is_active = false;
        assert!(!m.covers(VehicleClass::TwoWheeler, now));

        let expired = membership(vec![VehicleClass::TwoWheeler], now - Duration::days(1));
        assert!(!expired.covers(VehicleClass::TwoWheeler, now));
    }

    #[test]
    fn extend_coverage_is_idempotent() {
        let now = Utc::now();
        let mut m = membership(vec![VehicleClass::TwoWheeler], now + Duration::days(30));
        m.extend_coverage(&[VehicleClass::TwoWheeler, VehicleClass::FourWheeler]);
        assert_eq!(
            m.covered_classes,
            vec![VehicleClass::TwoWheeler, VehicleClass::FourWheeler]
        );
        m.extend_coverage(&[VehicleClass::FourWheeler]);
        assert_eq!(m.covered_classes.len(), 2);
    }

    #[test]
    fn remove_vehicle_soft_deletes() {
        let mut c = customer();
        c.vehicles.push(Vehicle::new(
            "v1",
            "KA01AB1234",
            VehicleClass::TwoWheeler,
            None,
        ));
        let now = Utc::now();
        let plate = c.remove_vehicle("v1", now).unwrap();
        assert_eq!(plate, "KA01AB1234");
        assert!(c.find_active_vehicle("KA01AB1234").is_none());
        // id-addressable even after soft delete
        assert!(c.find_vehicle("v1").is_some());
        // second removal is a no-op
        assert!(c.remove_vehicle("v1", now).is_none());
    }

    #[test]
    fn record_booking_bumps_counters() {
        let mut c = customer();
        let now = Utc::now();
        c.record_booking(None, now);
        c.record_booking(Some(120.0), now);
        assert_eq!(c.total_bookings, 2);
        assert_eq!(c.total_amount, 120.0);
        assert_eq!(c.last_booking_at, Some(now));
    }

    #[test]
    fn membership_expiry_adds_calendar_months() {
        let issued = chrono::TimeZone::with_ymd_and_hms(&Utc, 2025, 1, 31, 12, 0, 0).unwrap();
        let expiry = Customer::membership_expiry(issued, 1);
        // chrono clamps to the end of February
        assert_eq!(expiry.date_naive().to_string(), "2025-02-28");
    }

    #[test]
    fn plan_defaults() {
        assert_eq!(MembershipPlan::Monthly.default_amount(), 500.0);
        assert_eq!(MembershipPlan::Quarterly.default_amount(), 1200.0);
        assert_eq!(MembershipPlan::Yearly.default_amount(), 4000.0);
        assert_eq!(MembershipPlan::Premium.default_amount(), 6000.0);
        assert_eq!(MembershipPlan::Quarterly.default_term_months(), 3);
    }
}
