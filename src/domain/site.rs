//! Site domain entity
//!
//! A site is the unit of multi-tenant scoping: a geographically distinct
//! location owning one or more parking machines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::machine::VehicleClass;

/// Site operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SiteStatus {
    Active,
    Inactive,
    Maintenance,
    UnderConstruction,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
            Self::Maintenance => "maintenance",
            Self::UnderConstruction => "under-construction",
        }
    }
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opening window for one weekday, local wall-clock times
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct DayHours {
    pub is_open: bool,
    pub open: String,
    pub close: String,
}

impl Default for DayHours {
    fn default() -> Self {
        Self {
            is_open: true,
            open: "06:00".to_string(),
            close: "23:00".to_string(),
        }
    }
}

/// Operating hours per weekday
#[derive(Debug, Clone, Default, Serialize, Deserialize, utoipa::ToSchema)]
pub struct OperatingHours {
    pub monday: DayHours,
    pub tuesday: DayHours,
    pub wednesday: DayHours,
    pub thursday: DayHours,
    pub friday: DayHours,
    pub saturday: DayHours,
    pub sunday: DayHours,
}

/// Base rate and minimum charge for one vehicle class
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ClassRate {
    pub base_rate: f64,
    pub minimum_charge: f64,
}

/// Pricing block; machines may carry an override of the same shape
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Pricing {
    pub two_wheeler: ClassRate,
    pub four_wheeler: ClassRate,
    pub peak_multiplier: f64,
    pub peak_start: String,
    pub peak_end: String,
}

impl Pricing {
    pub fn rate_for(&self, class: VehicleClass) -> ClassRate {
        match class {
            VehicleClass::TwoWheeler => self.two_wheeler,
            VehicleClass::FourWheeler => self.four_wheeler,
        }
    }
}

impl Default for Pricing {
    fn default() -> Self {
        Self {
            two_wheeler: ClassRate {
                base_rate: 20.0,
                minimum_charge: 20.0,
            },
            four_wheeler: ClassRate {
                base_rate: 50.0,
                minimum_charge: 50.0,
            },
            peak_multiplier: 1.5,
            peak_start: "18:00".to_string(),
            peak_end: "21:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub line1: Option<String>,
    pub city: String,
    pub state: String,
    /// Six-digit postal code
    pub pincode: String,
}

/// Parking site
#[derive(Debug, Clone)]
pub struct Site {
    pub id: String,
    /// Human site code, e.g. `SITE001`
    pub code: String,
    pub name: String,
    pub address: Address,
    pub location: Option<GeoPoint>,
    pub operating_hours: OperatingHours,
    pub pricing: Pricing,
    /// Operator-declared machine count; advisory
    pub declared_machine_count: u32,
    /// Operator-declared vehicle capacity; the authoritative number is the
    /// sum of the machines' pallet capacities
    pub declared_capacity: u32,
    pub status: SiteStatus,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Site {
    pub fn new(
        id: impl Into<String>,
        code: impl Into<String>,
        name: impl Into<String>,
        address: Address,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            code: code.into(),
            name: name.into(),
            address,
            location: None,
            operating_hours: OperatingHours::default(),
            pricing: Pricing::default(),
            declared_machine_count: 0,
            declared_capacity: 0,
            status: SiteStatus::Active,
            created_at: now,
            created_by: None,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SiteStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_site_is_active_with_default_hours() {
        let site = Site::new(
            "s1",
            "SITE001",
            "Central Yard",
            Address {
                line1: None,
                city: "Bengaluru".into(),
                state: "KA".into(),
                pincode: "560001".into(),
            },
        );
        assert!(site.is_active());
        assert!(site.operating_hours.monday.is_open);
        assert_eq!(site.pricing.rate_for(VehicleClass::FourWheeler).base_rate, 50.0);
    }

    #[test]
    fn status_strings_are_kebab_case() {
        assert_eq!(SiteStatus::UnderConstruction.as_str(), "under-construction");
    }
}
