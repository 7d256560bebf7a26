//! Site DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{Address, GeoPoint, OperatingHours, Pricing, Site, User};
use crate::services::SiteStatistics;

/// Site API representation
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteDto {
    pub id: String,
    pub site_code: String,
    pub name: String,
    pub address: AddressDto,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub operating_hours: OperatingHours,
    pub pricing: Pricing,
    pub total_machines: u32,
    pub total_capacity: u32,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressDto {
    #[validate(length(max = 200))]
    pub line1: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[validate(length(min = 6, max = 6))]
    pub pincode: String,
}

impl AddressDto {
    pub fn into_domain(self) -> Address {
        Address {
            line1: self.line1,
            city: self.city,
            state: self.state,
            pincode: self.pincode,
        }
    }

    fn from_domain(address: &Address) -> Self {
        Self {
            line1: address.line1.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            pincode: address.pincode.clone(),
        }
    }
}

impl SiteDto {
    pub fn from_domain(site: Site) -> Self {
        Self {
            address: AddressDto::from_domain(&site.address),
            id: site.id,
            site_code: site.code,
            name: site.name,
            location: site.location,
            operating_hours: site.operating_hours,
            pricing: site.pricing,
            total_machines: site.declared_machine_count,
            total_capacity: site.declared_capacity,
            status: site.status.as_str().to_string(),
            created_at: site.created_at,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateSiteRequest {
    #[validate(length(min = 7, max = 10))]
    pub site_code: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(nested)]
    pub address: AddressDto,
    pub location: Option<GeoPoint>,
    pub operating_hours: Option<OperatingHours>,
    pub pricing: Option<Pricing>,
    #[validate(range(min = 0, max = 1000))]
    pub total_machines: Option<u32>,
    #[validate(range(min = 0, max = 100_000))]
    pub total_capacity: Option<u32>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSiteRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(nested)]
    pub address: Option<AddressDto>,
    pub location: Option<GeoPoint>,
    pub operating_hours: Option<OperatingHours>,
    pub pricing: Option<Pricing>,
    #[validate(range(min = 0, max = 1000))]
    pub total_machines: Option<u32>,
    #[validate(range(min = 0, max = 100_000))]
    pub total_capacity: Option<u32>,
    /// "active" | "inactive" | "maintenance" | "under-construction"
    pub status: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct DeleteSiteQuery {
    /// Required to drop a site that still has machines or bookings
    pub force: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AssignUserRequest {
    #[validate(length(min = 1))]
    pub user_id: String,
    /// "site-admin" | "supervisor" | "operator"
    pub site_role: String,
    pub permissions: Option<Vec<String>>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatisticsDto {
    pub machines_total: u64,
    pub machines_online: u64,
    pub bookings_total: u64,
    pub bookings_today: u64,
    pub bookings_active: u64,
    pub revenue_total: f64,
    pub revenue_today: f64,
}

impl SiteStatisticsDto {
    pub fn from_domain(stats: SiteStatistics) -> Self {
        Self {
            machines_total: stats.machines_total,
            machines_online: stats.machines_online,
            bookings_total: stats.bookings_total,
            bookings_today: stats.bookings_today,
            bookings_active: stats.bookings_active,
            revenue_total: stats.revenue_total,
            revenue_today: stats.revenue_today,
        }
    }
}

/// Site user listing entry; credentials never appear here
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SiteUserDto {
    pub id: String,
    pub operator_id: String,
    pub name: String,
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_role: Option<String>,
    pub is_primary_site: bool,
}

impl SiteUserDto {
    pub fn from_domain(user: &User, site_id: &str) -> Self {
        Self {
            id: user.id.clone(),
            operator_id: user.operator_id.clone(),
            name: user.name.clone(),
            role: user.role.as_str().to_string(),
            site_role: user.site_role(site_id).map(|r| {
                match r {
                    crate::domain::SiteRole::SiteAdmin => "site-admin",
                    crate::domain::SiteRole::Supervisor => "supervisor",
                    crate::domain::SiteRole::Operator => "operator",
                }
                .to_string()
            }),
            is_primary_site: user.primary_site.as_deref() == Some(site_id),
        }
    }
}
