//! Machine and pallet DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::domain::{Machine, Pallet, PalletOccupant};
use crate::services::{ConnectionStats, MachineLiveness};

/// Machine API representation
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineDto {
    pub id: String,
    pub site_id: String,
    pub machine_number: String,
    pub machine_type: String,
    pub parking_type: String,
    pub status: String,
    pub is_online: bool,
    pub capacity: CapacityDto,
    pub pallets: Vec<PalletDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub firmware_version: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CapacityDto {
    pub total: u32,
    pub available: u32,
    pub occupied: u32,
    pub maintenance: u32,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PalletDto {
    pub number: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    pub status: String,
    pub vehicle_capacity: u8,
    pub current_occupancy: u8,
    pub current_bookings: Vec<OccupantDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupied_since: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_maintenance: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_notes: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OccupantDto {
    pub booking_id: String,
    pub vehicle_number: String,
    pub position: u8,
    pub occupied_since: DateTime<Utc>,
}

impl MachineDto {
    pub fn from_domain(machine: Machine) -> Self {
        let is_online = machine.is_live(Utc::now());
        Self {
            is_online,
            capacity: CapacityDto {
                total: machine.capacity.total,
                available: machine.capacity.available,
                occupied: machine.capacity.occupied,
                maintenance: machine.capacity.maintenance,
            },
            pallets: machine.pallets.iter().map(PalletDto::from_domain).collect(),
            last_heartbeat: machine.integration.last_heartbeat,
            firmware_version: machine.integration.firmware_version.clone(),
            id: machine.id,
            site_id: machine.site_id,
            machine_number: machine.code,
            machine_type: machine.kind.as_str().to_string(),
            parking_type: machine.vehicle_class.as_str().to_string(),
            status: machine.status.as_str().to_string(),
        }
    }
}

impl PalletDto {
    fn from_domain(pallet: &Pallet) -> Self {
        Self {
            number: pallet.number,
            custom_name: pallet.custom_name.clone(),
            status: pallet.status.as_str().to_string(),
            vehicle_capacity: pallet.vehicle_capacity,
            current_occupancy: pallet.current_occupancy,
            current_bookings: pallet
                .current_bookings
                .iter()
                .map(OccupantDto::from_domain)
                .collect(),
            occupied_since: pallet.occupied_since,
            last_maintenance: pallet.last_maintenance,
            maintenance_notes: pallet.maintenance_notes.clone(),
        }
    }
}

impl OccupantDto {
    fn from_domain(occupant: &PalletOccupant) -> Self {
        Self {
            booking_id: occupant.booking_id.clone(),
            vehicle_number: occupant.vehicle_number.clone(),
            position: occupant.position,
            occupied_since: occupant.occupied_since,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateMachineRequest {
    pub site_id: String,
    #[validate(length(min = 4, max = 4))]
    pub machine_number: String,
    /// "rotary" | "puzzle"
    pub machine_type: String,
    /// "two-wheeler" | "four-wheeler"
    pub parking_type: String,
    #[validate(range(min = 1, max = 200))]
    pub total_pallets: u32,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMachineRequest {
    /// "online" | "offline" | "maintenance" | "error"
    pub status: Option<String>,
    pub machine_type: Option<String>,
    pub parking_type: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OccupyPalletRequest {
    #[validate(length(min = 1))]
    pub booking_id: String,
    #[validate(length(min = 4, max = 15))]
    pub vehicle_number: String,
    #[validate(range(min = 1, max = 6))]
    pub position: Option<u8>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePalletRequest {
    #[validate(length(min = 1))]
    pub booking_id: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseVehicleRequest {
    #[validate(length(min = 4, max = 15))]
    pub vehicle_number: String,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PalletMaintenanceRequest {
    #[validate(length(max = 500))]
    pub notes: Option<String>,
    /// false clears maintenance instead of declaring it
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    #[validate(length(max = 50))]
    pub firmware_version: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AvailableMachinesQuery {
    /// "two-wheeler" | "four-wheeler"
    pub vehicle_type: String,
    pub site_id: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct MachineListQuery {
    pub site_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MachineLivenessDto {
    pub machine_id: String,
    pub machine_number: String,
    pub site_id: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds_since_heartbeat: Option<i64>,
    pub is_online: bool,
}

impl MachineLivenessDto {
    pub fn from_domain(liveness: MachineLiveness) -> Self {
        Self {
            machine_id: liveness.machine_id,
            machine_number: liveness.machine_code,
            site_id: liveness.site_id,
            status: liveness.status.as_str().to_string(),
            last_heartbeat: liveness.last_heartbeat,
            seconds_since_heartbeat: liveness.seconds_since_heartbeat,
            is_online: liveness.is_live,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatsDto {
    pub total: usize,
    pub live: usize,
    pub stale: usize,
    pub never_seen: usize,
}

impl ConnectionStatsDto {
    pub fn from_domain(stats: ConnectionStats) -> Self {
        Self {
            total: stats.total,
            live: stats.live,
            stale: stats.stale,
            never_seen: stats.never_seen,
        }
    }
}
