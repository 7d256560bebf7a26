//! Machine and pallet engine service
//!
//! Orchestrates pallet allocation against the store. Every pallet
//! read-modify-write runs under a per-machine advisory lock so occupy and
//! release are serialized per pallet; reads stay lock-free and tolerate
//! sub-second staleness of the aggregate counters.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::{
    Machine, MachineKind, MachineStatus, PalletKey, Pricing, VehicleClass,
};
use crate::shared::types::{DomainError, DomainResult};
use crate::shared::validations;
use crate::shared::ids;
use crate::storage::Storage;

/// Inputs for machine registration
#[derive(Debug, Clone)]
pub struct CreateMachineInput {
    pub site_id: String,
    pub code: String,
    pub kind: MachineKind,
    pub vehicle_class: VehicleClass,
    pub total_pallets: u32,
    pub pricing: Option<Pricing>,
}

/// Identity used when releasing a pallet occupant
#[derive(Debug, Clone)]
pub enum ReleaseBy {
    Booking(String),
    Vehicle(String),
}

/// Service for machine and pallet operations
pub struct MachineService {
    storage: Arc<dyn Storage>,
    /// Per-machine advisory locks serializing pallet mutations
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MachineService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, machine_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(machine_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub async fn create_machine(&self, input: CreateMachineInput) -> DomainResult<Machine> {
        validations::validate_machine_code(&input.code)?;
        if input.total_pallets == 0 {
            return Err(DomainError::validation(
                "totalPallets",
                "must be at least 1",
            ));
        }
        let site = self
            .storage
            .get_site(&input.site_id)
            .await?
            .ok_or_else(|| DomainError::not_found("site", "id", input.site_id.clone()))?;

        let mut machine = Machine::new(
            ids::entity_id(),
            site.id,
            input.code.to_uppercase(),
            input.kind,
            input.vehicle_class,
            input.total_pallets,
        );
        machine.pricing = input.pricing;

        self.storage.insert_machine(machine.clone()).await?;
        info!(
            machine_code = %machine.code,
            site_id = %machine.site_id,
            pallets = machine.pallets.len(),
            "Machine registered"
        );
        Ok(machine)
    }

    pub async fn get_machine(&self, id: &str) -> DomainResult<Machine> {
        self.storage
            .get_machine(id)
            .await?
            .ok_or_else(|| DomainError::not_found("machine", "id", id))
    }

    pub async fn list_machines(&self, site_id: Option<&str>) -> DomainResult<Vec<Machine>> {
        match site_id {
            Some(site_id) => self.storage.list_machines_by_site(site_id).await,
            None => self.storage.list_machines().await,
        }
    }

    /// Change machine status. Transitions away from service require zero
    /// occupancy so vehicles are never stranded silently.
    pub async fn set_status(&self, id: &str, status: MachineStatus) -> DomainResult<Machine> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut machine = self.get_machine(id).await?;
        if status != MachineStatus::Online && machine.total_occupancy() > 0 {
            return Err(DomainError::IllegalTransition(format!(
                "machine {} still holds {} vehicles",
                machine.code,
                machine.total_occupancy()
            )));
        }
        machine.status = status;
        machine.updated_at = Utc::now();
        self.storage.update_machine(machine.clone()).await?;
        Ok(machine)
    }

    /// Rewrite kinematics/target class. Pallet capacities are rewritten; a
    /// destructive occupant clamp is surfaced as a warning.
    pub async fn retarget_machine(
        &self,
        id: &str,
        kind: MachineKind,
        vehicle_class: VehicleClass,
    ) -> DomainResult<Machine> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let mut machine = self.get_machine(id).await?;
        let truncated = machine.retarget(kind, vehicle_class);
        if truncated {
            warn!(
                machine_code = %machine.code,
                "Pallet capacity reduced below occupancy; occupant lists truncated"
            );
        }
        self.storage.update_machine(machine.clone()).await?;
        Ok(machine)
    }

    /// Park a vehicle. Serialized per machine.
    pub async fn occupy_pallet(
        &self,
        machine_id: &str,
        pallet: PalletKey,
        booking_id: &str,
        vehicle_number: &str,
        position: Option<u8>,
    ) -> DomainResult<Machine> {
        let lock = self.lock_for(machine_id);
        let _guard = lock.lock().await;

        let mut machine = self.get_machine(machine_id).await?;
        let assigned = machine.occupy_pallet(
            &pallet,
            booking_id,
            vehicle_number,
            position,
            Utc::now(),
        )?;
        self.storage.update_machine(machine.clone()).await?;
        info!(
            machine_code = %machine.code,
            pallet = %pallet,
            booking_id,
            position = assigned,
            "Pallet occupied"
        );
        Ok(machine)
    }

    /// Release one occupant by booking id or plate. Serialized per machine.
    pub async fn release_pallet(
        &self,
        machine_id: &str,
        pallet: PalletKey,
        identity: ReleaseBy,
    ) -> DomainResult<Machine> {
        let lock = self.lock_for(machine_id);
        let _guard = lock.lock().await;

        let mut machine = self.get_machine(machine_id).await?;
        let now = Utc::now();
        let released = match &identity {
            ReleaseBy::Booking(booking_id) => {
                machine.release_by_booking(&pallet, booking_id, now)?
            }
            ReleaseBy::Vehicle(plate) => machine.release_vehicle(&pallet, plate, now)?,
        };
        self.storage.update_machine(machine.clone()).await?;
        info!(
            machine_code = %machine.code,
            pallet = %pallet,
            booking_id = %released.booking_id,
            vehicle = %released.vehicle_number,
            "Pallet released"
        );
        Ok(machine)
    }

    /// Booking-engine side-effect entry point: resolve the machine by
    /// `(site, code)` first, then occupy under the machine lock.
    pub async fn occupy_for_booking(
        &self,
        site_id: &str,
        machine_code: &str,
        pallet_number: u32,
        booking_id: &str,
        vehicle_number: &str,
    ) -> DomainResult<()> {
        let machine = self
            .storage
            .get_machine_by_code(site_id, machine_code)
            .await?
            .ok_or_else(|| DomainError::not_found("machine", "code", machine_code))?;
        self.occupy_pallet(
            &machine.id,
            PalletKey::Number(pallet_number),
            booking_id,
            vehicle_number,
            None,
        )
        .await?;
        Ok(())
    }

    /// Booking-engine side-effect entry point for releases.
    pub async fn release_for_booking(
        &self,
        site_id: &str,
        machine_code: &str,
        pallet_number: u32,
        identity: ReleaseBy,
    ) -> DomainResult<()> {
        let machine = self
            .storage
            .get_machine_by_code(site_id, machine_code)
            .await?
            .ok_or_else(|| DomainError::not_found("machine", "code", machine_code))?;
        self.release_pallet(&machine.id, PalletKey::Number(pallet_number), identity)
            .await?;
        Ok(())
    }

    /// Declare a pallet unsafe without releasing occupants.
    pub async fn set_pallet_maintenance(
        &self,
        machine_id: &str,
        pallet: PalletKey,
        notes: Option<String>,
        actor: Option<&str>,
    ) -> DomainResult<Machine> {
        let lock = self.lock_for(machine_id);
        let _guard = lock.lock().await;

        let mut machine = self.get_machine(machine_id).await?;
        let occupancy = machine.set_pallet_maintenance(&pallet, notes, Utc::now())?;
        if occupancy > 0 {
            warn!(
                machine_code = %machine.code,
                pallet = %pallet,
                occupancy,
                actor = actor.unwrap_or("unknown"),
                "Pallet declared under maintenance while still occupied"
            );
        }
        self.storage.update_machine(machine.clone()).await?;
        Ok(machine)
    }

    pub async fn clear_pallet_maintenance(
        &self,
        machine_id: &str,
        pallet: PalletKey,
    ) -> DomainResult<Machine> {
        let lock = self.lock_for(machine_id);
        let _guard = lock.lock().await;

        let mut machine = self.get_machine(machine_id).await?;
        machine.clear_pallet_maintenance(&pallet, Utc::now())?;
        self.storage.update_machine(machine.clone()).await?;
        Ok(machine)
    }

    /// Controller liveness signal.
    pub async fn update_heartbeat(
        &self,
        machine_id: &str,
        firmware_version: Option<String>,
    ) -> DomainResult<Machine> {
        let mut machine = self.get_machine(machine_id).await?;
        machine.heartbeat(firmware_version, Utc::now());
        self.storage.update_machine(machine.clone()).await?;
        Ok(machine)
    }

    /// Machines that can take one more vehicle of the class, most free
    /// capacity first.
    pub async fn find_available(
        &self,
        vehicle_class: VehicleClass,
        site_id: Option<&str>,
    ) -> DomainResult<Vec<Machine>> {
        let machines = self.list_machines(site_id).await?;
        let mut candidates: Vec<Machine> = machines
            .into_iter()
            .filter(|m| {
                m.status == MachineStatus::Online
                    && m.capacity.available > 0
                    && m.supports(vehicle_class)
                    && m.first_free_pallet().is_some()
            })
            .collect();
        candidates.sort_by(|a, b| b.capacity.available.cmp(&a.capacity.available));
        Ok(candidates)
    }

    /// Machines flagged for attention: a past-due service date or any
    /// pallet sitting in maintenance.
    pub async fn maintenance_due(&self) -> DomainResult<Vec<Machine>> {
        let now = Utc::now();
        let machines = self.storage.list_machines().await?;
        Ok(machines
            .into_iter()
            .filter(|m| {
                m.capacity.maintenance > 0
                    || m.next_service_due.is_some_and(|due| due <= now)
                    || m.status == MachineStatus::Maintenance
            })
            .collect())
    }

    /// Remove a machine; only legal once it holds no vehicles.
    pub async fn delete_machine(&self, id: &str) -> DomainResult<()> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().await;

        let machine = self.get_machine(id).await?;
        if machine.total_occupancy() > 0 {
            return Err(DomainError::IllegalTransition(format!(
                "machine {} still holds {} vehicles",
                machine.code,
                machine.total_occupancy()
            )));
        }
        self.storage.delete_machine(id).await?;
        self.locks.remove(id);
        Ok(())
    }

    pub async fn record_service(
        &self,
        machine_id: &str,
        notes: String,
        actor: Option<String>,
    ) -> DomainResult<Machine> {
        let mut machine = self.get_machine(machine_id).await?;
        machine.record_service(notes, actor);
        self.storage.update_machine(machine.clone()).await?;
        Ok(machine)
    }
}
