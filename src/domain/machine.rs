//! Machine and pallet domain entities
//!
//! A machine is one physical mechanical parking unit bound to a site. It
//! owns a fixed array of pallets; each pallet hosts 1-6 vehicles in distinct
//! positions depending on the machine's kinematics and target class. All
//! allocation/release transitions live here so the invariants can be tested
//! without a store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::site::Pricing;
use crate::shared::types::{DomainError, DomainResult};

/// Positions on a pallet are numbered 1..=6.
pub const MAX_POSITIONS: u8 = 6;

/// A machine counts as live when its last heartbeat is within this window.
pub const LIVE_WINDOW_MINUTES: i64 = 5;

/// Target vehicle class of a machine (and class of a vehicle)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VehicleClass {
    TwoWheeler,
    FourWheeler,
}

impl VehicleClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TwoWheeler => "two-wheeler",
            Self::FourWheeler => "four-wheeler",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "two-wheeler" => Some(Self::TwoWheeler),
            "four-wheeler" => Some(Self::FourWheeler),
            _ => None,
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Machine kinematics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Rotary,
    Puzzle,
}

impl MachineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rotary => "rotary",
            Self::Puzzle => "puzzle",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "rotary" => Some(Self::Rotary),
            "puzzle" => Some(Self::Puzzle),
            _ => None,
        }
    }
}

/// Machine operational status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineStatus {
    Online,
    Offline,
    Maintenance,
    Error,
}

impl MachineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for MachineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

/// Pallet status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PalletStatus {
    Available,
    Occupied,
    Maintenance,
    Blocked,
}

impl PalletStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Occupied => "occupied",
            Self::Maintenance => "maintenance",
            Self::Blocked => "blocked",
        }
    }
}

/// Vehicles per pallet for a kinematics/class pair.
pub fn vehicles_per_pallet(kind: MachineKind, class: VehicleClass) -> u8 {
    match (kind, class) {
        (_, VehicleClass::FourWheeler) => 1,
        (MachineKind::Rotary, VehicleClass::TwoWheeler) => 6,
        (MachineKind::Puzzle, VehicleClass::TwoWheeler) => 3,
    }
}

/// One vehicle currently parked on a pallet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PalletOccupant {
    pub booking_id: String,
    pub vehicle_number: String,
    /// Slot 1..=6 distinguishing co-located two-wheelers
    pub position: u8,
    pub occupied_since: DateTime<Utc>,
}

/// Lookup key for a pallet: its number, or a string that matches either the
/// number or the pallet's custom name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PalletKey {
    Number(u32),
    Name(String),
}

impl std::fmt::Display for PalletKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Name(s) => write!(f, "{}", s),
        }
    }
}

impl From<u32> for PalletKey {
    fn from(n: u32) -> Self {
        Self::Number(n)
    }
}

impl From<&str> for PalletKey {
    fn from(s: &str) -> Self {
        Self::Name(s.to_string())
    }
}

/// A tray within a machine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pallet {
    /// Stable identity within the machine (rotary: 1..N; puzzle: 101..)
    pub number: u32,
    pub custom_name: Option<String>,
    pub status: PalletStatus,
    pub vehicle_capacity: u8,
    pub current_occupancy: u8,
    pub current_bookings: Vec<PalletOccupant>,
    pub occupied_since: Option<DateTime<Utc>>,
    pub last_maintenance: Option<DateTime<Utc>>,
    pub maintenance_notes: Option<String>,
}

impl Pallet {
    pub fn new(number: u32, vehicle_capacity: u8) -> Self {
        Self {
            number,
            custom_name: None,
            status: PalletStatus::Available,
            vehicle_capacity,
            current_occupancy: 0,
            current_bookings: Vec::new(),
            occupied_since: None,
            last_maintenance: None,
            maintenance_notes: None,
        }
    }

    pub fn matches(&self, key: &PalletKey) -> bool {
        match key {
            PalletKey::Number(n) => self.number == *n,
            PalletKey::Name(s) => {
                self.custom_name.as_deref() == Some(s.as_str())
                    || s.parse::<u32>().is_ok_and(|n| self.number == n)
            }
        }
    }

    /// Free for new occupants: not maintenance/blocked and under capacity.
    pub fn has_free_space(&self) -> bool {
        !matches!(self.status, PalletStatus::Maintenance | PalletStatus::Blocked)
            && self.current_occupancy < self.vehicle_capacity
    }

    /// Lowest position in 1..=6 not currently taken.
    pub fn lowest_free_position(&self) -> Option<u8> {
        (1..=MAX_POSITIONS).find(|p| !self.current_bookings.iter().any(|o| o.position == *p))
    }

    pub fn position_taken(&self, position: u8) -> bool {
        self.current_bookings.iter().any(|o| o.position == position)
    }

    /// Re-derive status from occupancy. Maintenance and blocked are
    /// operator-declared and never overwritten here.
    fn refresh_status(&mut self) {
        if matches!(self.status, PalletStatus::Maintenance | PalletStatus::Blocked) {
            return;
        }
        self.status = if self.current_occupancy >= self.vehicle_capacity {
            PalletStatus::Occupied
        } else {
            PalletStatus::Available
        };
    }
}

/// Physical limits and supported classes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineSpecs {
    pub max_length_mm: Option<u32>,
    pub max_width_mm: Option<u32>,
    pub max_height_mm: Option<u32>,
    pub max_weight_kg: Option<u32>,
    pub supported_vehicle_classes: Vec<VehicleClass>,
}

impl MachineSpecs {
    fn for_class(class: VehicleClass) -> Self {
        Self {
            max_length_mm: None,
            max_width_mm: None,
            max_height_mm: None,
            max_weight_kg: None,
            supported_vehicle_classes: vec![class],
        }
    }
}

/// Derived capacity counters. `total` is operator-declared and never
/// recomputed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MachineCapacity {
    pub total: u32,
    pub available: u32,
    pub occupied: u32,
    pub maintenance: u32,
}

/// Controller integration state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineIntegration {
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub firmware_version: Option<String>,
    pub connection_status: ConnectionStatus,
}

impl Default for MachineIntegration {
    fn default() -> Self {
        Self {
            last_heartbeat: None,
            firmware_version: None,
            connection_status: ConnectionStatus::Disconnected,
        }
    }
}

/// One maintenance/service visit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub performed_at: DateTime<Utc>,
    pub notes: String,
    pub performed_by: Option<String>,
}

/// Mechanical parking machine
#[derive(Debug, Clone)]
pub struct Machine {
    pub id: String,
    pub site_id: String,
    /// Machine code, unique per site, e.g. `M001`
    pub code: String,
    pub kind: MachineKind,
    pub vehicle_class: VehicleClass,
    pub status: MachineStatus,
    pub specs: MachineSpecs,
    pub capacity: MachineCapacity,
    pub pallets: Vec<Pallet>,
    /// Overrides the site pricing when set
    pub pricing: Option<Pricing>,
    pub integration: MachineIntegration,
    pub service_history: Vec<ServiceRecord>,
    pub next_service_due: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Machine {
    /// Create a machine with `total` pallets auto-initialized for its
    /// kinematics (rotary: 1..=N; puzzle: 101..104, 201..204, four per
    /// floor).
    pub fn new(
        id: impl Into<String>,
        site_id: impl Into<String>,
        code: impl Into<String>,
        kind: MachineKind,
        vehicle_class: VehicleClass,
        total: u32,
    ) -> Self {
        let now = Utc::now();
        let capacity_per_pallet = vehicles_per_pallet(kind, vehicle_class);
        let pallets = Self::generate_pallets(kind, total, capacity_per_pallet);
        let mut machine = Self {
            id: id.into(),
            site_id: site_id.into(),
            code: code.into(),
            kind,
            vehicle_class,
            status: MachineStatus::Online,
            specs: MachineSpecs::for_class(vehicle_class),
            capacity: MachineCapacity {
                total,
                ..Default::default()
            },
            pallets,
            pricing: None,
            integration: MachineIntegration::default(),
            service_history: Vec::new(),
            next_service_due: None,
            created_at: now,
            updated_at: now,
        };
        machine.rebuild_capacity();
        machine
    }

    fn generate_pallets(kind: MachineKind, total: u32, capacity: u8) -> Vec<Pallet> {
        (0..total)
            .map(|i| {
                let number = match kind {
                    MachineKind::Rotary => i + 1,
                    // Four pallets per floor: 101..104, 201..204, …
                    // A total that is not a multiple of 4 leaves the last
                    // floor under-filled.
                    MachineKind::Puzzle => (i / 4 + 1) * 100 + (i % 4 + 1),
                };
                Pallet::new(number, capacity)
            })
            .collect()
    }

    pub fn vehicles_per_pallet(&self) -> u8 {
        vehicles_per_pallet(self.kind, self.vehicle_class)
    }

    /// Recompute the derived counters from the pallet array.
    pub fn rebuild_capacity(&mut self) {
        let mut occupied = 0u32;
        let mut available = 0u32;
        let mut maintenance = 0u32;
        for pallet in &self.pallets {
            match pallet.status {
                PalletStatus::Maintenance => maintenance += 1,
                PalletStatus::Occupied => occupied += pallet.current_occupancy as u32,
                PalletStatus::Available => {
                    available +=
                        (pallet.vehicle_capacity - pallet.current_occupancy) as u32;
                }
                PalletStatus::Blocked => {}
            }
        }
        self.capacity.occupied = occupied;
        self.capacity.available = available;
        self.capacity.maintenance = maintenance;
    }

    /// Rewrite per-pallet capacity after a kinematics or class change.
    /// Occupant lists longer than the new capacity are truncated; returns
    /// true when that destructive clamp happened so callers can warn.
    pub fn retarget(&mut self, kind: MachineKind, vehicle_class: VehicleClass) -> bool {
        self.kind = kind;
        self.vehicle_class = vehicle_class;
        let new_capacity = vehicles_per_pallet(kind, vehicle_class);
        let mut truncated = false;
        for pallet in &mut self.pallets {
            pallet.vehicle_capacity = new_capacity;
            if pallet.current_occupancy > new_capacity {
                pallet.current_bookings.truncate(new_capacity as usize);
                pallet.current_occupancy = new_capacity;
                truncated = true;
            }
            pallet.refresh_status();
        }
        if !self.specs.supported_vehicle_classes.contains(&vehicle_class) {
            self.specs.supported_vehicle_classes = vec![vehicle_class];
        }
        self.rebuild_capacity();
        self.updated_at = Utc::now();
        truncated
    }

    pub fn find_pallet(&self, key: &PalletKey) -> Option<&Pallet> {
        self.pallets.iter().find(|p| p.matches(key))
    }

    fn find_pallet_mut(&mut self, key: &PalletKey) -> Option<&mut Pallet> {
        self.pallets.iter_mut().find(|p| p.matches(key))
    }

    /// Park a vehicle on a pallet. Preconditions are checked in order and
    /// fail with distinct error kinds: machine online, pallet found, pallet
    /// not in maintenance, pallet under capacity, position free.
    ///
    /// Four-wheeler machines always assign position 1; two-wheeler machines
    /// take the caller's position or the lowest free slot.
    pub fn occupy_pallet(
        &mut self,
        key: &PalletKey,
        booking_id: &str,
        vehicle_number: &str,
        position: Option<u8>,
        now: DateTime<Utc>,
    ) -> DomainResult<u8> {
        if self.status != MachineStatus::Online {
            return Err(DomainError::MachineOffline(self.code.clone()));
        }
        let machine_code = self.code.clone();
        let target_class = self.vehicle_class;
        let pallet = self
            .find_pallet_mut(key)
            .ok_or_else(|| DomainError::not_found("pallet", "key", key.to_string()))?;

        if matches!(pallet.status, PalletStatus::Maintenance | PalletStatus::Blocked) {
            return Err(DomainError::PalletMaintenance {
                machine: machine_code.clone(),
                pallet: pallet.number.to_string(),
            });
        }
        if pallet.current_occupancy >= pallet.vehicle_capacity {
            return Err(DomainError::PalletFull {
                machine: machine_code.clone(),
                pallet: pallet.number.to_string(),
            });
        }

        let position = match target_class {
            // A four-wheeler pallet has a single slot; caller input is
            // ignored.
            VehicleClass::FourWheeler => 1,
            VehicleClass::TwoWheeler => match position {
                Some(p) => {
                    if !(1..=MAX_POSITIONS).contains(&p) {
                        return Err(DomainError::validation(
                            "position",
                            "must be between 1 and 6",
                        ));
                    }
                    if pallet.position_taken(p) {
                        return Err(DomainError::PositionTaken(p));
                    }
                    p
                }
                None => pallet
                    .lowest_free_position()
                    .ok_or_else(|| DomainError::PalletFull {
                        machine: machine_code,
                        pallet: pallet.number.to_string(),
                    })?,
            },
        };

        pallet.current_bookings.push(PalletOccupant {
            booking_id: booking_id.to_string(),
            vehicle_number: vehicle_number.to_uppercase(),
            position,
            occupied_since: now,
        });
        pallet.current_occupancy += 1;
        if pallet.current_occupancy == 1 {
            pallet.occupied_since = Some(now);
        }
        pallet.refresh_status();

        self.rebuild_capacity();
        self.updated_at = now;
        Ok(position)
    }

    /// Remove the occupant whose booking id matches.
    pub fn release_by_booking(
        &mut self,
        key: &PalletKey,
        booking_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<PalletOccupant> {
        self.release_where(key, now, |o| o.booking_id == booking_id, booking_id)
    }

    /// Remove the occupant whose plate matches (case-insensitive).
    pub fn release_vehicle(
        &mut self,
        key: &PalletKey,
        vehicle_number: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<PalletOccupant> {
        let plate = vehicle_number.to_uppercase();
        self.release_where(key, now, |o| o.vehicle_number == plate, vehicle_number)
    }

    fn release_where(
        &mut self,
        key: &PalletKey,
        now: DateTime<Utc>,
        matches: impl Fn(&PalletOccupant) -> bool,
        descriptor: &str,
    ) -> DomainResult<PalletOccupant> {
        let pallet = self
            .find_pallet_mut(key)
            .ok_or_else(|| DomainError::not_found("pallet", "key", key.to_string()))?;

        let idx = pallet
            .current_bookings
            .iter()
            .position(matches)
            .ok_or_else(|| DomainError::OccupantNotFound(descriptor.to_string()))?;

        let occupant = pallet.current_bookings.remove(idx);
        pallet.current_occupancy = pallet.current_occupancy.saturating_sub(1);
        if pallet.current_occupancy == 0 {
            pallet.occupied_since = None;
        }
        pallet.refresh_status();

        self.rebuild_capacity();
        self.updated_at = now;
        Ok(occupant)
    }

    /// Declare a pallet unsafe. Occupants are NOT released; the caller warns
    /// when occupancy is non-zero.
    pub fn set_pallet_maintenance(
        &mut self,
        key: &PalletKey,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<u8> {
        let pallet = self
            .find_pallet_mut(key)
            .ok_or_else(|| DomainError::not_found("pallet", "key", key.to_string()))?;
        pallet.status = PalletStatus::Maintenance;
        pallet.last_maintenance = Some(now);
        pallet.maintenance_notes = notes;
        let occupancy = pallet.current_occupancy;
        self.rebuild_capacity();
        self.updated_at = now;
        Ok(occupancy)
    }

    /// Operator clears maintenance; status re-derives from occupancy.
    pub fn clear_pallet_maintenance(
        &mut self,
        key: &PalletKey,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let pallet = self
            .find_pallet_mut(key)
            .ok_or_else(|| DomainError::not_found("pallet", "key", key.to_string()))?;
        pallet.status = PalletStatus::Available;
        pallet.refresh_status();
        self.rebuild_capacity();
        self.updated_at = now;
        Ok(())
    }

    pub fn heartbeat(&mut self, firmware_version: Option<String>, now: DateTime<Utc>) {
        self.integration.last_heartbeat = Some(now);
        self.integration.connection_status = ConnectionStatus::Connected;
        if let Some(fw) = firmware_version {
            self.integration.firmware_version = Some(fw);
        }
        self.updated_at = now;
    }

    /// Live iff the last heartbeat is within the 5-minute window.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.integration
            .last_heartbeat
            .is_some_and(|hb| now - hb <= Duration::minutes(LIVE_WINDOW_MINUTES))
    }

    pub fn total_occupancy(&self) -> u32 {
        self.pallets
            .iter()
            .map(|p| p.current_occupancy as u32)
            .sum()
    }

    /// First pallet that can take another vehicle right now.
    pub fn first_free_pallet(&self) -> Option<&Pallet> {
        self.pallets.iter().find(|p| p.has_free_space())
    }

    pub fn supports(&self, class: VehicleClass) -> bool {
        self.specs.supported_vehicle_classes.contains(&class)
    }

    pub fn record_service(&mut self, notes: impl Into<String>, performed_by: Option<String>) {
        let now = Utc::now();
        self.service_history.push(ServiceRecord {
            performed_at: now,
            notes: notes.into(),
            performed_by,
        });
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rotary_two_wheeler() -> Machine {
        Machine::new(
            "m1",
            "s1",
            "M001",
            MachineKind::Rotary,
            VehicleClass::TwoWheeler,
            8,
        )
    }

    fn rotary_four_wheeler() -> Machine {
        Machine::new(
            "m2",
            "s1",
            "M002",
            MachineKind::Rotary,
            VehicleClass::FourWheeler,
            4,
        )
    }

    fn assert_invariants(machine: &Machine) {
        for pallet in &machine.pallets {
            assert_eq!(
                pallet.current_occupancy as usize,
                pallet.current_bookings.len(),
                "occupancy mismatch on pallet {}",
                pallet.number
            );
            let mut positions: Vec<u8> =
                pallet.current_bookings.iter().map(|o| o.position).collect();
            positions.sort_unstable();
            positions.dedup();
            assert_eq!(
                positions.len(),
                pallet.current_bookings.len(),
                "duplicate positions on pallet {}",
                pallet.number
            );
            assert!(pallet.current_occupancy <= pallet.vehicle_capacity);
            match pallet.status {
                PalletStatus::Occupied => {
                    assert_eq!(pallet.current_occupancy, pallet.vehicle_capacity)
                }
                PalletStatus::Available => {
                    assert!(pallet.current_occupancy < pallet.vehicle_capacity)
                }
                _ => {}
            }
        }
        let occupied: u32 = machine
            .pallets
            .iter()
            .filter(|p| p.status == PalletStatus::Occupied)
            .map(|p| p.current_occupancy as u32)
            .sum();
        assert_eq!(machine.capacity.occupied, occupied);
    }

    #[test]
    fn rotary_pallets_number_sequentially() {
        let machine = rotary_two_wheeler();
        let numbers: Vec<u32> = machine.pallets.iter().map(|p| p.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6, 7, 8]);
        assert!(machine.pallets.iter().all(|p| p.vehicle_capacity == 6));
    }

    #[test]
    fn puzzle_pallets_number_four_per_floor() {
        let machine = Machine::new(
            "m3",
            "s1",
            "M003",
            MachineKind::Puzzle,
            VehicleClass::TwoWheeler,
            10,
        );
        let numbers: Vec<u32> = machine.pallets.iter().map(|p| p.number).collect();
        // 10 is not a multiple of 4: the third floor stays under-filled.
        assert_eq!(numbers, vec![101, 102, 103, 104, 201, 202, 203, 204, 301, 302]);
        assert!(machine.pallets.iter().all(|p| p.vehicle_capacity == 3));
    }

    #[test]
    fn two_wheeler_pallet_fills_and_drains() {
        // Six occupants get positions 1..=6; a release in the middle frees
        // the lowest slot for the next occupant.
        let mut machine = rotary_two_wheeler();
        let key = PalletKey::Number(1);
        let now = Utc::now();

        for (i, booking) in ["B1", "B2", "B3", "B4", "B5", "B6"].iter().enumerate() {
            let plate = format!("KA01AB{:04}", 1001 + i);
            let pos = machine
                .occupy_pallet(&key, booking, &plate, None, now)
                .unwrap();
            assert_eq!(pos as usize, i + 1);
            assert_invariants(&machine);
        }
        assert_eq!(machine.find_pallet(&key).unwrap().status, PalletStatus::Occupied);

        machine.release_by_booking(&key, "B3", now).unwrap();
        let pallet = machine.find_pallet(&key).unwrap();
        assert_eq!(pallet.status, PalletStatus::Available);
        assert_eq!(pallet.current_occupancy, 5);
        let mut positions: Vec<u8> = pallet.current_bookings.iter().map(|o| o.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![1, 2, 4, 5, 6]);

        let pos = machine
            .occupy_pallet(&key, "B7", "KA01AB1007", None, now)
            .unwrap();
        assert_eq!(pos, 3);
        assert_eq!(machine.find_pallet(&key).unwrap().status, PalletStatus::Occupied);
        assert_invariants(&machine);
    }

    #[test]
    fn four_wheeler_pallet_rejects_second_occupant() {
        let mut machine = rotary_four_wheeler();
        let key = PalletKey::Number(1);
        let now = Utc::now();

        // Caller-supplied position is overridden to 1 on four-wheeler machines.
        let pos = machine
            .occupy_pallet(&key, "B10", "KA05MH1234", Some(4), now)
            .unwrap();
        assert_eq!(pos, 1);

        let err = machine
            .occupy_pallet(&key, "B11", "KA05MH5678", None, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::PalletFull { .. }));
        assert_invariants(&machine);
    }

    #[test]
    fn occupy_checks_run_in_order() {
        let mut machine = rotary_two_wheeler();
        let now = Utc::now();

        machine.status = MachineStatus::Offline;
        let err = machine
            .occupy_pallet(&PalletKey::Number(1), "B1", "KA01AB1001", None, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::MachineOffline(_)));

        machine.status = MachineStatus::Online;
        let err = machine
            .occupy_pallet(&PalletKey::Number(99), "B1", "KA01AB1001", None, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));

        machine
            .set_pallet_maintenance(&PalletKey::Number(2), None, now)
            .unwrap();
        let err = machine
            .occupy_pallet(&PalletKey::Number(2), "B1", "KA01AB1001", None, now)
            .unwrap_err();
        assert!(matches!(err, DomainError::PalletMaintenance { .. }));
    }

    #[test]
    fn explicit_position_conflicts_are_rejected() {
        let mut machine = rotary_two_wheeler();
        let key = PalletKey::Number(1);
        let now = Utc::now();

        machine
            .occupy_pallet(&key, "B1", "KA01AB1001", Some(2), now)
            .unwrap();
        let err = machine
            .occupy_pallet(&key, "B2", "KA01AB1002", Some(2), now)
            .unwrap_err();
        assert!(matches!(err, DomainError::PositionTaken(2)));

        let err = machine
            .occupy_pallet(&key, "B3", "KA01AB1003", Some(9), now)
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn occupy_then_release_restores_pre_state() {
        let mut machine = rotary_four_wheeler();
        let key = PalletKey::Number(2);
        let now = Utc::now();

        machine
            .occupy_pallet(&key, "B40", "KA05MH0001", None, now)
            .unwrap();
        assert_eq!(machine.find_pallet(&key).unwrap().status, PalletStatus::Occupied);

        machine.release_by_booking(&key, "B40", now).unwrap();
        let pallet = machine.find_pallet(&key).unwrap();
        assert_eq!(pallet.status, PalletStatus::Available);
        assert_eq!(pallet.current_occupancy, 0);
        assert!(pallet.occupied_since.is_none());
        assert!(pallet.current_bookings.is_empty());
        assert_invariants(&machine);
    }

    #[test]
    fn release_vehicle_matches_plate_case_insensitively() {
        let mut machine = rotary_two_wheeler();
        let key = PalletKey::Number(1);
        let now = Utc::now();

        machine
            .occupy_pallet(&key, "B1", "ka01ab1001", None, now)
            .unwrap();
        let released = machine.release_vehicle(&key, "KA01AB1001", now).unwrap();
        assert_eq!(released.booking_id, "B1");

        let err = machine.release_vehicle(&key, "KA01AB9999", now).unwrap_err();
        assert!(matches!(err, DomainError::OccupantNotFound(_)));
    }

    #[test]
    fn pallet_key_matches_number_and_name() {
        let mut machine = rotary_two_wheeler();
        machine.pallets[0].custom_name = Some("GroundTray".into());
        assert!(machine.find_pallet(&PalletKey::Name("GroundTray".into())).is_some());
        assert!(machine.find_pallet(&PalletKey::Name("1".into())).is_some());
        assert!(machine.find_pallet(&PalletKey::Number(1)).is_some());
        assert!(machine.find_pallet(&PalletKey::Name("NoSuch".into())).is_none());
    }

    #[test]
    fn maintenance_keeps_occupants_and_reports_occupancy() {
        let mut machine = rotary_two_wheeler();
        let key = PalletKey::Number(1);
        let now = Utc::now();

        machine
            .occupy_pallet(&key, "B1", "KA01AB1001", None, now)
            .unwrap();
        let occupancy = machine
            .set_pallet_maintenance(&key, Some("lift chain slack".into()), now)
            .unwrap();
        assert_eq!(occupancy, 1);
        let pallet = machine.find_pallet(&key).unwrap();
        assert_eq!(pallet.status, PalletStatus::Maintenance);
        assert_eq!(pallet.current_bookings.len(), 1);
        assert_eq!(machine.capacity.maintenance, 1);

        machine.clear_pallet_maintenance(&key, now).unwrap();
        assert_eq!(machine.find_pallet(&key).unwrap().status, PalletStatus::Available);
    }

    #[test]
    fn retarget_clamps_occupants_destructively() {
        let mut machine = rotary_two_wheeler();
        let key = PalletKey::Number(1);
        let now = Utc::now();
        for i in 0..3 {
            machine
                .occupy_pallet(&key, &format!("B{}", i), &format!("KA01AB{:04}", i), None, now)
                .unwrap();
        }

        let truncated = machine.retarget(MachineKind::Rotary, VehicleClass::FourWheeler);
        assert!(truncated);
        let pallet = machine.find_pallet(&key).unwrap();
        assert_eq!(pallet.vehicle_capacity, 1);
        assert_eq!(pallet.current_occupancy, 1);
        assert_eq!(pallet.current_bookings.len(), 1);
        assert_eq!(pallet.status, PalletStatus::Occupied);
    }

    #[test]
    fn heartbeat_drives_liveness_window() {
        let mut machine = rotary_two_wheeler();
        let now = Utc::now();
        assert!(!machine.is_live(now));

        machine.heartbeat(Some("fw-2.4.1".into()), now);
        assert!(machine.is_live(now));
        assert!(machine.is_live(now + Duration::minutes(5)));
        assert!(!machine.is_live(now + Duration::minutes(5) + Duration::seconds(1)));
        assert_eq!(machine.integration.connection_status, ConnectionStatus::Connected);
        assert_eq!(machine.integration.firmware_version.as_deref(), Some("fw-2.4.1"));
    }

    #[test]
    fn capacity_counters_follow_occupancy() {
        let mut machine = rotary_two_wheeler();
        let now = Utc::now();
        assert_eq!(machine.capacity.available, 8 * 6);
        assert_eq!(machine.capacity.occupied, 0);

        for i in 0..6 {
            machine
                .occupy_pallet(
                    &PalletKey::Number(1),
                    &format!("B{}", i),
                    &format!("KA01AB{:04}", i),
                    None,
                    now,
                )
                .unwrap();
        }
        assert_eq!(machine.capacity.occupied, 6);
        assert_eq!(machine.capacity.available, 7 * 6);
        assert_eq!(machine.total_occupancy(), 6);
    }
}
