//! Booking engine
//!
//! The session lifecycle. A booking commit is the operational source of
//! truth; the pallet occupy/release that accompanies every transition is a
//! best-effort side-effect that is logged and counted, never rolled back —
//! the physical mechanism occasionally rejects operations and operators must
//! still record sessions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::machine::{MachineService, ReleaseBy};
use crate::domain::{
    Booking, BookingPayment, BookingStatus, Customer, OtpBlock, PaymentMethod, PaymentStatus,
    Vehicle, VehicleClass,
};
use crate::shared::ids;
use crate::shared::types::{DomainError, DomainResult, PageRequest, PaginatedResult};
use crate::shared::validations;
use crate::storage::Storage;

/// Result cap for booking search.
const SEARCH_CAP: usize = 50;

/// Waits before the second and third attempt of a pallet side-effect whose
/// store call came back transient.
const SIDE_EFFECT_RETRY_DELAYS: [Duration; 2] =
    [Duration::from_millis(100), Duration::from_millis(400)];

#[derive(Debug, Clone)]
pub struct CreateBookingInput {
    pub customer_name: String,
    pub phone_number: String,
    pub vehicle_number: String,
    pub vehicle_class: VehicleClass,
    pub machine_number: String,
    pub pallet_number: i64,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub special_instructions: Option<String>,
}

/// Creation result plus the flags the response layer uses to pick a message.
#[derive(Debug)]
pub struct CreateBookingOutcome {
    pub booking: Booking,
    pub is_new_customer: bool,
    pub customer_name_updated: bool,
}

#[derive(Debug, Clone)]
pub struct PaymentInput {
    pub amount: f64,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
    pub membership_number: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BookingFilters {
    pub site_id: Option<String>,
    pub status: Option<BookingStatus>,
    pub machine_number: Option<String>,
    pub vehicle_number: Option<String>,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub search: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingSearchFilter {
    Vehicle,
    Pallet,
    Otp,
    Customer,
    Phone,
    All,
}

impl BookingSearchFilter {
    pub fn from_str(s: &str) -> Self {
        match s {
            "vehicle" => Self::Vehicle,
            "pallet" => Self::Pallet,
            "otp" => Self::Otp,
            "customer" => Self::Customer,
            "phone" => Self::Phone,
            _ => Self::All,
        }
    }
}

/// Totals by status plus completed revenue over a date window.
#[derive(Debug, Clone, Copy, Default)]
pub struct BookingStats {
    pub total: u64,
    pub active: u64,
    pub completed: u64,
    pub cancelled: u64,
    pub expired: u64,
    pub revenue: f64,
}

/// Service for the booking lifecycle
pub struct BookingService {
    storage: Arc<dyn Storage>,
    machines: Arc<MachineService>,
    otp_ttl_minutes: i64,
}

impl BookingService {
    pub fn new(
        storage: Arc<dyn Storage>,
        machines: Arc<MachineService>,
        otp_ttl_minutes: i64,
    ) -> Self {
        Self {
            storage,
            machines,
            otp_ttl_minutes,
        }
    }

    /// Create a session. The machine code and pallet number are validated
    /// for shape only — deliberately no capacity or existence check, so an
    /// operator can record a session even when the pallet engine disagrees
    /// (overbooking for operational recovery).
    pub async fn create_booking(
        &self,
        input: CreateBookingInput,
        actor: Option<String>,
        site_id: Option<String>,
    ) -> DomainResult<CreateBookingOutcome> {
        let Some(site_id) = site_id else {
            return Err(DomainError::BadRequest(
                "no site context: caller has no primary or assigned site".to_string(),
            ));
        };

        let name = validations::sanitize(&input.customer_name);
        validations::validate_name("customerName", &name)?;
        validations::validate_phone(&input.phone_number)?;
        let plate = validations::normalize_plate(&input.vehicle_number)?;
        validations::validate_machine_code(&input.machine_number)?;
        let pallet_number = validations::validate_pallet_number(input.pallet_number)?;
        if let Some(email) = &input.email {
            validations::validate_email(email)?;
        }

        let now = Utc::now();
        let (customer, is_new_customer, customer_name_updated) = self
            .resolve_customer(&name, &input.phone_number, &plate, input.vehicle_class, &actor)
            .await?;

        let otp = OtpBlock::issue(
            ids::otp_code(&mut rand::thread_rng()),
            now,
            self.otp_ttl_minutes,
        );
        let mut booking = Booking::new(
            ids::entity_id(),
            ids::booking_number(input.vehicle_class, now),
            customer.id.clone(),
            customer.full_name(),
            customer.phone.clone(),
            plate.clone(),
            input.vehicle_class,
            input.machine_number.to_uppercase(),
            pallet_number,
            site_id.clone(),
            otp,
            now,
        );
        booking.created_by = actor.clone();
        booking.notes = input.notes.as_deref().map(validations::sanitize);
        booking.special_instructions =
            input.special_instructions.as_deref().map(validations::sanitize);

        self.storage.insert_booking(booking.clone()).await?;
        info!(
            booking_number = %booking.number,
            machine = %booking.machine_number,
            pallet = booking.pallet_number,
            "Booking created"
        );

        // Best-effort pallet occupy; the booking stands regardless.
        self.occupy_side_effect(&booking).await;

        // Statistics bump is best-effort too.
        let mut customer = customer;
        customer.record_booking(None, now);
        if let Err(e) = self.storage.update_customer(customer).await {
            warn!(error = %e, "Failed to update customer statistics");
        }

        Ok(CreateBookingOutcome {
            booking,
            is_new_customer,
            customer_name_updated,
        })
    }

    /// Resolve the customer by phone, creating or updating as needed. The
    /// operator-entered name is authoritative and overwrites a differing
    /// stored name.
    async fn resolve_customer(
        &self,
        name: &str,
        phone: &str,
        plate: &str,
        vehicle_class: VehicleClass,
        actor: &Option<String>,
    ) -> DomainResult<(Customer, bool, bool)> {
        let now = Utc::now();
        match self.storage.find_active_customer_by_phone(phone).await? {
            Some(mut customer) => {
                let mut name_updated = false;
                if customer.full_name() != name {
                    customer.set_full_name(name);
                    name_updated = true;
                }
                if customer.find_active_vehicle(plate).is_none() {
                    customer.vehicles.push(Vehicle::new(
                        ids::entity_id(),
                        plate,
                        vehicle_class,
                        actor.clone(),
                    ));
                }
                customer.updated_at = now;
                customer.updated_by = actor.clone();
                self.storage.update_customer(customer.clone()).await?;
                Ok((customer, false, name_updated))
            }
            None => {
                let mut customer = Customer::new(
                    ids::entity_id(),
                    ids::customer_code(now),
                    "",
                    "",
                    phone,
                );
                customer.set_full_name(name);
                customer.created_by = actor.clone();
                customer.vehicles.push(Vehicle::new(
                    ids::entity_id(),
                    plate,
                    vehicle_class,
                    actor.clone(),
                ));
                self.storage.insert_customer(customer.clone()).await?;
                Ok((customer, true, false))
            }
        }
    }

    /// Redeem a retrieval OTP. The consume is a single atomic
    /// check-then-set in the store; a second call with the same code fails.
    pub async fn verify_otp(&self, code: &str) -> DomainResult<Booking> {
        validations::validate_otp(code)?;
        let now = Utc::now();
        self.storage
            .redeem_booking_otp(code, now)
            .await?
            .ok_or_else(|| DomainError::BadRequest("invalid or expired OTP".to_string()))
    }

    /// Replace the OTP with a fresh 30-minute one; active bookings only.
    pub async fn regenerate_otp(
        &self,
        booking_id: &str,
        actor: Option<String>,
    ) -> DomainResult<Booking> {
        let mut booking = self.get_booking(booking_id).await?;
        let now = Utc::now();
        let otp = OtpBlock::issue(
            ids::otp_code(&mut rand::thread_rng()),
            now,
            self.otp_ttl_minutes,
        );
        booking.reissue_otp(otp, now)?;
        booking.updated_by = actor;
        self.storage.update_booking(booking.clone()).await?;
        info!(booking_number = %booking.number, "OTP regenerated");
        Ok(booking)
    }

    /// Complete a session: payment capture, pallet release by plate,
    /// customer revenue counters.
    pub async fn complete_booking(
        &self,
        booking_id: &str,
        payment: Option<PaymentInput>,
        actor: Option<String>,
    ) -> DomainResult<Booking> {
        let mut booking = self.get_booking(booking_id).await?;
        let now = Utc::now();
        let amount = payment.as_ref().map(|p| p.amount);
        booking.complete(
            payment.map(|p| BookingPayment {
                amount: p.amount,
                method: p.method,
                status: PaymentStatus::Pending,
                transaction_ref: p.transaction_ref,
                paid_at: None,
                membership_number: p.membership_number,
                base_rate: None,
                additional_charges: 0.0,
                discount: 0.0,
                tax: 0.0,
            }),
            actor,
            now,
        )?;
        self.storage.update_booking(booking.clone()).await?;
        info!(
            booking_number = %booking.number,
            duration_hours = booking.duration(now).hours,
            "Booking completed"
        );

        self.release_side_effect(&booking, ReleaseBy::Vehicle(booking.vehicle_number.clone()))
            .await;

        if let Ok(Some(mut customer)) = self.storage.get_customer(&booking.customer_id).await {
            if let Some(amount) = amount {
                customer.total_amount += amount;
            }
            customer.last_booking_at = Some(now);
            customer.updated_at = now;
            if let Err(e) = self.storage.update_customer(customer).await {
                warn!(error = %e, "Failed to update customer statistics");
            }
        }

        Ok(booking)
    }

    /// Cancel a session; releases the pallet occupant by booking id.
    pub async fn cancel_booking(
        &self,
        booking_id: &str,
        reason: Option<String>,
        actor: Option<String>,
    ) -> DomainResult<Booking> {
        let mut booking = self.get_booking(booking_id).await?;
        let now = Utc::now();
        booking.cancel(reason.as_deref(), now)?;
        booking.updated_by = actor;
        self.storage.update_booking(booking.clone()).await?;
        info!(booking_number = %booking.number, "Booking cancelled");

        self.release_side_effect(&booking, ReleaseBy::Booking(booking.id.clone()))
            .await;
        Ok(booking)
    }

    /// Record an extension; the OTP expiry is untouched.
    pub async fn extend_booking(
        &self,
        booking_id: &str,
        hours: i64,
        minutes: i64,
        reason: Option<String>,
        actor: Option<String>,
    ) -> DomainResult<Booking> {
        let mut booking = self.get_booking(booking_id).await?;
        booking.extend(hours, minutes, reason.as_deref(), Utc::now())?;
        booking.updated_by = actor;
        self.storage.update_booking(booking.clone()).await?;
        Ok(booking)
    }

    /// Update free-text fields and/or the vehicle class.
    pub async fn update_booking(
        &self,
        booking_id: &str,
        notes: Option<String>,
        special_instructions: Option<String>,
        vehicle_class: Option<VehicleClass>,
        actor: Option<String>,
    ) -> DomainResult<Booking> {
        let mut booking = self.get_booking(booking_id).await?;
        if let Some(notes) = notes {
            booking.notes = Some(validations::sanitize(&notes));
        }
        if let Some(instructions) = special_instructions {
            booking.special_instructions = Some(validations::sanitize(&instructions));
        }
        if let Some(class) = vehicle_class {
            booking.vehicle_class = class;
        }
        booking.updated_by = actor;
        booking.updated_at = Utc::now();
        self.storage.update_booking(booking.clone()).await?;
        Ok(booking)
    }

    pub async fn get_booking(&self, id: &str) -> DomainResult<Booking> {
        self.storage
            .get_booking(id)
            .await?
            .ok_or_else(|| DomainError::not_found("booking", "id", id))
    }

    /// Filtered, paginated listing, newest sessions first.
    pub async fn list_bookings(
        &self,
        filters: BookingFilters,
        page: PageRequest,
    ) -> DomainResult<PaginatedResult<Booking>> {
        let mut bookings = self.storage.list_bookings().await?;
        bookings.retain(|b| Self::matches_filters(b, &filters));
        bookings.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(PaginatedResult::paginate(bookings, page))
    }

    fn matches_filters(booking: &Booking, filters: &BookingFilters) -> bool {
        if let Some(site_id) = &filters.site_id {
            if &booking.site_id != site_id {
                return false;
            }
        }
        if let Some(status) = filters.status {
            if booking.status != status {
                return false;
            }
        }
        if let Some(machine) = &filters.machine_number {
            if !booking.machine_number.eq_ignore_ascii_case(machine) {
                return false;
            }
        }
        if let Some(vehicle) = &filters.vehicle_number {
            if !booking.vehicle_number.eq_ignore_ascii_case(vehicle) {
                return false;
            }
        }
        if let Some(from) = filters.date_from {
            if booking.start_time < from {
                return false;
            }
        }
        if let Some(to) = filters.date_to {
            if booking.start_time > to {
                return false;
            }
        }
        if let Some(search) = &filters.search {
            let q = search.to_lowercase();
            let hit = booking.customer_name.to_lowercase().contains(&q)
                || booking.phone_number.contains(&q)
                || booking.vehicle_number.to_lowercase().contains(&q)
                || booking.number.to_lowercase().contains(&q)
                || booking.otp.code.contains(&q);
            if !hit {
                return false;
            }
        }
        true
    }

    /// Substring search over one dimension, capped at 50.
    pub async fn search_bookings(
        &self,
        query: &str,
        filter: BookingSearchFilter,
    ) -> DomainResult<Vec<Booking>> {
        let q = query.trim().to_lowercase();
        if q.is_empty() {
            return Err(DomainError::BadRequest("empty search query".to_string()));
        }
        let bookings = self.storage.list_bookings().await?;
        Ok(bookings
            .into_iter()
            .filter(|b| {
                let vehicle = b.vehicle_number.to_lowercase().contains(&q);
                let pallet = b.pallet_number.to_string().contains(&q);
                let otp = b.otp.code.contains(&q);
                let customer = b.customer_name.to_lowercase().contains(&q);
                let phone = b.phone_number.contains(&q);
                match filter {
                    BookingSearchFilter::Vehicle => vehicle,
                    BookingSearchFilter::Pallet => pallet,
                    BookingSearchFilter::Otp => otp,
                    BookingSearchFilter::Customer => customer,
                    BookingSearchFilter::Phone => phone,
                    BookingSearchFilter::All => {
                        vehicle || pallet || otp || customer || phone
                    }
                }
            })
            .take(SEARCH_CAP)
            .collect())
    }

    pub async fn bookings_by_machine(
        &self,
        machine_code: &str,
        status: Option<BookingStatus>,
    ) -> DomainResult<Vec<Booking>> {
        let bookings = self.storage.list_bookings().await?;
        Ok(bookings
            .into_iter()
            .filter(|b| b.machine_number.eq_ignore_ascii_case(machine_code))
            .filter(|b| status.map_or(true, |s| b.status == s))
            .collect())
    }

    pub async fn bookings_by_vehicle(&self, plate: &str) -> DomainResult<Vec<Booking>> {
        let plate = plate.to_uppercase();
        let bookings = self.storage.list_bookings().await?;
        Ok(bookings
            .into_iter()
            .filter(|b| b.vehicle_number == plate)
            .collect())
    }

    pub async fn active_bookings(&self) -> DomainResult<Vec<Booking>> {
        let bookings = self.storage.list_bookings().await?;
        Ok(bookings
            .into_iter()
            .filter(|b| b.status == BookingStatus::Active)
            .collect())
    }

    /// Totals by status plus summed completed revenue.
    pub async fn booking_stats(
        &self,
        date_from: Option<DateTime<Utc>>,
        date_to: Option<DateTime<Utc>>,
    ) -> DomainResult<BookingStats> {
        let bookings = self.storage.list_bookings().await?;
        let mut stats = BookingStats::default();
        for booking in bookings.iter() {
            if date_from.is_some_and(|from| booking.start_time < from) {
                continue;
            }
            if date_to.is_some_and(|to| booking.start_time > to) {
                continue;
            }
            stats.total += 1;
            match booking.status {
                BookingStatus::Active => stats.active += 1,
                BookingStatus::Completed => {
                    stats.completed += 1;
                    if let Some(payment) = &booking.payment {
                        if payment.status == PaymentStatus::Completed {
                            stats.revenue += payment.amount;
                        }
                    }
                }
                BookingStatus::Cancelled => stats.cancelled += 1,
                BookingStatus::Expired => stats.expired += 1,
            }
        }
        Ok(stats)
    }

    /// Attempt the pallet occupy that accompanies every creation.
    async fn occupy_side_effect(&self, booking: &Booking) {
        self.pallet_side_effect("occupy", booking, || {
            self.machines.occupy_for_booking(
                &booking.site_id,
                &booking.machine_number,
                booking.pallet_number,
                &booking.id,
                &booking.vehicle_number,
            )
        })
        .await;
    }

    /// Attempt the pallet release that accompanies every terminal
    /// transition. A missing occupant is tolerated the same way.
    async fn release_side_effect(&self, booking: &Booking, identity: ReleaseBy) {
        self.pallet_side_effect("release", booking, || {
            self.machines.release_for_booking(
                &booking.site_id,
                &booking.machine_number,
                booking.pallet_number,
                identity.clone(),
            )
        })
        .await;
    }

    /// Drive one pallet side-effect to success or exhaustion. A transient
    /// store failure gets the short retry ladder; anything still failing
    /// after that is logged and counted, never propagated — the booking
    /// record is authoritative and pallet state is reconciled manually.
    async fn pallet_side_effect<F, Fut>(&self, op: &'static str, booking: &Booking, mut attempt: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DomainResult<()>>,
    {
        let mut outcome = attempt().await;
        for delay in SIDE_EFFECT_RETRY_DELAYS {
            match &outcome {
                Err(e) if e.is_transient() => {
                    warn!(
                        booking_number = %booking.number,
                        op,
                        error = %e,
                        retry_in_ms = delay.as_millis() as u64,
                        "Transient store failure during pallet side-effect"
                    );
                    tokio::time::sleep(delay).await;
                    outcome = attempt().await;
                }
                _ => break,
            }
        }

        if let Err(e) = outcome {
            warn!(
                booking_number = %booking.number,
                machine = %booking.machine_number,
                pallet = booking.pallet_number,
                op,
                error = %e,
                "Pallet side-effect failed; booking stands, reconcile manually"
            );
            metrics::counter!("pallet_side_effect_failures_total", "op" => op).increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, MachineKind, PalletKey, PalletStatus, Site};
    use crate::services::machine::CreateMachineInput;
    use crate::storage::InMemoryStorage;

    async fn harness() -> (BookingService, Arc<MachineService>, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        storage
            .insert_site(Site::new(
                "s1",
                "SITE001",
                "Central Yard",
                Address {
                    line1: None,
                    city: "Bengaluru".into(),
                    state: "KA".into(),
                    pincode: "560001".into(),
                },
            ))
            .await
            .unwrap();
        let machines = Arc::new(MachineService::new(storage.clone()));
        let bookings = BookingService::new(storage.clone(), machines.clone(), 30);
        (bookings, machines, storage)
    }

    fn booking_input(machine: &str, pallet: i64, plate: &str) -> CreateBookingInput {
        CreateBookingInput {
            customer_name: "Asha Rao".into(),
            phone_number: "9876543210".into(),
            vehicle_number: plate.into(),
            vehicle_class: VehicleClass::TwoWheeler,
            machine_number: machine.into(),
            pallet_number: pallet,
            email: None,
            notes: None,
            special_instructions: None,
        }
    }

    #[tokio::test]
    async fn create_books_pallet_and_customer() {
        let (service, machines, _) = harness().await;
        let machine = machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 8,
                pricing: None,
            })
            .await
            .unwrap();

        let outcome = service
            .create_booking(booking_input("M001", 1, "ka01ab1001"), Some("OP100".into()), Some("s1".into()))
            .await
            .unwrap();
        assert!(outcome.is_new_customer);
        assert!(!outcome.customer_name_updated);
        assert!(outcome.booking.number.starts_with("BKTW"));
        assert_eq!(outcome.booking.vehicle_number, "KA01AB1001");
        assert_eq!(outcome.booking.otp.code.len(), 6);

        let loaded = machines.get_machine(&machine.id).await.unwrap();
        let pallet = loaded.find_pallet(&PalletKey::Number(1)).unwrap();
        assert_eq!(pallet.current_occupancy, 1);
        assert_eq!(pallet.current_bookings[0].booking_id, outcome.booking.id);
    }

    #[tokio::test]
    async fn create_requires_site_context() {
        let (service, _, _) = harness().await;
        let err = service
            .create_booking(booking_input("M001", 1, "KA01AB1001"), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn second_booking_reuses_customer_and_updates_name() {
        let (service, machines, storage) = harness().await;
        machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 8,
                pricing: None,
            })
            .await
            .unwrap();

        let first = service
            .create_booking(booking_input("M001", 1, "KA01AB1001"), None, Some("s1".into()))
            .await
            .unwrap();

        let mut input = booking_input("M001", 1, "KA01AB2002");
        input.customer_name = "Asha R".into();
        let second = service
            .create_booking(input, None, Some("s1".into()))
            .await
            .unwrap();

        assert!(!second.is_new_customer);
        assert!(second.customer_name_updated);
        assert_eq!(second.booking.customer_id, first.booking.customer_id);

        let customer = storage
            .get_customer(&second.booking.customer_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customer.full_name(), "Asha R");
        assert_eq!(customer.total_bookings, 2);
        assert_eq!(customer.vehicles.len(), 2);
    }

    #[tokio::test]
    async fn overbooking_survives_missing_pallet() {
        // Scenario: booking on pallet 99 which the machine does not have.
        let (service, machines, _) = harness().await;
        machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M003".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 4,
                pricing: None,
            })
            .await
            .unwrap();

        let outcome = service
            .create_booking(booking_input("M003", 99, "KA01AB3003"), None, Some("s1".into()))
            .await
            .unwrap();
        assert_eq!(outcome.booking.status, BookingStatus::Active);
        assert_eq!(outcome.booking.pallet_number, 99);

        let listed = service.bookings_by_machine("M003", None).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, outcome.booking.id);
    }

    #[tokio::test]
    async fn otp_lifecycle_single_use() {
        let (service, machines, _) = harness().await;
        machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 8,
                pricing: None,
            })
            .await
            .unwrap();

        let outcome = service
            .create_booking(booking_input("M001", 1, "KA01AB1001"), None, Some("s1".into()))
            .await
            .unwrap();
        let code = outcome.booking.otp.code.clone();

        let redeemed = service.verify_otp(&code).await.unwrap();
        assert_eq!(redeemed.id, outcome.booking.id);
        assert!(redeemed.otp.is_used);
        assert_eq!(redeemed.status, BookingStatus::Active);

        let err = service.verify_otp(&code).await.unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn regenerated_otp_replaces_old_code() {
        let (service, machines, _) = harness().await;
        machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 8,
                pricing: None,
            })
            .await
            .unwrap();
        let outcome = service
            .create_booking(booking_input("M001", 1, "KA01AB1001"), None, Some("s1".into()))
            .await
            .unwrap();
        let old_code = outcome.booking.otp.code.clone();

        let updated = service
            .regenerate_otp(&outcome.booking.id, None)
            .await
            .unwrap();
        assert!(!updated.otp.is_used);

        if updated.otp.code != old_code {
            let err = service.verify_otp(&old_code).await;
            assert!(err.is_err());
        }
        service.verify_otp(&updated.otp.code).await.unwrap();
    }

    #[tokio::test]
    async fn completion_captures_payment_and_frees_pallet() {
        let (service, machines, _) = harness().await;
        let machine = machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::FourWheeler,
                total_pallets: 4,
                pricing: None,
            })
            .await
            .unwrap();

        let mut input = booking_input("M001", 2, "KA05MH1234");
        input.vehicle_class = VehicleClass::FourWheeler;
        let outcome = service
            .create_booking(input, None, Some("s1".into()))
            .await
            .unwrap();

        let loaded = machines.get_machine(&machine.id).await.unwrap();
        assert_eq!(
            loaded.find_pallet(&PalletKey::Number(2)).unwrap().status,
            PalletStatus::Occupied
        );

        let completed = service
            .complete_booking(
                &outcome.booking.id,
                Some(PaymentInput {
                    amount: 120.0,
                    method: PaymentMethod::Card,
                    transaction_ref: Some("TXN42".into()),
                    membership_number: None,
                }),
                Some("OP100".into()),
            )
            .await
            .unwrap();
        assert_eq!(completed.status, BookingStatus::Completed);
        let payment = completed.payment.as_ref().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert!(payment.paid_at.is_some());

        let loaded = machines.get_machine(&machine.id).await.unwrap();
        let pallet = loaded.find_pallet(&PalletKey::Number(2)).unwrap();
        assert_eq!(pallet.status, PalletStatus::Available);
        assert_eq!(pallet.current_occupancy, 0);
        assert!(pallet.occupied_since.is_none());

        // Terminal: a second completion is illegal.
        let err = service
            .complete_booking(&completed.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn cancellation_releases_pallet_and_keeps_reason() {
        let (service, machines, _) = harness().await;
        let machine = machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::FourWheeler,
                total_pallets: 4,
                pricing: None,
            })
            .await
            .unwrap();

        let mut input = booking_input("M001", 2, "KA05MH7777");
        input.vehicle_class = VehicleClass::FourWheeler;
        let outcome = service
            .create_booking(input, None, Some("s1".into()))
            .await
            .unwrap();

        let cancelled = service
            .cancel_booking(&outcome.booking.id, Some("customer left".into()), None)
            .await
            .unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert!(cancelled.notes.as_deref().unwrap().contains("customer left"));

        let loaded = machines.get_machine(&machine.id).await.unwrap();
        let pallet = loaded.find_pallet(&PalletKey::Number(2)).unwrap();
        assert_eq!(pallet.status, PalletStatus::Available);
        assert_eq!(pallet.current_occupancy, 0);
        assert!(pallet.occupied_since.is_none());

        let err = service
            .cancel_booking(&cancelled.id, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn listing_filters_and_sorts() {
        let (service, machines, _) = harness().await;
        machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 8,
                pricing: None,
            })
            .await
            .unwrap();

        let first = service
            .create_booking(booking_input("M001", 1, "KA01AB1001"), None, Some("s1".into()))
            .await
            .unwrap();
        service
            .cancel_booking(&first.booking.id, None, None)
            .await
            .unwrap();
        service
            .create_booking(booking_input("M001", 1, "KA01AB2002"), None, Some("s1".into()))
            .await
            .unwrap();

        let all = service
            .list_bookings(
                BookingFilters {
                    site_id: Some("s1".into()),
                    ..Default::default()
                },
                PageRequest { page: 1, limit: 20 },
            )
            .await
            .unwrap();
        assert_eq!(all.total, 2);

        let active_only = service
            .list_bookings(
                BookingFilters {
                    status: Some(BookingStatus::Active),
                    ..Default::default()
                },
                PageRequest { page: 1, limit: 20 },
            )
            .await
            .unwrap();
        assert_eq!(active_only.total, 1);
        assert_eq!(active_only.items[0].vehicle_number, "KA01AB2002");

        let by_vehicle = service
            .search_bookings("ab2002", BookingSearchFilter::Vehicle)
            .await
            .unwrap();
        assert_eq!(by_vehicle.len(), 1);

        let stats = service.booking_stats(None, None).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.cancelled, 1);
    }

    #[tokio::test]
    async fn stats_sum_completed_revenue() {
        let (service, machines, _) = harness().await;
        machines
            .create_machine(CreateMachineInput {
                site_id: "s1".into(),
                code: "M001".into(),
                kind: MachineKind::Rotary,
                vehicle_class: VehicleClass::TwoWheeler,
                total_pallets: 8,
                pricing: None,
            })
            .await
            .unwrap();

        let outcome = service
            .create_booking(booking_input("M001", 1, "KA01AB1001"), None, Some("s1".into()))
            .await
            .unwrap();
        service
            .complete_booking(
                &outcome.booking.id,
                Some(PaymentInput {
                    amount: 60.0,
                    method: PaymentMethod::Cash,
                    transaction_ref: None,
                    membership_number: None,
                }),
                None,
            )
            .await
            .unwrap();

        let stats = service.booking_stats(None, None).await.unwrap();
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.revenue, 60.0);
    }
}
