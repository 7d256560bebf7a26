//! Customer and membership engine
//!
//! Customer CRUD, vehicle list maintenance and the customer-level
//! membership: issuance, in-place coverage extension, credential validation
//! and the append-only payment ledger.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::{
    Booking, BookingStatus, Customer, CustomerStatus, Membership, MembershipPayment,
    MembershipPlan, PaymentMethod, PaymentStatus, Vehicle, VehicleClass,
};
use crate::shared::ids;
use crate::shared::types::{DomainError, DomainResult};
use crate::shared::validations;
use crate::storage::Storage;

/// Retries for drawing a membership number before giving up.
const MEMBERSHIP_NUMBER_ATTEMPTS: u32 = 5;

/// Result cap for customer search.
const SEARCH_CAP: usize = 50;

#[derive(Debug, Clone)]
pub struct VehicleInput {
    pub plate: String,
    pub class: VehicleClass,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateCustomerInput {
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
    pub email: Option<String>,
    pub vehicles: Vec<VehicleInput>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerSearchKind {
    Phone,
    Name,
    Vehicle,
    All,
}

impl CustomerSearchKind {
    pub fn from_str(s: &str) -> Self {
        match s {
            "phone" => Self::Phone,
            "name" => Self::Name,
            "vehicle" => Self::Vehicle,
            _ => Self::All,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MembershipPaymentInput {
    pub amount: Option<f64>,
    pub method: PaymentMethod,
    pub transaction_ref: Option<String>,
}

/// Service for customer and membership operations
pub struct CustomerService {
    storage: Arc<dyn Storage>,
}

impl CustomerService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_customer(
        &self,
        input: CreateCustomerInput,
        actor: Option<String>,
    ) -> DomainResult<Customer> {
        validations::validate_name("firstName", &input.first_name)?;
        if !input.last_name.is_empty() {
            validations::validate_name("lastName", &input.last_name)?;
        }
        validations::validate_phone(&input.phone)?;
        if let Some(email) = &input.email {
            validations::validate_email(email)?;
        }

        if self
            .storage
            .find_active_customer_by_phone(&input.phone)
            .await?
            .is_some()
        {
            return Err(DomainError::Conflict(format!(
                "customer with phone {} already exists",
                input.phone
            )));
        }

        let now = Utc::now();
        let mut customer = Customer::new(
            ids::entity_id(),
            ids::customer_code(now),
            input.first_name.trim(),
            input.last_name.trim(),
            input.phone,
        );
        customer.email = input.email;
        customer.created_by = actor.clone();
        for vehicle in input.vehicles {
            let plate = validations::normalize_plate(&vehicle.plate)?;
            let mut v = Vehicle::new(ids::entity_id(), plate, vehicle.class, actor.clone());
            v.make = vehicle.make;
            v.model = vehicle.model;
            v.color = vehicle.color;
            customer.vehicles.push(v);
        }

        self.storage.insert_customer(customer.clone()).await?;
        info!(customer_code = %customer.code, phone = %customer.phone, "Customer created");
        Ok(customer)
    }

    pub async fn find_by_phone(&self, phone: &str) -> DomainResult<Option<Customer>> {
        validations::validate_phone(phone)?;
        self.storage.find_active_customer_by_phone(phone).await
    }

    pub async fn get_customer(&self, id: &str) -> DomainResult<Customer> {
        self.storage
            .get_customer(id)
            .await?
            .ok_or_else(|| DomainError::not_found("customer", "id", id))
    }

    pub async fn list_customers(&self) -> DomainResult<Vec<Customer>> {
        self.storage.list_customers().await
    }

    /// Case-insensitive substring search, capped at 50 results.
    pub async fn search_customers(
        &self,
        query: &str,
        kind: CustomerSearchKind,
    ) -> DomainResult<Vec<Customer>> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < 2 {
            return Err(DomainError::BadRequest(
                "search query must be at least 2 characters".to_string(),
            ));
        }

        let customers = self.storage.list_customers().await?;
        let matches = customers
            .into_iter()
            .filter(|c| c.is_active())
            .filter(|c| {
                let phone_hit = c.phone.contains(&query);
                let name_hit = c.full_name().to_lowercase().contains(&query);
                let vehicle_hit = c
                    .vehicles
                    .iter()
                    .any(|v| v.is_active && v.plate.to_lowercase().contains(&query));
                match kind {
                    CustomerSearchKind::Phone => phone_hit,
                    CustomerSearchKind::Name => name_hit,
                    CustomerSearchKind::Vehicle => vehicle_hit,
                    CustomerSearchKind::All => phone_hit || name_hit || vehicle_hit,
                }
            })
            .take(SEARCH_CAP)
            .collect();
        Ok(matches)
    }

    pub async fn add_vehicle(
        &self,
        customer_id: &str,
        input: VehicleInput,
        actor: Option<String>,
    ) -> DomainResult<Customer> {
        let plate = validations::normalize_plate(&input.plate)?;
        let mut customer = self.get_customer(customer_id).await?;

        if customer.find_active_vehicle(&plate).is_some() {
            return Err(DomainError::Conflict(format!(
                "vehicle {} is already registered",
                plate
            )));
        }

        let mut vehicle = Vehicle::new(ids::entity_id(), plate, input.class, actor);
        vehicle.make = input.make;
        vehicle.model = input.model;
        vehicle.color = input.color;
        customer.vehicles.push(vehicle);
        customer.updated_at = Utc::now();

        self.storage.update_customer(customer.clone()).await?;
        Ok(customer)
    }

    /// Soft-delete a vehicle. Blocked while the plate has an active booking.
    pub async fn remove_vehicle(
        &self,
        customer_id: &str,
        vehicle_id: &str,
        actor: Option<String>,
    ) -> DomainResult<Customer> {
        let mut customer = self.get_customer(customer_id).await?;
        let plate = customer
            .find_vehicle(vehicle_id)
            .filter(|v| v.is_active)
            .map(|v| v.plate.clone())
            .ok_or_else(|| DomainError::not_found("vehicle", "id", vehicle_id))?;

        if self.plate_has_active_booking(&plate).await? {
            return Err(DomainError::IllegalTransition(format!(
                "vehicle {} has an active booking",
                plate
            )));
        }

        let now = Utc::now();
        customer.remove_vehicle(vehicle_id, now);
        customer.updated_by = actor;
        self.storage.update_customer(customer.clone()).await?;
        Ok(customer)
    }

    /// Soft-delete a customer. Blocked while any of their bookings is
    /// active.
    pub async fn soft_delete_customer(
        &self,
        customer_id: &str,
        reason: Option<String>,
        actor: Option<String>,
    ) -> DomainResult<Customer> {
        let mut customer = self.get_customer(customer_id).await?;

        let bookings = self.storage.list_bookings().await?;
        let has_active = bookings
            .iter()
            .any(|b| b.customer_id == customer.id && b.status == BookingStatus::Active);
        if has_active {
            return Err(DomainError::IllegalTransition(
                "customer has active bookings".to_string(),
            ));
        }

        let now = Utc::now();
        customer.status = CustomerStatus::Inactive;
        customer.deleted_at = Some(now);
        customer.delete_reason = reason;
        customer.updated_at = now;
        customer.updated_by = actor;
        self.storage.update_customer(customer.clone()).await?;
        info!(customer_code = %customer.code, "Customer deactivated");
        Ok(customer)
    }

    /// Issue or extend the customer-level membership.
    ///
    /// With a current membership: a request adding no new coverage fails;
    /// otherwise the new classes merge into the block and the expiry is
    /// untouched. Without one (or past expiry), a fresh `(number, PIN)` is
    /// drawn and a new term starts. Every path appends one completed ledger
    /// row.
    pub async fn create_membership(
        &self,
        customer_id: &str,
        plan: MembershipPlan,
        term_months: Option<u32>,
        covered_classes: Vec<VehicleClass>,
        payment: MembershipPaymentInput,
        actor: Option<String>,
    ) -> DomainResult<Customer> {
        if covered_classes.is_empty() {
            return Err(DomainError::validation(
                "coveredVehicleTypes",
                "must name at least one vehicle class",
            ));
        }
        let mut customer = self.get_customer(customer_id).await?;
        let now = Utc::now();
        let amount = payment.amount.unwrap_or_else(|| plan.default_amount());
        let term = term_months.unwrap_or_else(|| plan.default_term_months());

        // A lapsed or deactivated block is replaced wholesale by a fresh
        // issue, so only a current one is carried forward.
        let current = customer.membership.take().filter(|m| m.is_current(now));
        let (number, expiry, term_recorded) = match current {
            Some(mut existing) => {
                if existing.covers_all(&covered_classes) {
                    return Err(DomainError::Conflict(
                        "membership already covers the requested vehicle classes".to_string(),
                    ));
                }
                // Coverage extension keeps the number, PIN and expiry.
                existing.extend_coverage(&covered_classes);
                let recorded = (
                    existing.number.clone(),
                    existing.expires_at,
                    existing.validity_term_months,
                );
                customer.membership = Some(existing);
                recorded
            }
            None => {
                let number = self.draw_membership_number().await?;
                let pin = ids::membership_pin(&mut rand::thread_rng());
                let expires_at = Customer::membership_expiry(now, term);
                customer.membership = Some(Membership {
                    number: number.clone(),
                    pin,
                    plan,
                    covered_classes: covered_classes.clone(),
                    issued_at: now,
                    expires_at,
                    validity_term_months: term,
                    is_active: true,
                });
                (number, expires_at, term)
            }
        };
        customer.updated_at = now;
        customer.updated_by = actor.clone();

        let ledger_row = MembershipPayment {
            id: ids::entity_id(),
            customer_id: customer.id.clone(),
            customer_name: customer.full_name(),
            customer_phone: customer.phone.clone(),
            membership_number: number,
            plan,
            amount,
            method: payment.method,
            transaction_ref: payment.transaction_ref,
            start_date: now,
            expiry_date: expiry,
            validity_term_months: term_recorded,
            covered_classes,
            status: PaymentStatus::Completed,
            created_by: actor,
            created_at: now,
        };

        self.storage.update_customer(customer.clone()).await?;
        self.storage.append_membership_payment(ledger_row).await?;
        info!(
            customer_code = %customer.code,
            plan = plan.as_str(),
            amount,
            "Membership payment recorded"
        );
        Ok(customer)
    }

    /// Draw a membership number not used by any active member. The 900k
    /// namespace makes collisions rare at current scale; five misses in a
    /// row point at something systemic, so surface an internal error.
    async fn draw_membership_number(&self) -> DomainResult<String> {
        for _ in 0..MEMBERSHIP_NUMBER_ATTEMPTS {
            let candidate = ids::membership_number(&mut rand::thread_rng());
            if !self.storage.membership_number_in_use(&candidate).await? {
                return Ok(candidate);
            }
        }
        Err(DomainError::Internal(
            "could not allocate a unique membership number".to_string(),
        ))
    }

    /// Credential check. Returns the customer only when the full tuple
    /// matches a current membership (and the class is covered, if given).
    /// A failed check never reveals which factor mismatched.
    pub async fn validate_membership(
        &self,
        membership_number: &str,
        pin: &str,
        for_class: Option<VehicleClass>,
    ) -> DomainResult<Option<Customer>> {
        validations::validate_membership_number(membership_number)?;
        validations::validate_pin(pin)?;

        let now = Utc::now();
        let Some(customer) = self
            .storage
            .find_customer_by_membership_number(membership_number)
            .await?
        else {
            return Ok(None);
        };
        let Some(membership) = customer.membership.as_ref() else {
            return Ok(None);
        };

        let valid = membership.pin == pin
            && membership.is_current(now)
            && for_class.map_or(true, |class| membership.covers(class, now));
        Ok(valid.then_some(customer))
    }

    /// Flip the membership inactive; ledger rows stay untouched.
    pub async fn deactivate_membership(
        &self,
        customer_id: &str,
        actor: Option<String>,
    ) -> DomainResult<Customer> {
        let mut customer = self.get_customer(customer_id).await?;
        let membership = customer
            .membership
            .as_mut()
            .ok_or_else(|| DomainError::not_found("membership", "customerId", customer_id))?;
        membership.is_active = false;
        customer.updated_at = Utc::now();
        customer.updated_by = actor;
        self.storage.update_customer(customer.clone()).await?;
        Ok(customer)
    }

    pub async fn membership_payments(
        &self,
        customer_id: &str,
    ) -> DomainResult<Vec<MembershipPayment>> {
        self.storage.list_membership_payments(customer_id).await
    }

    async fn plate_has_active_booking(&self, plate: &str) -> DomainResult<bool> {
        let bookings: Vec<Booking> = self.storage.list_bookings().await?;
        Ok(bookings
            .iter()
            .any(|b| b.status == BookingStatus::Active && b.vehicle_number == plate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OtpBlock;
    use crate::storage::InMemoryStorage;
    use chrono::Duration;

    fn service() -> (CustomerService, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        (CustomerService::new(storage.clone()), storage)
    }

    fn customer_input() -> CreateCustomerInput {
        CreateCustomerInput {
            first_name: "Asha".into(),
            last_name: "Rao".into(),
            phone: "9876543210".into(),
            email: None,
            vehicles: vec![VehicleInput {
                plate: "ka01ab1234".into(),
                class: VehicleClass::TwoWheeler,
                make: Some("Hero".into()),
                model: None,
                color: None,
            }],
        }
    }

    fn upi_payment(amount: Option<f64>) -> MembershipPaymentInput {
        MembershipPaymentInput {
            amount,
            method: PaymentMethod::Upi,
            transaction_ref: None,
        }
    }

    #[tokio::test]
    async fn create_normalizes_vehicles_and_rejects_duplicates() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        assert_eq!(customer.vehicles[0].plate, "KA01AB1234");
        assert!(customer.vehicles[0].is_active);
        assert!(customer.code.starts_with("CUST"));

        let err = service
            .create_customer(customer_input(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn search_by_each_dimension() {
        let (service, _) = service();
        service.create_customer(customer_input(), None).await.unwrap();

        let by_phone = service
            .search_customers("98765", CustomerSearchKind::Phone)
            .await
            .unwrap();
        assert_eq!(by_phone.len(), 1);

        let by_name = service
            .search_customers("asha", CustomerSearchKind::Name)
            .await
            .unwrap();
        assert_eq!(by_name.len(), 1);

        let by_vehicle = service
            .search_customers("ab1234", CustomerSearchKind::Vehicle)
            .await
            .unwrap();
        assert_eq!(by_vehicle.len(), 1);

        let err = service
            .search_customers("x", CustomerSearchKind::All)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::BadRequest(_)));
    }

    #[tokio::test]
    async fn add_vehicle_rejects_active_duplicate_plate() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();

        let err = service
            .add_vehicle(
                &customer.id,
                VehicleInput {
                    plate: "KA01AB1234".into(),
                    class: VehicleClass::TwoWheeler,
                    make: None,
                    model: None,
                    color: None,
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        // After soft-deleting the vehicle, the plate can come back.
        let vehicle_id = customer.vehicles[0].id.clone();
        service
            .remove_vehicle(&customer.id, &vehicle_id, None)
            .await
            .unwrap();
        service
            .add_vehicle(
                &customer.id,
                VehicleInput {
                    plate: "KA01AB1234".into(),
                    class: VehicleClass::TwoWheeler,
                    make: None,
                    model: None,
                    color: None,
                },
                None,
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn removal_blocked_by_active_booking() {
        let (service, storage) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        let now = Utc::now();
        storage
            .insert_booking(crate::domain::Booking::new(
                "b1",
                "BKTW00000001",
                customer.id.clone(),
                customer.full_name(),
                customer.phone.clone(),
                "KA01AB1234",
                VehicleClass::TwoWheeler,
                "M001",
                1,
                "s1",
                OtpBlock::issue("482913", now, 30),
                now,
            ))
            .await
            .unwrap();

        let vehicle_id = customer.vehicles[0].id.clone();
        let err = service
            .remove_vehicle(&customer.id, &vehicle_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition(_)));

        let err = service
            .soft_delete_customer(&customer.id, Some("moved away".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition(_)));
    }

    #[tokio::test]
    async fn fresh_membership_issue_appends_ledger_row() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();

        let customer = service
            .create_membership(
                &customer.id,
                MembershipPlan::Yearly,
                Some(12),
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                Some("OP100".into()),
            )
            .await
            .unwrap();

        let membership = customer.membership.as_ref().unwrap();
        assert_eq!(membership.number.len(), 6);
        assert_eq!(membership.pin.len(), 4);
        assert!(membership.is_active);
        assert_eq!(membership.covered_classes, vec![VehicleClass::TwoWheeler]);

        let ledger = service.membership_payments(&customer.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger[0].amount, 4000.0); // yearly default
        assert_eq!(ledger[0].status, PaymentStatus::Completed);
    }

    #[tokio::test]
    async fn coverage_extension_keeps_expiry_and_credentials() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        let customer = service
            .create_membership(
                &customer.id,
                MembershipPlan::Yearly,
                Some(12),
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap();
        let before = customer.membership.clone().unwrap();

        let customer = service
            .create_membership(
                &customer.id,
                MembershipPlan::Yearly,
                Some(12),
                vec![VehicleClass::FourWheeler],
                upi_payment(Some(4000.0)),
                None,
            )
            .await
            .unwrap();
        let after = customer.membership.clone().unwrap();

        assert_eq!(after.number, before.number);
        assert_eq!(after.pin, before.pin);
        assert_eq!(after.expires_at, before.expires_at);
        assert_eq!(
            after.covered_classes,
            vec![VehicleClass::TwoWheeler, VehicleClass::FourWheeler]
        );

        let ledger = service.membership_payments(&customer.id).await.unwrap();
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[1].amount, 4000.0);
    }

    #[tokio::test]
    async fn subset_coverage_is_already_covered() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        service
            .create_membership(
                &customer.id,
                MembershipPlan::Premium,
                None,
                vec![VehicleClass::TwoWheeler, VehicleClass::FourWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap();

        let err = service
            .create_membership(
                &customer.id,
                MembershipPlan::Premium,
                None,
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn expired_membership_renewal_starts_fresh() {
        let (service, storage) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        let customer = service
            .create_membership(
                &customer.id,
                MembershipPlan::Monthly,
                None,
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap();
        let old_number = customer.membership.clone().unwrap().number;

        // Force expiry in the store.
        let mut expired = customer.clone();
        expired.membership.as_mut().unwrap().expires_at = Utc::now() - Duration::days(1);
        storage.update_customer(expired).await.unwrap();

        let renewed = service
            .create_membership(
                &customer.id,
                MembershipPlan::Yearly,
                Some(12),
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap();
        let membership = renewed.membership.unwrap();
        assert!(membership.expires_at > Utc::now());
        assert_eq!(membership.plan, MembershipPlan::Yearly);
        // A fresh draw may theoretically collide with the old number, but
        // the credential is reissued either way.
        assert!(membership.is_active);
        let _ = old_number;
    }

    #[tokio::test]
    async fn membership_validation_checks_the_full_tuple() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        let customer = service
            .create_membership(
                &customer.id,
                MembershipPlan::Yearly,
                None,
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap();
        let membership = customer.membership.clone().unwrap();

        let ok = service
            .validate_membership(
                &membership.number,
                &membership.pin,
                Some(VehicleClass::TwoWheeler),
            )
            .await
            .unwrap();
        assert!(ok.is_some());

        // Malformed credential shapes are rejected before any lookup.
        assert!(service
            .validate_membership("12345", &membership.pin, None)
            .await
            .is_err());
        assert!(service
            .validate_membership(&membership.number, "12", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn membership_validation_rejects_uncovered_class() {
        let (service, _) = service();
        let customer = service.create_customer(customer_input(), None).await.unwrap();
        let customer = service
            .create_membership(
                &customer.id,
                MembershipPlan::Yearly,
                None,
                vec![VehicleClass::TwoWheeler],
                upi_payment(None),
                None,
            )
            .await
            .unwrap();
        let membership = customer.membership.clone().unwrap();

        let miss = service
            .validate_membership(
                &membership.number,
                &membership.pin,
                Some(VehicleClass::FourWheeler),
            )
            .await
            .unwrap();
        assert!(miss.is_none());

        let wrong_pin = service
            .validate_membership(&membership.number, "9999", None)
            .await
            .unwrap();
        assert!(wrong_pin.is_none());

        service
            .deactivate_membership(&customer.id, None)
            .await
            .unwrap();
        let deactivated = service
            .validate_membership(&membership.number, &membership.pin, None)
            .await
            .unwrap();
        assert!(deactivated.is_none());

        // Ledger survives deactivation.
        let ledger = service.membership_payments(&customer.id).await.unwrap();
        assert_eq!(ledger.len(), 1);
    }
}
