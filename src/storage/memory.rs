//! In-memory storage implementation
//!
//! DashMap-backed engine used for development and tests. Entry-level locks
//! give the per-document atomic check-then-set the booking OTP redemption
//! relies on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use super::Storage;
use crate::domain::{Booking, BookingStatus, Customer, Machine, MembershipPayment, Site, User};
use crate::shared::types::{DomainError, DomainResult};

/// In-memory storage for development and testing
#[derive(Default)]
pub struct InMemoryStorage {
    sites: DashMap<String, Site>,
    machines: DashMap<String, Machine>,
    customers: DashMap<String, Customer>,
    bookings: DashMap<String, Booking>,
    membership_payments: DashMap<String, MembershipPayment>,
    users: DashMap<String, User>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn insert_site(&self, site: Site) -> DomainResult<()> {
        if self
            .sites
            .iter()
            .any(|s| s.code.eq_ignore_ascii_case(&site.code))
        {
            return Err(DomainError::Conflict(format!("site code {}", site.code)));
        }
        self.sites.insert(site.id.clone(), site);
        Ok(())
    }

    async fn get_site(&self, id: &str) -> DomainResult<Option<Site>> {
        Ok(self.sites.get(id).map(|s| s.clone()))
    }

    async fn get_site_by_code(&self, code: &str) -> DomainResult<Option<Site>> {
        Ok(self
            .sites
            .iter()
            .find(|s| s.code.eq_ignore_ascii_case(code))
            .map(|s| s.clone()))
    }

    async fn update_site(&self, site: Site) -> DomainResult<()> {
        if !self.sites.contains_key(&site.id) {
            return Err(DomainError::not_found("site", "id", site.id.clone()));
        }
        self.sites.insert(site.id.clone(), site);
        Ok(())
    }

    async fn delete_site(&self, id: &str) -> DomainResult<()> {
        self.sites
            .remove(id)
            .ok_or_else(|| DomainError::not_found("site", "id", id))?;
        Ok(())
    }

    async fn list_sites(&self) -> DomainResult<Vec<Site>> {
        Ok(self.sites.iter().map(|s| s.clone()).collect())
    }

    async fn insert_machine(&self, machine: Machine) -> DomainResult<()> {
        if self
            .machines
            .iter()
            .any(|m| m.site_id == machine.site_id && m.code.eq_ignore_ascii_case(&machine.code))
        {
            return Err(DomainError::Conflict(format!(
                "machine {} at site {}",
                machine.code, machine.site_id
            )));
        }
        self.machines.insert(machine.id.clone(), machine);
        Ok(())
    }

    async fn get_machine(&self, id: &str) -> DomainResult<Option<Machine>> {
        Ok(self.machines.get(id).map(|m| m.clone()))
    }

    async fn get_machine_by_code(
        &self,
        site_id: &str,
        code: &str,
    ) -> DomainResult<Option<Machine>> {
        Ok(self
            .machines
            .iter()
            .find(|m| m.site_id == site_id && m.code.eq_ignore_ascii_case(code))
            .map(|m| m.clone()))
    }

    async fn update_machine(&self, machine: Machine) -> DomainResult<()> {
        if !self.machines.contains_key(&machine.id) {
            return Err(DomainError::not_found("machine", "id", machine.id.clone()));
        }
        self.machines.insert(machine.id.clone(), machine);
        Ok(())
    }

    async fn delete_machine(&self, id: &str) -> DomainResult<()> {
        self.machines
            .remove(id)
            .ok_or_else(|| DomainError::not_found("machine", "id", id))?;
        Ok(())
    }

    async fn list_machines(&self) -> DomainResult<Vec<Machine>> {
        Ok(self.machines.iter().map(|m| m.clone()).collect())
    }

    async fn list_machines_by_site(&self, site_id: &str) -> DomainResult<Vec<Machine>> {
        Ok(self
            .machines
            .iter()
            .filter(|m| m.site_id == site_id)
            .map(|m| m.clone())
            .collect())
    }

    async fn delete_machines_by_site(&self, site_id: &str) -> DomainResult<u64> {
        let ids: Vec<String> = self
            .machines
            .iter()
            .filter(|m| m.site_id == site_id)
            .map(|m| m.id.clone())
            .collect();
        let count = ids.len() as u64;
        for id in ids {
            self.machines.remove(&id);
        }
        Ok(count)
    }

    async fn insert_customer(&self, customer: Customer) -> DomainResult<()> {
        if self
            .customers
            .iter()
            .any(|c| c.is_active() && c.phone == customer.phone)
        {
            return Err(DomainError::Conflict(format!("phone {}", customer.phone)));
        }
        self.customers.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn get_customer(&self, id: &str) -> DomainResult<Option<Customer>> {
        Ok(self.customers.get(id).map(|c| c.clone()))
    }

    async fn find_active_customer_by_phone(
        &self,
        phone: &str,
    ) -> DomainResult<Option<Customer>> {
        Ok(self
            .customers
            .iter()
            .find(|c| c.is_active() && c.phone == phone)
            .map(|c| c.clone()))
    }

    async fn find_customer_by_membership_number(
        &self,
        number: &str,
    ) -> DomainResult<Option<Customer>> {
        Ok(self
            .customers
            .iter()
            .find(|c| {
                c.membership
                    .as_ref()
                    .is_some_and(|m| m.is_active && m.number == number)
            })
            .map(|c| c.clone()))
    }

    async fn membership_number_in_use(&self, number: &str) -> DomainResult<bool> {
        Ok(self.customers.iter().any(|c| {
            c.membership
                .as_ref()
                .is_some_and(|m| m.is_active && m.number == number)
        }))
    }

    async fn update_customer(&self, customer: Customer) -> DomainResult<()> {
        if !self.customers.contains_key(&customer.id) {
            return Err(DomainError::not_found(
                "customer",
                "id",
                customer.id.clone(),
            ));
        }
        self.customers.insert(customer.id.clone(), customer);
        Ok(())
    }

    async fn list_customers(&self) -> DomainResult<Vec<Customer>> {
        Ok(self.customers.iter().map(|c| c.clone()).collect())
    }

    async fn insert_booking(&self, booking: Booking) -> DomainResult<()> {
        self.bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    async fn get_booking(&self, id: &str) -> DomainResult<Option<Booking>> {
        Ok(self.bookings.get(id).map(|b| b.clone()))
    }

    async fn update_booking(&self, booking: Booking) -> DomainResult<()> {
        if !self.bookings.contains_key(&booking.id) {
            return Err(DomainError::not_found("booking", "id", booking.id.clone()));
        }
        self.bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    async fn list_bookings(&self) -> DomainResult<Vec<Booking>> {
        Ok(self.bookings.iter().map(|b| b.clone()).collect())
    }

    async fn delete_bookings_by_site(&self, site_id: &str) -> DomainResult<u64> {
        let ids: Vec<String> = self
            .bookings
            .iter()
            .filter(|b| b.site_id == site_id)
            .map(|b| b.id.clone())
            .collect();
        let count = ids.len() as u64;
        for id in ids {
            self.bookings.remove(&id);
        }
        Ok(count)
    }

    async fn redeem_booking_otp(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Booking>> {
        let candidate = self
            .bookings
            .iter()
            .find(|b| {
                b.status == BookingStatus::Active
                    && b.otp.code == code
                    && b.otp.is_redeemable(now)
            })
            .map(|b| b.id.clone());

        let Some(id) = candidate else {
            return Ok(None);
        };

        // Re-check under the entry lock so a concurrent redemption of the
        // same code cannot double-consume.
        if let Some(mut booking) = self.bookings.get_mut(&id) {
            if booking.status == BookingStatus::Active
                && booking.otp.code == code
                && booking.otp.is_redeemable(now)
            {
                booking.otp.consume(now);
                booking.updated_at = now;
                return Ok(Some(booking.clone()));
            }
        }
        Ok(None)
    }

    async fn append_membership_payment(&self, payment: MembershipPayment) -> DomainResult<()> {
        self.membership_payments
            .insert(payment.id.clone(), payment);
        Ok(())
    }

    async fn list_membership_payments(
        &self,
        customer_id: &str,
    ) -> DomainResult<Vec<MembershipPayment>> {
        let mut rows: Vec<MembershipPayment> = self
            .membership_payments
            .iter()
            .filter(|p| p.customer_id == customer_id)
            .map(|p| p.clone())
            .collect();
        rows.sort_by_key(|p| p.created_at);
        Ok(rows)
    }

    async fn insert_user(&self, user: User) -> DomainResult<()> {
        if self
            .users
            .iter()
            .any(|u| u.operator_id.eq_ignore_ascii_case(&user.operator_id))
        {
            return Err(DomainError::Conflict(format!(
                "operator id {}",
                user.operator_id
            )));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn get_user(&self, id: &str) -> DomainResult<Option<User>> {
        Ok(self.users.get(id).map(|u| u.clone()))
    }

    async fn get_user_by_operator_id(&self, operator_id: &str) -> DomainResult<Option<User>> {
        Ok(self
            .users
            .iter()
            .find(|u| u.operator_id.eq_ignore_ascii_case(operator_id))
            .map(|u| u.clone()))
    }

    async fn update_user(&self, user: User) -> DomainResult<()> {
        if !self.users.contains_key(&user.id) {
            return Err(DomainError::not_found("user", "id", user.id.clone()));
        }
        self.users.insert(user.id.clone(), user);
        Ok(())
    }

    async fn list_users(&self) -> DomainResult<Vec<User>> {
        Ok(self.users.iter().map(|u| u.clone()).collect())
    }

    async fn strip_site_from_users(&self, site_id: &str) -> DomainResult<u64> {
        let mut touched = 0u64;
        for mut entry in self.users.iter_mut() {
            if entry.strip_site(site_id) {
                touched += 1;
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, MachineKind, OtpBlock, Role, VehicleClass};
    use chrono::Duration;

    fn site() -> Site {
        Site::new(
            "s1",
            "SITE001",
            "Central Yard",
            Address {
                line1: None,
                city: "Bengaluru".into(),
                state: "KA".into(),
                pincode: "560001".into(),
            },
        )
    }

    #[tokio::test]
    async fn site_codes_are_unique() {
        let storage = InMemoryStorage::new();
        storage.insert_site(site()).await.unwrap();

        let mut dup = site();
        dup.id = "s2".into();
        let err = storage.insert_site(dup).await.unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[tokio::test]
    async fn machine_codes_are_unique_per_site() {
        let storage = InMemoryStorage::new();
        let m1 = Machine::new("m1", "s1", "M001", MachineKind::Rotary, VehicleClass::TwoWheeler, 4);
        storage.insert_machine(m1).await.unwrap();

        // Same code at a different site is fine
        let m2 = Machine::new("m2", "s2", "M001", MachineKind::Rotary, VehicleClass::TwoWheeler, 4);
        storage.insert_machine(m2).await.unwrap();

        let dup = Machine::new("m3", "s1", "M001", MachineKind::Puzzle, VehicleClass::TwoWheeler, 4);
        assert!(matches!(
            storage.insert_machine(dup).await.unwrap_err(),
            DomainError::Conflict(_)
        ));

        let found = storage.get_machine_by_code("s1", "M001").await.unwrap();
        assert_eq!(found.unwrap().id, "m1");
    }

    #[tokio::test]
    async fn phone_uniqueness_ignores_inactive_customers() {
        let storage = InMemoryStorage::new();
        let mut c1 = Customer::new("c1", "CUST000001", "Asha", "Rao", "9876543210");
        c1.status = crate::domain::CustomerStatus::Inactive;
        storage.customers.insert(c1.id.clone(), c1);

        // Same phone as the inactive record is accepted
        let c2 = Customer::new("c2", "CUST000002", "Meera", "Iyer", "9876543210");
        storage.insert_customer(c2).await.unwrap();

        let c3 = Customer::new("c3", "CUST000003", "Ravi", "Menon", "9876543210");
        assert!(matches!(
            storage.insert_customer(c3).await.unwrap_err(),
            DomainError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn otp_redemption_is_single_shot() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        let booking = Booking::new(
            "b1",
            "BKTW00000001",
            "c1",
            "Asha Rao",
            "9876543210",
            "KA01AB1234",
            VehicleClass::TwoWheeler,
            "M001",
            1,
            "s1",
            OtpBlock::issue("482913", now, 30),
            now,
        );
        storage.insert_booking(booking).await.unwrap();

        let first = storage
            .redeem_booking_otp("482913", now + Duration::minutes(29))
            .await
            .unwrap();
        assert!(first.is_some());
        assert!(first.unwrap().otp.is_used);

        let second = storage
            .redeem_booking_otp("482913", now + Duration::minutes(29))
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn expired_otp_is_not_redeemed() {
        let storage = InMemoryStorage::new();
        let now = Utc::now();
        let booking = Booking::new(
            "b1",
            "BKTW00000001",
            "c1",
            "Asha Rao",
            "9876543210",
            "KA01AB1234",
            VehicleClass::TwoWheeler,
            "M001",
            1,
            "s1",
            OtpBlock::issue("482913", now, 30),
            now,
        );
        storage.insert_booking(booking).await.unwrap();

        let at_expiry = storage
            .redeem_booking_otp("482913", now + Duration::minutes(30))
            .await
            .unwrap();
        assert!(at_expiry.is_none());
    }

    #[tokio::test]
    async fn strip_site_touches_only_assigned_users() {
        let storage = InMemoryStorage::new();
        let mut u1 = User::new("u1", "OP100", "Asha", "hash", Role::Operator);
        u1.assign_site(crate::domain::SiteAssignment {
            site_id: "s1".into(),
            role: crate::domain::SiteRole::Operator,
            permissions: vec![],
        });
        let u2 = User::new("u2", "OP200", "Ravi", "hash", Role::Operator);
        storage.insert_user(u1).await.unwrap();
        storage.insert_user(u2).await.unwrap();

        let touched = storage.strip_site_from_users("s1").await.unwrap();
        assert_eq!(touched, 1);
        let u1 = storage.get_user("u1").await.unwrap().unwrap();
        assert!(u1.assigned_sites.is_empty());
        assert!(u1.primary_site.is_none());
    }
}
