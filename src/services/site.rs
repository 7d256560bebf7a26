//! Site administration service
//!
//! Site CRUD, user-to-site assignment and on-demand statistics. Site
//! deletion is the only cascading operation in the system and always strips
//! user assignments, whether or not `force` drops machines and bookings.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    Address, BookingStatus, GeoPoint, MachineStatus, OperatingHours, PaymentStatus, Pricing,
    Site, SiteAssignment, SiteRole, SiteStatus,
};
use crate::shared::ids;
use crate::shared::types::{DomainError, DomainResult};
use crate::shared::validations;
use crate::storage::Storage;

#[derive(Debug, Clone)]
pub struct CreateSiteInput {
    pub code: String,
    pub name: String,
    pub address: Address,
    pub location: Option<GeoPoint>,
    pub operating_hours: Option<OperatingHours>,
    pub pricing: Option<Pricing>,
    pub declared_machine_count: u32,
    pub declared_capacity: u32,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSiteInput {
    pub name: Option<String>,
    pub address: Option<Address>,
    pub location: Option<GeoPoint>,
    pub operating_hours: Option<OperatingHours>,
    pub pricing: Option<Pricing>,
    pub declared_machine_count: Option<u32>,
    pub declared_capacity: Option<u32>,
    pub status: Option<SiteStatus>,
}

/// On-demand site statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SiteStatistics {
    pub machines_total: u64,
    pub machines_online: u64,
    pub bookings_total: u64,
    pub bookings_today: u64,
    pub bookings_active: u64,
    pub revenue_total: f64,
    pub revenue_today: f64,
}

/// Service for site operations
pub struct SiteService {
    storage: Arc<dyn Storage>,
}

impl SiteService {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_site(
        &self,
        input: CreateSiteInput,
        actor: Option<String>,
    ) -> DomainResult<Site> {
        validations::validate_site_code(&input.code)?;
        validations::validate_pincode(&input.address.pincode)?;
        if input.name.trim().is_empty() {
            return Err(DomainError::validation("name", "must not be empty"));
        }

        let mut site = Site::new(
            ids::entity_id(),
            input.code.to_uppercase(),
            input.name.trim(),
            input.address,
        );
        site.location = input.location;
        if let Some(hours) = input.operating_hours {
            site.operating_hours = hours;
        }
        if let Some(pricing) = input.pricing {
            site.pricing = pricing;
        }
        site.declared_machine_count = input.declared_machine_count;
        site.declared_capacity = input.declared_capacity;
        site.created_by = actor;

        self.storage.insert_site(site.clone()).await?;
        info!(site_code = %site.code, "Site created");
        Ok(site)
    }

    pub async fn get_site(&self, id: &str) -> DomainResult<Site> {
        self.storage
            .get_site(id)
            .await?
            .ok_or_else(|| DomainError::not_found("site", "id", id))
    }

    pub async fn list_sites(&self) -> DomainResult<Vec<Site>> {
        self.storage.list_sites().await
    }

    pub async fn update_site(&self, id: &str, input: UpdateSiteInput) -> DomainResult<Site> {
        let mut site = self.get_site(id).await?;
        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(DomainError::validation("name", "must not be empty"));
            }
            site.name = name.trim().to_string();
        }
        if let Some(address) = input.address {
            validations::validate_pincode(&address.pincode)?;
            site.address = address;
        }
        if let Some(location) = input.location {
            site.location = Some(location);
        }
        if let Some(hours) = input.operating_hours {
            site.operating_hours = hours;
        }
        if let Some(pricing) = input.pricing {
            site.pricing = pricing;
        }
        if let Some(count) = input.declared_machine_count {
            site.declared_machine_count = count;
        }
        if let Some(capacity) = input.declared_capacity {
            site.declared_capacity = capacity;
        }
        if let Some(status) = input.status {
            site.status = status;
        }
        site.updated_at = Utc::now();
        self.storage.update_site(site.clone()).await?;
        Ok(site)
    }

    /// Soft-deactivate: only legal once every booking at the site is
    /// terminal. All machines are forced offline.
    pub async fn deactivate_site(&self, id: &str) -> DomainResult<Site> {
        let mut site = self.get_site(id).await?;

        let bookings = self.storage.list_bookings().await?;
        let active = bookings
            .iter()
            .filter(|b| b.site_id == site.id && b.status == BookingStatus::Active)
            .count();
        if active > 0 {
            return Err(DomainError::IllegalTransition(format!(
                "site {} still has {} active bookings",
                site.code, active
            )));
        }

        for mut machine in self.storage.list_machines_by_site(&site.id).await? {
            if machine.status != MachineStatus::Offline {
                machine.status = MachineStatus::Offline;
                machine.updated_at = Utc::now();
                if let Err(e) = self.storage.update_machine(machine).await {
                    warn!(error = %e, "Failed to force machine offline during site deactivation");
                }
            }
        }

        site.status = SiteStatus::Inactive;
        site.updated_at = Utc::now();
        self.storage.update_site(site.clone()).await?;
        info!(site_code = %site.code, "Site deactivated");
        Ok(site)
    }

    /// Hard delete. Without `force` the site must be empty of machines and
    /// bookings. With `force` both are dropped. Either way every user's
    /// assignment (and matching primary site) is stripped.
    pub async fn delete_site_permanently(&self, id: &str, force: bool) -> DomainResult<()> {
        let site = self.get_site(id).await?;

        let machine_count = self.storage.list_machines_by_site(&site.id).await?.len();
        let booking_count = self
            .storage
            .list_bookings()
            .await?
            .iter()
            .filter(|b| b.site_id == site.id)
            .count();

        if !force && (machine_count > 0 || booking_count > 0) {
            return Err(DomainError::IllegalTransition(format!(
                "site {} still has {} machines and {} bookings; pass force to drop them",
                site.code, machine_count, booking_count
            )));
        }

        if force {
            let machines = self.storage.delete_machines_by_site(&site.id).await?;
            let bookings = self.storage.delete_bookings_by_site(&site.id).await?;
            if machines > 0 || bookings > 0 {
                warn!(
                    site_code = %site.code,
                    machines,
                    bookings,
                    "Force delete dropped machines and bookings"
                );
            }
        }

        let touched = self.storage.strip_site_from_users(&site.id).await?;
        self.storage.delete_site(&site.id).await?;
        info!(site_code = %site.code, users_touched = touched, "Site deleted");
        Ok(())
    }

    /// Idempotent user-to-site assignment. An existing pair gets its role
    /// and permissions updated; a user without a primary site adopts this
    /// one.
    pub async fn assign_user(
        &self,
        site_id: &str,
        user_id: &str,
        role: SiteRole,
        permissions: Vec<String>,
    ) -> DomainResult<()> {
        let site = self.get_site(site_id).await?;
        let mut user = self
            .storage
            .get_user(user_id)
            .await?
            .ok_or_else(|| DomainError::not_found("user", "id", user_id))?;

        let updated = user.assign_site(SiteAssignment {
            site_id: site.id.clone(),
            role,
            permissions,
        });
        self.storage.update_user(user.clone()).await?;
        info!(
            site_code = %site.code,
            operator_id = %user.operator_id,
            updated,
            "User assigned to site"
        );
        Ok(())
    }

    pub async fn site_users(&self, site_id: &str) -> DomainResult<Vec<crate::domain::User>> {
        let site = self.get_site(site_id).await?;
        let users = self.storage.list_users().await?;
        Ok(users
            .into_iter()
            .filter(|u| u.can_access_site(&site.id) && !u.is_admin())
            .collect())
    }

    /// Machines, bookings and revenue for one site, computed on demand.
    pub async fn site_statistics(&self, site_id: &str) -> DomainResult<SiteStatistics> {
        let site = self.get_site(site_id).await?;
        let now = Utc::now();
        let today = now.date_naive();
        let mut stats = SiteStatistics::default();

        for machine in self.storage.list_machines_by_site(&site.id).await? {
            stats.machines_total += 1;
            if machine.status == MachineStatus::Online && machine.is_live(now) {
                stats.machines_online += 1;
            }
        }

        for booking in self.storage.list_bookings().await? {
            if booking.site_id != site.id {
                continue;
            }
            stats.bookings_total += 1;
            let is_today = booking.start_time.date_naive() == today;
            if is_today {
                stats.bookings_today += 1;
            }
            match booking.status {
                BookingStatus::Active => stats.bookings_active += 1,
                BookingStatus::Completed => {
                    if let Some(payment) = &booking.payment {
                        if payment.status == PaymentStatus::Completed {
                            stats.revenue_total += payment.amount;
                            if is_today {
                                stats.revenue_today += payment.amount;
                            }
                        }
                    }
                }
                _ => {}
            }
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Machine, MachineKind, Role, User, VehicleClass};
    use crate::storage::InMemoryStorage;

    fn address() -> Address {
        Address {
            line1: Some("1 Yard Road".into()),
            city: "Bengaluru".into(),
            state: "KA".into(),
            pincode: "560001".into(),
        }
    }

    fn create_input(code: &str) -> CreateSiteInput {
        CreateSiteInput {
            code: code.into(),
            name: "Central Yard".into(),
            address: address(),
            location: None,
            operating_hours: None,
            pricing: None,
            declared_machine_count: 2,
            declared_capacity: 40,
        }
    }

    fn harness() -> (SiteService, Arc<InMemoryStorage>) {
        let storage = Arc::new(InMemoryStorage::new());
        (SiteService::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn create_rejects_bad_codes_and_duplicates() {
        let (service, _) = harness();
        service.create_site(create_input("SITE001"), None).await.unwrap();

        let err = service
            .create_site(create_input("SITE001"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));

        let err = service
            .create_site(create_input("S1"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn deactivation_forces_machines_offline() {
        let (service, storage) = harness();
        let site = service.create_site(create_input("SITE001"), None).await.unwrap();
        storage
            .insert_machine(Machine::new(
                "m1",
                site.id.clone(),
                "M001",
                MachineKind::Rotary,
                VehicleClass::TwoWheeler,
                4,
            ))
            .await
            .unwrap();

        let site = service.deactivate_site(&site.id).await.unwrap();
        assert_eq!(site.status, SiteStatus::Inactive);
        let machine = storage.get_machine("m1").await.unwrap().unwrap();
        assert_eq!(machine.status, MachineStatus::Offline);
    }

    #[tokio::test]
    async fn delete_without_force_requires_empty_site() {
        let (service, storage) = harness();
        let site = service.create_site(create_input("SITE001"), None).await.unwrap();
        storage
            .insert_machine(Machine::new(
                "m1",
                site.id.clone(),
                "M001",
                MachineKind::Rotary,
                VehicleClass::TwoWheeler,
                4,
            ))
            .await
            .unwrap();

        let err = service
            .delete_site_permanently(&site.id, false)
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::IllegalTransition(_)));

        service.delete_site_permanently(&site.id, true).await.unwrap();
        assert!(storage.get_site(&site.id).await.unwrap().is_none());
        assert!(storage.get_machine("m1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_strips_user_assignments() {
        let (service, storage) = harness();
        let site = service.create_site(create_input("SITE001"), None).await.unwrap();
        storage
            .insert_user(User::new("u1", "OP100", "Asha", "hash", Role::Operator))
            .await
            .unwrap();
        service
            .assign_user(&site.id, "u1", SiteRole::Operator, vec![])
            .await
            .unwrap();

        let user = storage.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.primary_site.as_deref(), Some(site.id.as_str()));

        service.delete_site_permanently(&site.id, false).await.unwrap();
        let user = storage.get_user("u1").await.unwrap().unwrap();
        assert!(user.assigned_sites.is_empty());
        assert!(user.primary_site.is_none());
    }

    #[tokio::test]
    async fn assignment_is_idempotent() {
        let (service, storage) = harness();
        let site = service.create_site(create_input("SITE001"), None).await.unwrap();
        storage
            .insert_user(User::new("u1", "OP100", "Asha", "hash", Role::Operator))
            .await
            .unwrap();

        service
            .assign_user(&site.id, "u1", SiteRole::Operator, vec![])
            .await
            .unwrap();
        service
            .assign_user(&site.id, "u1", SiteRole::SiteAdmin, vec!["machines:write".into()])
            .await
            .unwrap();

        let user = storage.get_user("u1").await.unwrap().unwrap();
        assert_eq!(user.assigned_sites.len(), 1);
        assert_eq!(user.assigned_sites[0].role, SiteRole::SiteAdmin);

        let users = service.site_users(&site.id).await.unwrap();
        assert_eq!(users.len(), 1);
    }
}
