//! Storage trait definitions
//!
//! One seam for all persistence. The core assumes a transactional
//! document/row store with per-document atomic updates; everything else
//! (indexing, engine choice) stays behind this trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{Booking, Customer, Machine, MembershipPayment, Site, User};
use crate::shared::types::DomainResult;

#[async_trait]
pub trait Storage: Send + Sync {
    // Site operations
    async fn insert_site(&self, site: Site) -> DomainResult<()>;
    async fn get_site(&self, id: &str) -> DomainResult<Option<Site>>;
    async fn get_site_by_code(&self, code: &str) -> DomainResult<Option<Site>>;
    async fn update_site(&self, site: Site) -> DomainResult<()>;
    async fn delete_site(&self, id: &str) -> DomainResult<()>;
    async fn list_sites(&self) -> DomainResult<Vec<Site>>;

    // Machine operations
    async fn insert_machine(&self, machine: Machine) -> DomainResult<()>;
    async fn get_machine(&self, id: &str) -> DomainResult<Option<Machine>>;
    async fn get_machine_by_code(&self, site_id: &str, code: &str)
        -> DomainResult<Option<Machine>>;
    async fn update_machine(&self, machine: Machine) -> DomainResult<()>;
    async fn delete_machine(&self, id: &str) -> DomainResult<()>;
    async fn list_machines(&self) -> DomainResult<Vec<Machine>>;
    async fn list_machines_by_site(&self, site_id: &str) -> DomainResult<Vec<Machine>>;
    async fn delete_machines_by_site(&self, site_id: &str) -> DomainResult<u64>;

    // Customer operations
    async fn insert_customer(&self, customer: Customer) -> DomainResult<()>;
    async fn get_customer(&self, id: &str) -> DomainResult<Option<Customer>>;
    async fn find_active_customer_by_phone(&self, phone: &str)
        -> DomainResult<Option<Customer>>;
    /// Lookup by membership number among active membership blocks.
    async fn find_customer_by_membership_number(
        &self,
        number: &str,
    ) -> DomainResult<Option<Customer>>;
    /// Uniqueness probe for the shared membership-number namespace.
    async fn membership_number_in_use(&self, number: &str) -> DomainResult<bool>;
    async fn update_customer(&self, customer: Customer) -> DomainResult<()>;
    async fn list_customers(&self) -> DomainResult<Vec<Customer>>;

    // Booking operations
    async fn insert_booking(&self, booking: Booking) -> DomainResult<()>;
    async fn get_booking(&self, id: &str) -> DomainResult<Option<Booking>>;
    async fn update_booking(&self, booking: Booking) -> DomainResult<()>;
    async fn list_bookings(&self) -> DomainResult<Vec<Booking>>;
    async fn delete_bookings_by_site(&self, site_id: &str) -> DomainResult<u64>;
    /// Find the unique active booking whose OTP matches, is unused and
    /// unexpired, and consume the OTP in one atomic check-then-set.
    /// Returns the booking after consumption, or None.
    async fn redeem_booking_otp(
        &self,
        code: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<Booking>>;

    // Membership payment ledger (append-only)
    async fn append_membership_payment(&self, payment: MembershipPayment) -> DomainResult<()>;
    async fn list_membership_payments(
        &self,
        customer_id: &str,
    ) -> DomainResult<Vec<MembershipPayment>>;

    // User operations
    async fn insert_user(&self, user: User) -> DomainResult<()>;
    async fn get_user(&self, id: &str) -> DomainResult<Option<User>>;
    async fn get_user_by_operator_id(&self, operator_id: &str) -> DomainResult<Option<User>>;
    async fn update_user(&self, user: User) -> DomainResult<()>;
    async fn list_users(&self) -> DomainResult<Vec<User>>;
    /// Remove the site from every user's assignments and clear matching
    /// primary-site references. Returns the number of users touched.
    async fn strip_site_from_users(&self, site_id: &str) -> DomainResult<u64>;
}
