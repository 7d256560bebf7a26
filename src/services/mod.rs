//! Use-case orchestration over the storage seam

pub mod booking;
pub mod customer;
pub mod heartbeat;
pub mod machine;
pub mod site;

pub use booking::{
    BookingFilters, BookingSearchFilter, BookingService, BookingStats, CreateBookingInput,
    CreateBookingOutcome, PaymentInput,
};
pub use customer::{
    CreateCustomerInput, CustomerSearchKind, CustomerService, MembershipPaymentInput,
    VehicleInput,
};
pub use heartbeat::{ConnectionStats, HeartbeatService, MachineLiveness};
pub use machine::{CreateMachineInput, MachineService, ReleaseBy};
pub use site::{CreateSiteInput, SiteService, SiteStatistics, UpdateSiteInput};
