//! Core business entities and invariants

pub mod booking;
pub mod customer;
pub mod machine;
pub mod site;
pub mod user;

pub use booking::{
    Booking, BookingPayment, BookingStatus, DurationParts, OtpBlock, PaymentMethod, PaymentStatus,
};
pub use customer::{
    Customer, CustomerStatus, Membership, MembershipPayment, MembershipPlan, Vehicle,
};
pub use machine::{
    vehicles_per_pallet, ConnectionStatus, Machine, MachineCapacity, MachineIntegration,
    MachineKind, MachineSpecs, MachineStatus, Pallet, PalletKey, PalletOccupant, PalletStatus,
    ServiceRecord, VehicleClass,
};
pub use site::{Address, ClassRate, DayHours, GeoPoint, OperatingHours, Pricing, Site, SiteStatus};
pub use user::{Role, SiteAssignment, SiteRole, User, UserStatus};
