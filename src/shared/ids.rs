//! Identifier generation
//!
//! Booking numbers, customer codes, membership credentials and OTPs. Every
//! generator is a pure function of its inputs plus an injected RNG/clock so
//! tests can pin both; callers in the services pass `rand::thread_rng()` and
//! `Utc::now()`.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::domain::machine::VehicleClass;

/// Booking number: `BK` + class prefix + last 8 digits of epoch millis.
///
/// Collisions within the same millisecond are tolerated by the contract;
/// uniqueness at current volumes comes from the timestamp tail.
pub fn booking_number(class: VehicleClass, at: DateTime<Utc>) -> String {
    let prefix = match class {
        VehicleClass::TwoWheeler => "TW",
        VehicleClass::FourWheeler => "FW",
    };
    let ms = at.timestamp_millis().unsigned_abs();
    format!("BK{}{:08}", prefix, ms % 100_000_000)
}

/// Customer code: `CUST` + last 6 digits of epoch millis.
pub fn customer_code(at: DateTime<Utc>) -> String {
    let ms = at.timestamp_millis().unsigned_abs();
    format!("CUST{:06}", ms % 1_000_000)
}

/// Six decimal digits, first digit non-zero.
pub fn membership_number(rng: &mut impl Rng) -> String {
    rng.gen_range(100_000u32..=999_999).to_string()
}

/// Four decimal digits, first digit non-zero.
pub fn membership_pin(rng: &mut impl Rng) -> String {
    rng.gen_range(1_000u32..=9_999).to_string()
}

/// Six decimal digits, first digit non-zero.
pub fn otp_code(rng: &mut impl Rng) -> String {
    rng.gen_range(100_000u32..=999_999).to_string()
}

/// Opaque entity id.
pub fn entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Opaque token value (refresh binding, transaction refs).
pub fn opaque_token() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn booking_number_carries_class_prefix_and_epoch_tail() {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
        let ms = at.timestamp_millis() as u64;
        let expected_tail = format!("{:08}", ms % 100_000_000);

        let tw = booking_number(VehicleClass::TwoWheeler, at);
        assert_eq!(tw, format!("BKTW{}", expected_tail));
        let fw = booking_number(VehicleClass::FourWheeler, at);
        assert_eq!(fw, format!("BKFW{}", expected_tail));
    }

    #[test]
    fn customer_code_shape() {
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let code = customer_code(at);
        assert!(code.starts_with("CUST"));
        assert_eq!(code.len(), 10);
    }

    #[test]
    fn generated_credentials_have_no_leading_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let num = membership_number(&mut rng);
            assert_eq!(num.len(), 6);
            assert_ne!(num.as_bytes()[0], b'0');

            let pin = membership_pin(&mut rng);
            assert_eq!(pin.len(), 4);
            assert_ne!(pin.as_bytes()[0], b'0');

            let otp = otp_code(&mut rng);
            assert_eq!(otp.len(), 6);
            assert_ne!(otp.as_bytes()[0], b'0');
        }
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let a = otp_code(&mut StdRng::seed_from_u64(42));
        let b = otp_code(&mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }
}
