//! Booking domain entity
//!
//! One parking session: customer + vehicle + pallet, from creation through
//! completion or cancellation. Customer name, phone, machine code and pallet
//! number are stored as values so the history survives renames and
//! soft-deletes.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::machine::VehicleClass;
use crate::shared::types::{DomainError, DomainResult};

/// Booking lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Completed,
    Cancelled,
    /// Reserved; nothing in the core drives this transition automatically.
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Expired => "expired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "expired" => Some(Self::Expired),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a payment was made
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
    Membership,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Card => "card",
            Self::Upi => "upi",
            Self::Membership => "membership",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "cash" => Some(Self::Cash),
            "card" => Some(Self::Card),
            "upi" => Some(Self::Upi),
            "membership" => Some(Self::Membership),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

/// Time-bound retrieval OTP
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtpBlock {
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
}

impl OtpBlock {
    pub fn issue(code: impl Into<String>, now: DateTime<Utc>, ttl_minutes: i64) -> Self {
        Self {
            code: code.into(),
            issued_at: now,
            expires_at: now + Duration::minutes(ttl_minutes),
            is_used: false,
            used_at: None,
        }
    }

    /// Redeemable iff never used and strictly before expiry.
    pub fn is_redeemable(&self, now: DateTime<Utc>) -> bool {
        !self.is_used && self.expires_at > now
    }

    pub fn consume(&mut self, now: DateTime<Utc>) {
        self.is_used = true;
        self.used_at = Some(now);
    }
}

/// Payment captured on completion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPayment {
    pub amount: f64,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_ref: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub membership_number: Option<String>,
    pub base_rate: Option<f64>,
    pub additional_charges: f64,
    pub discount: f64,
    pub tax: f64,
}

/// Elapsed session time split into hours and minutes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationParts {
    pub hours: i64,
    pub minutes: i64,
}

impl DurationParts {
    pub fn between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        let total_minutes = (end - start).num_minutes().max(0);
        Self {
            hours: total_minutes / 60,
            minutes: total_minutes % 60,
        }
    }
}

/// Parking session
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: String,
    /// `BK{TW|FW}{epoch tail}`
    pub number: String,
    pub customer_id: String,
    // Denormalized copies; deliberate historical record, not references.
    pub customer_name: String,
    pub phone_number: String,
    pub vehicle_number: String,
    pub vehicle_class: VehicleClass,
    pub machine_number: String,
    pub pallet_number: u32,
    pub status: BookingStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub otp: OtpBlock,
    pub payment: Option<BookingPayment>,
    pub notes: Option<String>,
    pub special_instructions: Option<String>,
    pub site_id: String,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
    pub completed_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        number: impl Into<String>,
        customer_id: impl Into<String>,
        customer_name: impl Into<String>,
        phone_number: impl Into<String>,
        vehicle_number: impl Into<String>,
        vehicle_class: VehicleClass,
        machine_number: impl Into<String>,
        pallet_number: u32,
        site_id: impl Into<String>,
        otp: OtpBlock,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            number: number.into(),
            customer_id: customer_id.into(),
            customer_name: customer_name.into(),
            phone_number: phone_number.into(),
            vehicle_number: vehicle_number.into(),
            vehicle_class,
            machine_number: machine_number.into(),
            pallet_number,
            status: BookingStatus::Active,
            start_time: now,
            end_time: None,
            otp,
            payment: None,
            notes: None,
            special_instructions: None,
            site_id: site_id.into(),
            created_by: None,
            updated_by: None,
            completed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }

    /// Session duration up to `end_time`, or up to `now` while active.
    pub fn duration(&self, now: DateTime<Utc>) -> DurationParts {
        DurationParts::between(self.start_time, self.end_time.unwrap_or(now))
    }

    /// Terminal transition: active → completed, capturing payment.
    pub fn complete(
        &mut self,
        payment: Option<BookingPayment>,
        completed_by: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != BookingStatus::Active {
            return Err(DomainError::IllegalTransition(format!(
                "booking {} is {}, only active bookings can be completed",
                self.number, self.status
            )));
        }
        self.end_time = Some(now);
        if let Some(mut p) = payment {
            p.status = PaymentStatus::Completed;
            p.paid_at = Some(now);
            self.payment = Some(p);
        }
        self.status = BookingStatus::Completed;
        self.completed_by = completed_by;
        self.updated_at = now;
        Ok(())
    }

    /// Terminal transition: non-terminal → cancelled; no payment capture.
    pub fn cancel(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::IllegalTransition(format!(
                "booking {} is already {}",
                self.number, self.status
            )));
        }
        self.status = BookingStatus::Cancelled;
        if let Some(reason) = reason {
            self.append_note(&format!("Cancelled: {}", reason));
        }
        self.end_time = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Record an extension. The OTP expiry is not touched.
    pub fn extend(
        &mut self,
        hours: i64,
        minutes: i64,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if self.status != BookingStatus::Active {
            return Err(DomainError::IllegalTransition(format!(
                "booking {} is {}, only active bookings can be extended",
                self.number, self.status
            )));
        }
        if hours <= 0 && minutes <= 0 {
            return Err(DomainError::BadRequest(
                "extension requires a positive duration".to_string(),
            ));
        }
        let mut note = format!("Extended by {}h {}m", hours.max(0), minutes.max(0));
        if let Some(reason) = reason {
            note.push_str(&format!(" ({})", reason));
        }
        self.append_note(&note);
        self.updated_at = now;
        Ok(())
    }

    /// Replace the OTP block with a fresh one; active bookings only.
    pub fn reissue_otp(&mut self, otp: OtpBlock, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != BookingStatus::Active {
            return Err(DomainError::IllegalTransition(format!(
                "booking {} is {}, cannot issue a new OTP",
                self.number, self.status
            )));
        }
        self.otp = otp;
        self.updated_at = now;
        Ok(())
    }

    pub fn append_note(&mut self, note: &str) {
        match &mut self.notes {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(note);
            }
            None => self.notes = Some(note.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_booking(now: DateTime<Utc>) -> Booking {
        Booking::new(
            "b1",
            "BKTW12345678",
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
        )
    }

    #[test]
    fn otp_expiry_boundary_is_strict() {
        let now = Utc::now();
        let otp = OtpBlock::issue("482913", now, 30);
        assert!(otp.is_redeemable(now + Duration::minutes(30) - Duration::milliseconds(1)));
        assert!(!otp.is_redeemable(now + Duration::minutes(30)));
    }

    #[test]
    fn consumed_otp_is_not_redeemable() {
        let now = Utc::now();
        let mut otp = OtpBlock::issue("482913", now, 30);
        otp.consume(now);
        assert!(!otp.is_redeemable(now));
        assert_eq!(otp.used_at, Some(now));
    }

    #[test]
    fn complete_captures_payment_and_duration() {
        let now = Utc::now();
        let mut booking = sample_booking(now);
        let end = now + Duration::minutes(150);
        booking
            .complete(
                Some(BookingPayment {
                    amount: 80.0,
                    method: PaymentMethod::Upi,
                    status: PaymentStatus::Pending,
                    transaction_ref: Some("TXN123".into()),
                    paid_at: None,
                    membership_number: None,
                    base_rate: Some(20.0),
                    additional_charges: 0.0,
                    discount: 0.0,
                    tax: 0.0,
                }),
                Some("OP100".into()),
                end,
            )
            .unwrap();

        assert_eq!(booking.status, BookingStatus::Completed);
        let payment = booking.payment.as_ref().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.paid_at, Some(end));
        assert_eq!(
            booking.duration(end),
            DurationParts {
                hours: 2,
                minutes: 30
            }
        );
    }

    #[test]
    fn terminal_bookings_reject_further_transitions() {
        let now = Utc::now();
        let mut booking = sample_booking(now);
        booking.complete(None, None, now).unwrap();

        assert!(matches!(
            booking.complete(None, None, now),
            Err(DomainError::IllegalTransition(_))
        ));
        assert!(matches!(
            booking.cancel(Some("late"), now),
            Err(DomainError::IllegalTransition(_))
        ));
        assert!(matches!(
            booking.extend(1, 0, None, now),
            Err(DomainError::IllegalTransition(_))
        ));
    }

    #[test]
    fn cancel_appends_reason_to_notes() {
        let now = Utc::now();
        let mut booking = sample_booking(now);
        booking.cancel(Some("customer left"), now).unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert!(booking.notes.as_deref().unwrap().contains("customer left"));
    }

    #[test]
    fn extension_requires_positive_duration() {
        let now = Utc::now();
        let mut booking = sample_booking(now);
        assert!(matches!(
            booking.extend(0, 0, None, now),
            Err(DomainError::BadRequest(_))
        ));
        booking.extend(0, 45, Some("airport run"), now).unwrap();
        assert!(booking.notes.as_deref().unwrap().contains("0h 45m"));
    }

    #[test]
    fn reissue_otp_keeps_booking_active() {
        let now = Utc::now();
        let mut booking = sample_booking(now);
        let later = now + Duration::minutes(10);
        booking
            .reissue_otp(OtpBlock::issue("771122", later, 30), later)
            .unwrap();
        assert_eq!(booking.otp.code, "771122");
        assert_eq!(booking.status, BookingStatus::Active);
        assert!(booking.otp.is_redeemable(later));
    }
}
