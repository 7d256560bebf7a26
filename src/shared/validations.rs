//! Input format validation
//!
//! Domain formats (plates, phones, operator IDs, OTPs, …) are checked here
//! and nowhere else. Each check returns a structured field error so the
//! response envelope can report exactly which input was rejected.

use crate::shared::types::{DomainError, DomainResult, PageRequest};

/// Maximum accepted length for any free-text input after sanitization.
const MAX_TEXT_LEN: usize = 1000;

fn all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Indian mobile number: ten digits, first digit 6-9.
pub fn validate_phone(phone: &str) -> DomainResult<()> {
    let ok = phone.len() == 10
        && matches!(phone.as_bytes()[0], b'6'..=b'9')
        && all_digits(phone);
    if ok {
        Ok(())
    } else {
        Err(DomainError::validation(
            "phone",
            "must be a 10-digit mobile number starting with 6-9",
        ))
    }
}

/// Minimal e-mail shape: one `@`, no whitespace, dotted domain, length cap.
pub fn validate_email(email: &str) -> DomainResult<()> {
    let valid = email.len() <= 255 && {
        let mut parts = email.split('@');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(local), Some(domain), None) => {
                !local.is_empty()
                    && !email.chars().any(char::is_whitespace)
                    && domain.split('.').count() >= 2
                    && domain.split('.').all(|seg| !seg.is_empty())
            }
            _ => false,
        }
    };
    if valid {
        Ok(())
    } else {
        Err(DomainError::validation("email", "is not a valid e-mail address"))
    }
}

/// Operator ID: `OP` followed by 3 to 6 digits.
pub fn validate_operator_id(operator_id: &str) -> DomainResult<()> {
    let digits = operator_id.strip_prefix("OP").unwrap_or("");
    if (3..=6).contains(&digits.len()) && all_digits(digits) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "operatorId",
            "must match OP followed by 3-6 digits",
        ))
    }
}

/// Person name: non-empty, at most 100 chars, letters and spaces only.
pub fn validate_name(field: &'static str, name: &str) -> DomainResult<()> {
    let ok = !name.trim().is_empty()
        && name.chars().count() <= 100
        && name.chars().all(|c| c.is_alphabetic() || c == ' ');
    if ok {
        Ok(())
    } else {
        Err(DomainError::validation(
            field,
            "must be 1-100 letters and spaces",
        ))
    }
}

/// Vehicle plate, e.g. `KA01AB1234`: two letters, one or two digits, one or
/// two letters, four digits. Input is uppercased first; the normalized plate
/// is returned.
pub fn normalize_plate(plate: &str) -> DomainResult<String> {
    let plate = plate.trim().to_uppercase();
    let b = plate.as_bytes();

    let err = || {
        DomainError::Validation(vec![crate::shared::types::FieldError::new(
            "vehicleNumber",
            "must look like KA01AB1234",
        )
        .with_value(plate.clone())])
    };

    if !(8..=10).contains(&b.len()) {
        return Err(err());
    }
    let mut i = 0;
    // two letters
    if !(b.len() >= 2 && b[0].is_ascii_uppercase() && b[1].is_ascii_uppercase()) {
        return Err(err());
    }
    i += 2;
    // one or two digits
    let digit_start = i;
    while i < b.len() && b[i].is_ascii_digit() {
        i += 1;
    }
    if !(1..=2).contains(&(i - digit_start)) {
        return Err(err());
    }
    // one or two letters
    let letter_start = i;
    while i < b.len() && b[i].is_ascii_uppercase() {
        i += 1;
    }
    if !(1..=2).contains(&(i - letter_start)) {
        return Err(err());
    }
    // exactly four digits to the end
    if b.len() - i != 4 || !b[i..].iter().all(u8::is_ascii_digit) {
        return Err(err());
    }

    Ok(plate)
}

/// Machine code: `M` followed by exactly three digits.
pub fn validate_machine_code(code: &str) -> DomainResult<()> {
    let digits = code.strip_prefix('M').unwrap_or("");
    if digits.len() == 3 && all_digits(digits) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "machineNumber",
            "must match M followed by 3 digits",
        ))
    }
}

/// Pallet number as the booking layer sees it: any positive integer.
/// Whether the pallet exists on the machine is the pallet engine's call.
pub fn validate_pallet_number(number: i64) -> DomainResult<u32> {
    if number >= 1 && number <= u32::MAX as i64 {
        Ok(number as u32)
    } else {
        Err(DomainError::validation(
            "palletNumber",
            "must be a positive integer",
        ))
    }
}

/// Six-digit one-time password.
pub fn validate_otp(otp: &str) -> DomainResult<()> {
    if otp.len() == 6 && all_digits(otp) {
        Ok(())
    } else {
        Err(DomainError::validation("otp", "must be 6 digits"))
    }
}

/// Six-digit membership number.
pub fn validate_membership_number(number: &str) -> DomainResult<()> {
    if number.len() == 6 && all_digits(number) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "membershipNumber",
            "must be 6 digits",
        ))
    }
}

/// Four-digit membership PIN.
pub fn validate_pin(pin: &str) -> DomainResult<()> {
    if pin.len() == 4 && all_digits(pin) {
        Ok(())
    } else {
        Err(DomainError::validation("pin", "must be 4 digits"))
    }
}

/// Postal pincode: six digits, no leading zero.
pub fn validate_pincode(pincode: &str) -> DomainResult<()> {
    let ok = pincode.len() == 6
        && matches!(pincode.as_bytes()[0], b'1'..=b'9')
        && all_digits(pincode);
    if ok {
        Ok(())
    } else {
        Err(DomainError::validation(
            "pincode",
            "must be 6 digits and not start with 0",
        ))
    }
}

/// Site code: `SITE` followed by 3 to 6 digits.
pub fn validate_site_code(code: &str) -> DomainResult<()> {
    let digits = code.strip_prefix("SITE").unwrap_or("");
    if (3..=6).contains(&digits.len()) && all_digits(digits) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "siteCode",
            "must match SITE followed by 3-6 digits",
        ))
    }
}

/// Clamp pagination inputs: page >= 1, limit in 1..=100.
pub fn validate_pagination(
    page: Option<u32>,
    limit: Option<u32>,
    default_limit: u32,
) -> PageRequest {
    PageRequest {
        page: page.unwrap_or(1).max(1),
        limit: limit.unwrap_or(default_limit).clamp(1, 100),
    }
}

/// Trim, strip angle brackets and quotes, cap length.
pub fn sanitize(input: &str) -> String {
    input
        .trim()
        .chars()
        .filter(|c| !matches!(c, '<' | '>' | '\'' | '"'))
        .take(MAX_TEXT_LEN)
        .collect()
}
