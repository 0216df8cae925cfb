//! Customer aggregate and its value objects
//!
//! Customers are created through registration. Every input field is parsed
//! into a value object first so that an invalid value can never reach the
//! store:
//! - [`Email`]: trimmed, lowercased, `local@domain` with both parts non-empty
//! - password policy: at least [`MIN_PASSWORD_LENGTH`] characters
//! - [`PhoneNumber`]: non-empty after trimming

use crate::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Minimum number of characters in a customer password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Normalized email address
///
/// Two emails that differ only in case or surrounding whitespace compare
/// equal once parsed, which is what makes the store's uniqueness check
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    /// Normalize and validate a raw email address
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let normalized = raw.trim().to_lowercase();

        match normalized.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
                Ok(Self(normalized))
            }
            _ => Err(ValidationError::InvalidEmail),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Email {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check the password policy
///
/// Length is counted in characters, not bytes, so multi-byte passwords are
/// not penalised.
pub fn validate_password(raw: &str) -> Result<(), ValidationError> {
    if raw.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::PasswordTooShort);
    }
    Ok(())
}

/// Customer phone number (free-form, trimmed)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidPhoneNumber);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Registered customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub email: Email,
    /// Adaptive password hash (PHC string); never serialized
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: String,
    pub phone: PhoneNumber,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Create a new customer, enforcing the non-empty name invariant
    pub fn new(
        id: Uuid,
        email: Email,
        password_hash: String,
        full_name: &str,
        phone: PhoneNumber,
        now: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if full_name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }

        Ok(Self {
            id,
            email,
            password_hash,
            full_name: full_name.to_string(),
            phone,
            created_at: now,
            updated_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_email_normalizes_to_lowercase() {
        let email = Email::parse("  User@EXAMPLE.com ").unwrap();
        assert_eq!(email.as_str(), "user@example.com");
    }

    #[test]
    fn test_email_case_variants_are_equal() {
        let a = Email::parse("User@EXAMPLE.com").unwrap();
        let b = Email::parse("user@example.com").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_email_invalid_formats() {
        for raw in ["", "   ", "userexample.com", "user@", "@example.com", "@"] {
            assert_eq!(
                Email::parse(raw),
                Err(ValidationError::InvalidEmail),
                "expected {raw:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_password_length_boundary() {
        assert!(validate_password("12345678").is_ok());
        assert_eq!(
            validate_password("1234567"),
            Err(ValidationError::PasswordTooShort)
        );
        assert_eq!(validate_password(""), Err(ValidationError::PasswordTooShort));
    }

    #[test]
    fn test_password_counts_characters_not_bytes() {
        // 8 characters, 16 bytes
        assert!(validate_password("пппппппп").is_ok());
        // 7 characters, 14 bytes
        assert!(validate_password("ппппппп").is_err());
    }

    #[test]
    fn test_phone_number() {
        assert_eq!(PhoneNumber::parse(" +1234567890 ").unwrap().as_str(), "+1234567890");
        assert_eq!(
            PhoneNumber::parse("   "),
            Err(ValidationError::InvalidPhoneNumber)
        );
        assert_eq!(PhoneNumber::parse(""), Err(ValidationError::InvalidPhoneNumber));
    }

    #[test]
    fn test_customer_requires_name() {
        let email = Email::parse("user@example.com").unwrap();
        let phone = PhoneNumber::parse("+1").unwrap();

        let err = Customer::new(
            Uuid::new_v4(),
            email.clone(),
            "hash".to_string(),
            "   ",
            phone.clone(),
            Utc::now(),
        )
        .unwrap_err();
        assert_eq!(err, ValidationError::EmptyName);

        let customer = Customer::new(
            Uuid::new_v4(),
            email,
            "hash".to_string(),
            "John Doe",
            phone,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(customer.full_name, "John Doe");
        assert_eq!(customer.created_at, customer.updated_at);
    }

    #[test]
    fn test_customer_name_kept_as_submitted() {
        let customer = Customer::new(
            Uuid::new_v4(),
            Email::parse("user@example.com").unwrap(),
            "hash".to_string(),
            "  John Doe ",
            PhoneNumber::parse("+1").unwrap(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(customer.full_name, "  John Doe ");
    }

    #[test]
    fn test_customer_serialization_hides_hash() {
        let customer = Customer::new(
            Uuid::new_v4(),
            Email::parse("user@example.com").unwrap(),
            "$argon2id$secret".to_string(),
            "John",
            PhoneNumber::parse("+1").unwrap(),
            Utc::now(),
        )
        .unwrap();

        let json = serde_json::to_string(&customer).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("argon2id"));
    }

    proptest! {
        #[test]
        fn prop_email_parse_is_idempotent(local in "[A-Za-z0-9._]{1,16}", domain in "[A-Za-z0-9.]{1,16}") {
            let raw = format!("{local}@{domain}");
            let once = Email::parse(&raw).unwrap();
            let twice = Email::parse(once.as_str()).unwrap();
            prop_assert_eq!(&once, &twice);
            prop_assert_eq!(once.as_str(), raw.to_lowercase());
        }

        #[test]
        fn prop_email_without_at_is_rejected(raw in "[A-Za-z0-9.]{0,32}") {
            prop_assert_eq!(Email::parse(&raw), Err(ValidationError::InvalidEmail));
        }
    }
}
