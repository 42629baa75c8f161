//! Validated text newtypes shared by the clinic crates.
//!
//! Construction is the only way to obtain a value, so a stored
//! [`Email`] or [`Identification`] is always well-formed. Inputs are
//! trimmed during construction.

/// Errors that can occur when creating validated text types.
#[derive(Debug, thiserror::Error)]
pub enum TextError {
    /// The input text was empty or contained only whitespace
    #[error("Text cannot be empty")]
    Empty,
    /// The input text exceeded the allowed length
    #[error("Text cannot exceed {max} characters")]
    TooLong { max: usize },
    /// The input was not a plausible email address
    #[error("Not a valid email address")]
    InvalidEmail,
}

/// A string type that guarantees non-empty content.
///
/// Wraps a `String` and ensures it contains at least one
/// non-whitespace character after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonEmptyText(String);

impl NonEmptyText {
    /// Creates a new `NonEmptyText` from the given input.
    ///
    /// The input is trimmed of leading and trailing whitespace. If the
    /// trimmed result is empty, an error is returned.
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the inner string as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A lowercase, minimally validated email address.
///
/// The check is intentionally shallow (non-empty local part and a
/// domain containing a dot); deliverability is not this type's
/// concern. The address is lowercased so that lookups are
/// case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email(String);

impl Email {
    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        let Some((local, domain)) = trimmed.split_once('@') else {
            return Err(TextError::InvalidEmail);
        };
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(TextError::InvalidEmail);
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A patient identification (document) number.
///
/// Non-empty, at most 20 characters, digits/letters/dashes only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification(String);

impl Identification {
    pub const MAX_LEN: usize = 20;

    pub fn new(input: impl AsRef<str>) -> Result<Self, TextError> {
        let trimmed = input.as_ref().trim();
        if trimmed.is_empty() {
            return Err(TextError::Empty);
        }
        if trimmed.chars().count() > Self::MAX_LEN {
            return Err(TextError::TooLong { max: Self::MAX_LEN });
        }
        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! text_type_impls {
    ($ty:ident) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl serde::Serialize for $ty {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $ty::new(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

text_type_impls!(NonEmptyText);
text_type_impls!(Email);
text_type_impls!(Identification);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_empty_text_trims_and_accepts() {
        let t = NonEmptyText::new("  Ana María  ").unwrap();
        assert_eq!(t.as_str(), "Ana María");
    }

    #[test]
    fn non_empty_text_rejects_whitespace_only() {
        assert!(matches!(NonEmptyText::new(" \t\n"), Err(TextError::Empty)));
    }

    #[test]
    fn email_is_lowercased() {
        let e = Email::new("Ana.Lopez@Clinic.example.CO").unwrap();
        assert_eq!(e.as_str(), "ana.lopez@clinic.example.co");
    }

    #[test]
    fn email_rejects_malformed_addresses() {
        for bad in ["", "no-at-sign", "@clinic.co", "ana@", "ana@localhost"] {
            assert!(Email::new(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn identification_enforces_max_length() {
        assert!(Identification::new("123456789012345678901").is_err());
        let id = Identification::new(" 1094567890 ").unwrap();
        assert_eq!(id.as_str(), "1094567890");
    }

    #[test]
    fn serde_round_trip_validates_on_deserialize() {
        let json = "\"ana@clinic.example.co\"";
        let e: Email = serde_json::from_str(json).unwrap();
        assert_eq!(serde_json::to_string(&e).unwrap(), json);

        let bad: Result<Email, _> = serde_json::from_str("\"not-an-email\"");
        assert!(bad.is_err());
    }
}
