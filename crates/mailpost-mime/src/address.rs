//! E-mail address type.

use crate::error::{Error, Result};
use email_address::{EmailAddress, Options};
use std::fmt;

/// Mailbox: an e-mail address with an optional display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Address {
    email: String,
    name: Option<String>,
}

impl Address {
    /// Creates an address without a display name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not valid mailbox syntax.
    pub fn new(email: impl Into<String>) -> Result<Self> {
        let email = email.into();
        Self::validate(&email)?;
        Ok(Self { email, name: None })
    }

    /// Creates an address with a display name.
    ///
    /// An empty name is treated as no name.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the name contains CR/LF.
    pub fn with_name(email: impl Into<String>, name: impl Into<String>) -> Result<Self> {
        let mut address = Self::new(email)?;
        let name = name.into();

        if name.contains(['\r', '\n']) {
            return Err(Error::HeaderInjection("display name".into()));
        }
        if !name.is_empty() {
            address.name = Some(name);
        }
        Ok(address)
    }

    /// Returns the e-mail address.
    #[must_use]
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Returns the display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn validate(email: &str) -> Result<()> {
        if email.contains(['\r', '\n']) {
            return Err(Error::HeaderInjection("e-mail address".into()));
        }
        // A bare addr-spec only; `Name <addr>` belongs in `with_name`
        let options = Options::default().without_display_text();
        EmailAddress::parse_with_options(email, options)
            .map_err(|_| Error::InvalidAddress(email.to_string()))?;
        Ok(())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{name} <{}>", self.email),
            None => write!(f, "{}", self.email),
        }
    }
}

impl std::str::FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_address() {
        let addr = Address::new("user@example.com").unwrap();
        assert_eq!(addr.email(), "user@example.com");
        assert_eq!(addr.name(), None);
    }

    #[test]
    fn test_with_name() {
        let addr = Address::with_name("john@example.com", "John Doe").unwrap();
        assert_eq!(addr.name(), Some("John Doe"));
        assert_eq!(addr.to_string(), "John Doe <john@example.com>");
    }

    #[test]
    fn test_empty_name_is_none() {
        let addr = Address::with_name("john@example.com", "").unwrap();
        assert_eq!(addr.name(), None);
    }

    #[test]
    fn test_invalid_addresses() {
        let invalid = [
            "",
            "userexample.com",
            "@example.com",
            "user@",
            "a b@example.com",
            "Evil <a@example.com>",
            "<a@example.com>",
        ];
        for bad in invalid {
            assert!(
                matches!(Address::new(bad), Err(Error::InvalidAddress(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_name_injection_rejected() {
        let result = Address::with_name("john@example.com", "John\r\nBcc: x@example.com");
        assert!(matches!(result, Err(Error::HeaderInjection(_))));

        let result = Address::with_name("john@example.com", "John\nDoe");
        assert!(matches!(result, Err(Error::HeaderInjection(_))));
    }

    #[test]
    fn test_from_str() {
        let addr: Address = "blub@test.org".parse().unwrap();
        assert_eq!(addr.email(), "blub@test.org");
    }
}
