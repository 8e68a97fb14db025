//! Custom message headers.

use crate::error::{Error, Result};

/// A single header line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    name: String,
    value: String,
}

impl Header {
    /// Creates a header after validating its name and value.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a valid field name, or if the
    /// value contains CR or LF.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();

        let valid_name =
            !name.is_empty() && name.bytes().all(|b| (33..=126).contains(&b) && b != b':');
        if !valid_name {
            return Err(Error::InvalidHeaderName(name));
        }
        if value.contains(['\r', '\n']) {
            return Err(Error::HeaderInjection(format!("header {name}")));
        }

        Ok(Self { name, value })
    }

    /// Header name, as given.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header value (unescaped).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Ordered collection of custom headers.
///
/// Names are matched case-insensitively. Iteration order follows the first
/// insertion of each name; replacing a name keeps its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, Vec<Header>)>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a header value.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid (see [`Header::new`]).
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let header = Header::new(name, value)?;
        let key = header.name.to_ascii_lowercase();

        match self.position(&key) {
            Some(index) => self.entries[index].1.push(header),
            None => self.entries.push((key, vec![header])),
        }
        Ok(())
    }

    /// Sets a header value, replacing any existing values for that name.
    ///
    /// # Errors
    ///
    /// Returns an error if the header is invalid (see [`Header::new`]).
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let header = Header::new(name, value)?;
        let key = header.name.to_ascii_lowercase();

        match self.position(&key) {
            Some(index) => self.entries[index].1 = vec![header],
            None => self.entries.push((key, vec![header])),
        }
        Ok(())
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).next()
    }

    /// Gets all values for a header, in insertion order.
    pub fn get_all<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a str> + use<'a> {
        let key = name.to_ascii_lowercase();
        self.entries
            .iter()
            .filter(move |(k, _)| *k == key)
            .flat_map(|(_, values)| values.iter().map(Header::value))
    }

    /// Removes all values for a header.
    pub fn remove(&mut self, name: &str) {
        let key = name.to_ascii_lowercase();
        self.entries.retain(|(k, _)| *k != key);
    }

    /// Returns true if there are no headers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.entries.iter().flat_map(|(_, values)| values.iter())
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(k, _)| k == key)
    }
}
