//! Qualified identifier types for elements and schema elements
//!
//! Two identifier formats exist in the store:
//!
//! - element id: `"<domainName>:<localKey>"`
//! - schema element id: `"<schemaName>.<localName>"`
//!
//! The separators `:` and `.` are reserved and must not appear inside local
//! keys or local names. Both types validate on construction so that every
//! held instance is well-formed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between a domain name and a local key in an element id.
pub const ELEMENT_SEPARATOR: char = ':';

/// Separator between a schema name and a local name in a schema element id.
pub const SCHEMA_SEPARATOR: char = '.';

/// Error raised when an identifier fails validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    #[error("identifier '{id}' is missing the '{separator}' separator")]
    MissingSeparator { id: String, separator: char },

    #[error("identifier '{id}' has an empty {part} part")]
    EmptyPart { id: String, part: &'static str },

    #[error("identifier part '{part}' contains reserved character '{ch}'")]
    ReservedCharacter { part: String, ch: char },
}

fn check_part(part: &str, label: &'static str, id: &str) -> Result<(), IdentifierError> {
    if part.is_empty() {
        return Err(IdentifierError::EmptyPart {
            id: id.to_string(),
            part: label,
        });
    }
    for ch in [ELEMENT_SEPARATOR, SCHEMA_SEPARATOR] {
        if part.contains(ch) {
            return Err(IdentifierError::ReservedCharacter {
                part: part.to_string(),
                ch,
            });
        }
    }
    Ok(())
}

/// Identity of a model element instance: `"<domainName>:<localKey>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElementId(String);

impl ElementId {
    /// Build an element id from a domain name and a local key
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError` if either part is empty or contains a
    /// reserved separator character.
    pub fn new(domain: &str, key: &str) -> Result<Self, IdentifierError> {
        check_part(domain, "domain", domain)?;
        check_part(key, "key", key)?;
        Ok(Self(format!("{domain}{ELEMENT_SEPARATOR}{key}")))
    }

    /// Parse a qualified element id string
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError` if the separator is missing or either part
    /// is malformed.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let (domain, key) =
            s.split_once(ELEMENT_SEPARATOR)
                .ok_or_else(|| IdentifierError::MissingSeparator {
                    id: s.to_string(),
                    separator: ELEMENT_SEPARATOR,
                })?;
        Self::new(domain, key)
    }

    /// The domain name part
    pub fn domain(&self) -> &str {
        // Invariant: constructed ids always contain the separator
        self.0.split(ELEMENT_SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The local key part
    pub fn key(&self) -> &str {
        self.0
            .split_once(ELEMENT_SEPARATOR)
            .map(|(_, k)| k)
            .unwrap_or(&self.0)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a schema element: `"<schemaName>.<localName>"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaElementId(String);

impl SchemaElementId {
    /// Build a schema element id from a schema name and a local name
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError` if either part is empty or contains a
    /// reserved separator character.
    pub fn new(schema: &str, name: &str) -> Result<Self, IdentifierError> {
        check_part(schema, "schema", schema)?;
        check_part(name, "name", name)?;
        Ok(Self(format!("{schema}{SCHEMA_SEPARATOR}{name}")))
    }

    /// Parse a qualified schema element id string
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError` if the separator is missing or either part
    /// is malformed.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        let (schema, name) =
            s.split_once(SCHEMA_SEPARATOR)
                .ok_or_else(|| IdentifierError::MissingSeparator {
                    id: s.to_string(),
                    separator: SCHEMA_SEPARATOR,
                })?;
        Self::new(schema, name)
    }

    /// The schema name part
    pub fn schema(&self) -> &str {
        self.0.split(SCHEMA_SEPARATOR).next().unwrap_or(&self.0)
    }

    /// The local name part
    pub fn name(&self) -> &str {
        self.0
            .split_once(SCHEMA_SEPARATOR)
            .map(|(_, n)| n)
            .unwrap_or(&self.0)
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SchemaElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
