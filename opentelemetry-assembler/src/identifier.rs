//! # Component identifiers
//!
//! Every processor, exporter and provider in a configuration is named by a
//! composite `type[/name]` key. The type selects the decoder in a
//! [`Registry`](crate::registry::Registry); the optional name distinguishes
//! several instances of the same type.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::error::Error;

/// Separator between the type and the name parts.
const TYPE_AND_NAME_SEPARATOR: char = '/';

/// Immutable `type[/name]` key.
///
/// Equality and ordering are those of the textual form, so identifiers can be
/// used directly as map keys.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(try_from = "String")]
pub struct Identifier {
    repr: String,
}

impl Identifier {
    /// Parses and validates `type[/name]` text.
    ///
    /// Surrounding whitespace of each part is ignored. The type must start with
    /// an ASCII letter followed by at most 62 ASCII alphanumerics or `_`. A name,
    /// when the separator is present, must be non-empty and free of whitespace,
    /// control characters and symbols.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let (type_part, name_part) = match text.split_once(TYPE_AND_NAME_SEPARATOR) {
            Some((type_part, name_part)) => (type_part.trim(), Some(name_part.trim())),
            None => (text.trim(), None),
        };

        if type_part.is_empty() {
            let reason = if name_part.is_some() {
                "the part before '/' must not be empty"
            } else {
                "identifier must not be empty"
            };
            return Err(invalid(text, reason));
        }
        if !is_valid_type(type_part) {
            return Err(invalid(text, "invalid character(s) in type"));
        }

        let repr = match name_part {
            None => type_part.to_string(),
            Some("") => return Err(invalid(text, "the part after '/' must not be empty")),
            Some(name) if !is_valid_name(name) => {
                return Err(invalid(text, "invalid character(s) in name"))
            }
            Some(name) => format!("{type_part}{TYPE_AND_NAME_SEPARATOR}{name}"),
        };

        Ok(Identifier { repr })
    }

    /// The type part, used to select a decoder.
    pub fn type_name(&self) -> &str {
        self.split().0
    }

    /// The name part, if any.
    pub fn name(&self) -> Option<&str> {
        self.split().1
    }

    /// Returns an identifier with the same type and the given name.
    ///
    /// The name is trimmed like in [`parse`](Identifier::parse), and an empty
    /// name strips the name part. The name is not otherwise validated: an
    /// identifier built this way is only ever used for lookups.
    pub fn with_name(&self, name: &str) -> Identifier {
        let type_part = self.type_name();
        let name = name.trim();
        if name.is_empty() {
            return Identifier {
                repr: type_part.to_string(),
            };
        }
        Identifier {
            repr: format!("{type_part}{TYPE_AND_NAME_SEPARATOR}{name}"),
        }
    }

    /// The textual form.
    pub fn as_str(&self) -> &str {
        &self.repr
    }

    // Builds an identifier for a fixed, known-valid type such as `tracer`.
    pub(crate) fn from_static_type(type_name: &'static str) -> Identifier {
        debug_assert!(is_valid_type(type_name));
        Identifier {
            repr: type_name.to_string(),
        }
    }

    fn split(&self) -> (&str, Option<&str>) {
        match self.repr.split_once(TYPE_AND_NAME_SEPARATOR) {
            Some((type_part, name_part)) => (type_part, Some(name_part)),
            None => (&self.repr, None),
        }
    }
}

fn invalid(text: &str, reason: &'static str) -> Error {
    Error::InvalidIdentifier {
        text: text.to_string(),
        reason,
    }
}

// A letter followed by at most 62 letters, digits or underscores.
static TYPE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][0-9a-zA-Z_]{0,62}$").expect("valid type pattern"));

// No separators, control, format, private-use or symbol characters.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\pZ\pC\pS]+$").expect("valid name pattern"));

fn is_valid_type(type_part: &str) -> bool {
    TYPE_PATTERN.is_match(type_part)
}

fn is_valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repr)
    }
}

// Quoted, so messages read `"otlp/primary": ...`.
impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.repr, f)
    }
}

impl FromStr for Identifier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Identifier::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Identifier::parse(&value)
    }
}

impl TryFrom<&str> for Identifier {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Identifier::parse(value)
    }
}
