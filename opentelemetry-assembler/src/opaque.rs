use std::fmt;

use serde::Deserialize;

const REDACTED: &str = "[REDACTED]";

/// A string that never shows up in `Debug` or `Display` output.
///
/// Used for header values, which commonly carry credentials.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct OpaqueString(String);

impl OpaqueString {
    /// Wraps a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        OpaqueString(value.into())
    }

    /// The secret value.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OpaqueString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for OpaqueString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl From<String> for OpaqueString {
    fn from(value: String) -> Self {
        OpaqueString(value)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn never_printed() {
        let headers: HashMap<String, OpaqueString> =
            serde_yaml::from_str("authorization: Bearer secret").unwrap();
        let value = &headers["authorization"];
        assert_eq!(value.expose(), "Bearer secret");
        assert_eq!(value.to_string(), "[REDACTED]");
        assert!(!format!("{headers:?}").contains("secret"));
    }
}
