//! Errors raised while decoding a configuration and while resolving,
//! starting and shutting down the components it describes.

use std::fmt;
use std::sync::PoisonError;

use thiserror::Error;

use crate::identifier::Identifier;
use crate::signal::SignalKind;

/// Error type used by pluggable components (decoders, exporter constructors,
/// start functions).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors produced by this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Text that does not form a valid `type[/name]` identifier.
    #[error("invalid identifier {text:?}: {reason}")]
    InvalidIdentifier {
        /// The rejected text.
        text: String,
        /// Which rule was violated.
        reason: &'static str,
    },

    /// An attribute value with a tag outside string/int/float/bool.
    #[error("unexpected tag {0}")]
    UnsupportedTag(String),

    /// An attribute value that is neither a scalar nor a sequence.
    #[error("unsupported value shape: {0}")]
    UnsupportedShape(&'static str),

    /// No decoder registered for the identifier's type.
    #[error("{id:?}: unknown type {:?}", .id.type_name())]
    UnknownType {
        /// The offending entry.
        id: Identifier,
    },

    /// The type-specific fields of an entry failed to decode.
    #[error("{id:?}: {source}")]
    Decode {
        /// The offending entry.
        id: Identifier,
        /// What the decoder reported.
        #[source]
        source: serde_yaml::Error,
    },

    /// No provider with this identifier is configured.
    #[error("provider {0:?}: not found")]
    ProviderNotFound(Identifier),

    /// A provider references an exporter that is not configured.
    #[error("exporter {0:?}: not found")]
    ExporterNotFound(Identifier),

    /// A provider references a processor that is not configured.
    #[error("processor {0:?}: not found")]
    ProcessorNotFound(Identifier),

    /// The exporter exists but cannot serve the requested signal.
    #[error("exporter {id:?}: does not support {signal}")]
    ExporterUnsupported {
        /// The exporter.
        id: Identifier,
        /// The signal that was requested from it.
        signal: SignalKind,
    },

    /// Instantiating an exporter failed.
    #[error("exporter {id:?}: {source}")]
    Construction {
        /// The exporter.
        id: Identifier,
        /// What the constructor reported.
        #[source]
        source: BoxError,
    },

    /// A processor failed to contribute its provider options.
    #[error("processor {id:?}: {source}")]
    Processor {
        /// The processor.
        id: Identifier,
        /// What the processor reported.
        #[source]
        source: BoxError,
    },

    /// A deferred start function failed.
    #[error("start exporter {id:?}: {source}")]
    Start {
        /// The exporter.
        id: Identifier,
        /// What the start function reported.
        #[source]
        source: BoxError,
    },

    /// Shutting a component down failed.
    #[error("shutdown {id:?}: {source}")]
    Shutdown {
        /// The exporter or provider.
        id: Identifier,
        /// What the component reported.
        #[source]
        source: BoxError,
    },

    /// The operation's scope was canceled.
    #[error("operation canceled")]
    Canceled,

    /// The operation's scope deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// A group of errors sharing a prefix, e.g. all processor decode errors.
    #[error("{tag}: {source}")]
    Tagged {
        /// The group label.
        tag: &'static str,
        /// The grouped error.
        #[source]
        source: Box<Error>,
    },

    /// Several independent failures.
    #[error(transparent)]
    Joined(Errors),

    /// Malformed YAML text.
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    /// The configuration file could not be read.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Internal state became unusable, e.g. a poisoned lock.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wraps `self` under a group label.
    pub fn tagged(self, tag: &'static str) -> Error {
        Error::Tagged {
            tag,
            source: Box::new(self),
        }
    }

    /// Iterates the leaf errors, flattening groups and joins.
    pub fn leaves(&self) -> Vec<&Error> {
        match self {
            Error::Tagged { source, .. } => source.leaves(),
            Error::Joined(errors) => errors.iter().flat_map(Error::leaves).collect(),
            other => vec![other],
        }
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::Internal(format!("lock poisoned: {err}"))
    }
}

/// A list of errors displayed one per line.
#[derive(Debug, Default)]
pub struct Errors(Vec<Error>);

impl Errors {
    /// Creates an empty list.
    pub fn new() -> Self {
        Errors(Vec::new())
    }

    /// Appends an error.
    pub fn push(&mut self, err: Error) {
        self.0.push(err);
    }

    /// Number of errors.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the errors in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, Error> {
        self.0.iter()
    }

    /// Collapses the list: nothing, the single error, or [`Error::Joined`].
    pub fn into_error(mut self) -> Option<Error> {
        match self.0.len() {
            0 => None,
            1 => self.0.pop(),
            _ => Some(Error::Joined(self)),
        }
    }

    /// `Ok(())` when empty, the collapsed error otherwise.
    pub fn into_result(self) -> Result<()> {
        match self.into_error() {
            None => Ok(()),
            Some(err) => Err(err),
        }
    }
}

impl fmt::Display for Errors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Errors {}

impl From<Vec<Error>> for Errors {
    fn from(errors: Vec<Error>) -> Self {
        Errors(errors)
    }
}

impl FromIterator<Error> for Errors {
    fn from_iter<I: IntoIterator<Item = Error>>(iter: I) -> Self {
        Errors(iter.into_iter().collect())
    }
}

impl IntoIterator for Errors {
    type Item = Error;
    type IntoIter = std::vec::IntoIter<Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Errors {
    type Item = &'a Error;
    type IntoIter = std::slice::Iter<'a, Error>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(text: &str) -> Identifier {
        Identifier::parse(text).unwrap()
    }

    #[test]
    fn collapse_errors() {
        assert!(Errors::new().into_error().is_none());
        assert!(Errors::new().into_result().is_ok());

        let single: Errors = vec![Error::ProcessorNotFound(id("batcher"))].into();
        assert!(matches!(
            single.into_error(),
            Some(Error::ProcessorNotFound(_))
        ));

        let many: Errors = vec![Error::Canceled, Error::DeadlineExceeded].into();
        let err = many.into_error().unwrap();
        assert!(matches!(err, Error::Joined(ref e) if e.len() == 2));
        assert_eq!(err.to_string(), "operation canceled\ndeadline exceeded");
    }

    #[test]
    fn tagged_display_and_leaves() {
        let joined: Errors = vec![
            Error::UnknownType { id: id("unknown_type") },
            Error::UnknownType { id: id("other/x") },
        ]
        .into();
        let err = Error::Joined(joined).tagged("processor");

        let message = err.to_string();
        assert!(message.starts_with("processor: "));
        assert!(message.contains("\"unknown_type\": unknown type \"unknown_type\""));
        assert!(message.contains("\"other/x\": unknown type \"other\""));
        assert_eq!(err.leaves().len(), 2);
    }
}
