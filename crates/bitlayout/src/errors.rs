//! Error types for path decoding, bit reading, flattening and wire conversion.

/// Errors produced when reading bits from a byte slice (e.g. during [crate::decode::decode]).
///
/// Every variant means the layout and the buffer disagree; none of them is
/// fatal to neighbouring fields.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    /// Requested bit range is beyond the end of the data.
    #[error("bit range {bitpos}+{bitsize} is outside a {len}-byte buffer")]
    OutOfBounds { bitpos: u64, bitsize: u64, len: usize },
    /// More than 128 bits were requested in a single integer read.
    #[error("cannot read {0} bits as one integer")]
    TooManyBitsRead(u64),
    /// Assembled value does not fit in the requested width.
    #[error("value does not fit in {0} bits")]
    ValueOutOfRange(u64),
    /// A byte read was requested on a range that is not byte aligned.
    #[error("bit range {bitpos}+{bitsize} is not byte aligned")]
    Misaligned { bitpos: u64, bitsize: u64 },
}

/// A path token that does not follow the `<prefix><body>@<rank>` grammar.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed path token {token:?}: {reason}")]
pub struct FormatError {
    pub token: String,
    pub reason: &'static str,
}

impl FormatError {
    pub(crate) fn new(token: &str, reason: &'static str) -> Self {
        Self {
            token: token.to_string(),
            reason,
        }
    }
}

/// Errors produced when converting wire-format descriptions (see
/// `crate::serde`) into core types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Path(#[from] FormatError),
    /// A kind-specific attribute is absent.
    #[error("{kind} is missing `{attribute}`")]
    MissingAttribute {
        kind: String,
        attribute: &'static str,
    },
}

/// A subtree the flattener could not describe. It is dropped from the layout
/// and flattening continues with its siblings.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unsupported type {name:?} (code {code}) at {path:?}")]
pub struct UnsupportedType {
    /// Code reported by the type source.
    pub code: String,
    /// Type name, empty when anonymous.
    pub name: String,
    /// Rendered path of the dropped member.
    pub path: String,
}
