//! Field descriptors: the atomic, bit-addressed leaves of a flattened type.

use crate::{path::Path, types::Enumerator};

/// One atomic field with its absolute bit range inside the root type.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub path: Path,
    /// Debugger-style spelling of the field's type.
    pub pretty: String,
    /// Tagged name of the field's type; empty for anonymous or derived types.
    pub type_name: String,
    /// Offset from the start of the root, in bits.
    pub bitpos: u64,
    /// Width in bits. Only flexible character arrays may report 0.
    pub bitsize: u64,
    pub kind: FieldKind,
}

/// Kind-specific attributes of a [`FieldDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum FieldKind {
    Ptr(Pointee),
    /// Character array; the pointee describes the character type.
    String(Pointee),
    Enum {
        signed: bool,
        members: Vec<Enumerator>,
    },
    Integer {
        signed: bool,
    },
    Float,
    Boolean {
        signed: bool,
    },
}

/// What a pointer points at, or the element type of a character array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pointee {
    pub name: String,
    pub pretty: String,
    /// Tagged name after stripping typedefs.
    pub raw: String,
    /// Size in bytes.
    pub size_of: u64,
}

impl FieldKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldKind::Ptr(_) => "ptr",
            FieldKind::String(_) => "string",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Integer { .. } => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean { .. } => "boolean",
        }
    }

    pub fn signed(&self) -> Option<bool> {
        match self {
            FieldKind::Enum { signed, .. }
            | FieldKind::Integer { signed }
            | FieldKind::Boolean { signed } => Some(*signed),
            FieldKind::Ptr(_) | FieldKind::String(_) | FieldKind::Float => None,
        }
    }

    pub fn pointee(&self) -> Option<&Pointee> {
        match self {
            FieldKind::Ptr(pointee) | FieldKind::String(pointee) => Some(pointee),
            _ => None,
        }
    }
}

impl FieldDescriptor {
    /// Whether decoding this field produces a value. See [`Path::has_payload`].
    pub fn has_payload(&self) -> bool {
        self.path.has_payload()
    }

    /// Bit just past the end of the field.
    pub fn end_bit(&self) -> u64 {
        self.bitpos + self.bitsize
    }
}
