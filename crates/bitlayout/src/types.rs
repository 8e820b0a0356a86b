//! Read-only description of a C-like type, as supplied by a debugger or a
//! debug-info reader.
//!
//! A [`TypeDescriptor`] is consumed by reference during one flatten call and
//! never mutated. Typedefs are kept as explicit nodes so that spellings can be
//! reported both before and after stripping them.

use std::fmt;

/// One node of a type tree.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    /// Declared name (`foo` for `struct foo`, `int`, `size_t`), absent when anonymous.
    pub name: Option<String>,
    /// Size in bytes. Zero for flexible arrays.
    pub size_of: u64,
    pub kind: TypeKind,
}

/// Shape-specific data of a [`TypeDescriptor`].
#[derive(Debug, Clone, PartialEq)]
pub enum TypeKind {
    Struct {
        members: Vec<Member>,
    },
    Union {
        members: Vec<Member>,
    },
    /// Array with inclusive index bounds. `high < low` marks a zero-length array.
    Array {
        element: Box<TypeDescriptor>,
        low: i64,
        high: i64,
    },
    Enum {
        signed: bool,
        members: Vec<Enumerator>,
    },
    Pointer {
        target: Box<TypeDescriptor>,
    },
    /// `character` marks the char types that make an array string-like.
    Integer {
        signed: bool,
        character: bool,
    },
    Float,
    Boolean {
        signed: bool,
    },
    Typedef {
        target: Box<TypeDescriptor>,
    },
    /// Anything the flattener does not model (functions, void, ...). The code
    /// is kept for diagnostics.
    Unsupported {
        code: String,
    },
}

/// A struct or union member.
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    pub name: Option<String>,
    /// Offset from the start of the enclosing aggregate, in bits.
    pub bitpos: u64,
    /// Explicit bitfield width, 0 when the member is not a bitfield.
    pub bitsize: u64,
    pub ty: TypeDescriptor,
    pub is_base_class: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enumerator {
    pub name: String,
    /// Wide enough for both `i64` and `u64` enumerators.
    pub value: i128,
}

/// Coarse classification of a type node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCode {
    Struct,
    Union,
    Array,
    Enum,
    Pointer,
    StringLike,
    Integer,
    Float,
    Boolean,
    Typedef,
    Unsupported,
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeCode::Struct => "struct",
            TypeCode::Union => "union",
            TypeCode::Array => "array",
            TypeCode::Enum => "enum",
            TypeCode::Pointer => "pointer",
            TypeCode::StringLike => "string-like",
            TypeCode::Integer => "integer",
            TypeCode::Float => "float",
            TypeCode::Boolean => "boolean",
            TypeCode::Typedef => "typedef",
            TypeCode::Unsupported => "unsupported",
        };
        f.write_str(s)
    }
}

impl TypeDescriptor {
    pub fn new(name: Option<&str>, size_of: u64, kind: TypeKind) -> Self {
        Self {
            name: name.map(str::to_string),
            size_of,
            kind,
        }
    }

    /// A named signed or unsigned integer of `size_of` bytes.
    pub fn integer(name: &str, size_of: u64, signed: bool) -> Self {
        Self::new(
            Some(name),
            size_of,
            TypeKind::Integer {
                signed,
                character: false,
            },
        )
    }

    /// A one-byte character type.
    pub fn character(name: &str, signed: bool) -> Self {
        Self::new(
            Some(name),
            1,
            TypeKind::Integer {
                signed,
                character: true,
            },
        )
    }

    pub fn float(name: &str, size_of: u64) -> Self {
        Self::new(Some(name), size_of, TypeKind::Float)
    }

    pub fn boolean(name: &str) -> Self {
        Self::new(Some(name), 1, TypeKind::Boolean { signed: false })
    }

    pub fn pointer(target: TypeDescriptor, size_of: u64) -> Self {
        Self::new(
            None,
            size_of,
            TypeKind::Pointer {
                target: Box::new(target),
            },
        )
    }

    /// An array of `element` indexed `low..=high`. The size is derived from the
    /// bounds; use [`TypeDescriptor::flexible_array`] for incomplete arrays.
    pub fn array(element: TypeDescriptor, low: i64, high: i64) -> Self {
        Self::new(
            None,
            array_size(element.size_of, low, high),
            TypeKind::Array {
                element: Box::new(element),
                low,
                high,
            },
        )
    }

    /// An array whose length is unknown at layout time (`T x[]`). It has a
    /// size of zero but, unlike `T x[0]`, non-empty bounds.
    pub fn flexible_array(element: TypeDescriptor) -> Self {
        Self::new(
            None,
            0,
            TypeKind::Array {
                element: Box::new(element),
                low: 0,
                high: 0,
            },
        )
    }

    pub fn typedef(name: &str, target: TypeDescriptor) -> Self {
        Self::new(
            Some(name),
            target.size_of,
            TypeKind::Typedef {
                target: Box::new(target),
            },
        )
    }

    pub fn code(&self) -> TypeCode {
        match &self.kind {
            TypeKind::Struct { .. } => TypeCode::Struct,
            TypeKind::Union { .. } => TypeCode::Union,
            TypeKind::Array { .. } if self.is_string_like() => TypeCode::StringLike,
            TypeKind::Array { .. } => TypeCode::Array,
            TypeKind::Enum { .. } => TypeCode::Enum,
            TypeKind::Pointer { .. } => TypeCode::Pointer,
            TypeKind::Integer { .. } => TypeCode::Integer,
            TypeKind::Float => TypeCode::Float,
            TypeKind::Boolean { .. } => TypeCode::Boolean,
            TypeKind::Typedef { .. } => TypeCode::Typedef,
            TypeKind::Unsupported { .. } => TypeCode::Unsupported,
        }
    }

    /// Follows typedef chains down to the underlying type.
    pub fn strip_typedefs(&self) -> &TypeDescriptor {
        let mut ty = self;
        while let TypeKind::Typedef { target } = &ty.kind {
            ty = target;
        }
        ty
    }

    /// True for arrays of character types.
    pub fn is_string_like(&self) -> bool {
        match &self.kind {
            TypeKind::Array { element, .. } => matches!(
                element.strip_typedefs().kind,
                TypeKind::Integer {
                    character: true,
                    ..
                }
            ),
            TypeKind::Typedef { target } => target.is_string_like(),
            _ => false,
        }
    }

    /// Element or pointee type of an array or pointer.
    pub fn target(&self) -> Option<&TypeDescriptor> {
        match &self.kind {
            TypeKind::Array { element, .. } => Some(element),
            TypeKind::Pointer { target } | TypeKind::Typedef { target } => Some(target),
            _ => None,
        }
    }

    /// Complete name including the C tag (`struct foo`, `enum e1`), or the
    /// empty string for anonymous and derived types.
    pub fn type_name(&self) -> String {
        let Some(name) = &self.name else {
            return String::new();
        };

        match self.tag() {
            Some(tag) => format!("{tag} {name}"),
            None => name.clone(),
        }
    }

    /// Human-readable spelling of the type (`char [3]`, `struct foo *`).
    pub fn pretty(&self) -> String {
        self.to_string()
    }

    fn tag(&self) -> Option<&'static str> {
        match self.kind {
            TypeKind::Struct { .. } => Some("struct"),
            TypeKind::Union { .. } => Some("union"),
            TypeKind::Enum { .. } => Some("enum"),
            _ => None,
        }
    }

    /// Writes the part of the spelling that precedes any declarator suffix.
    fn fmt_base(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.kind, &self.name) {
            (TypeKind::Pointer { target }, _) => {
                target.fmt_base(f)?;
                f.write_str(" *")
            }
            (TypeKind::Array { element, .. }, _) => element.fmt_base(f),
            (_, Some(_)) => f.write_str(&self.type_name()),
            (_, None) => match self.tag() {
                Some(tag) => write!(f, "{tag} {{...}}"),
                None => f.write_str("?"),
            },
        }
    }

    fn fmt_dims(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TypeKind::Array { element, low, high } => {
                if self.size_of == 0 && high >= low {
                    f.write_str("[]")?;
                } else {
                    write!(f, "[{}]", (high - low + 1).max(0))?;
                }
                element.fmt_dims(f)
            }
            TypeKind::Pointer { target } => target.fmt_dims(f),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_base(f)?;
        if matches!(self.kind, TypeKind::Array { .. }) {
            f.write_str(" ")?;
            self.fmt_dims(f)?;
        }
        Ok(())
    }
}

impl Member {
    pub fn new(name: &str, bitpos: u64, ty: TypeDescriptor) -> Self {
        Self {
            name: Some(name.to_string()),
            bitpos,
            bitsize: 0,
            ty,
            is_base_class: false,
        }
    }

    /// An unnamed member whose own members splice into the parent.
    pub fn anonymous(bitpos: u64, ty: TypeDescriptor) -> Self {
        Self {
            name: None,
            bitpos,
            bitsize: 0,
            ty,
            is_base_class: false,
        }
    }

    pub fn bitfield(name: &str, bitpos: u64, bitsize: u64, ty: TypeDescriptor) -> Self {
        Self {
            bitsize,
            ..Self::new(name, bitpos, ty)
        }
    }
}

/// Byte size of `low..=high` elements, saturating on absurd bounds.
pub(crate) fn array_size(element_size: u64, low: i64, high: i64) -> u64 {
    let count = (i128::from(high) - i128::from(low) + 1).max(0);
    u64::try_from(count)
        .unwrap_or(u64::MAX)
        .saturating_mul(element_size)
}

/// Marks the integer under any typedefs of `ty` as a character type.
pub(crate) fn mark_character(ty: &mut TypeDescriptor) {
    match &mut ty.kind {
        TypeKind::Integer { character, .. } => *character = true,
        TypeKind::Typedef { target } => mark_character(target),
        _ => {}
    }
}

impl Enumerator {
    pub fn new(name: &str, value: i128) -> Self {
        Self {
            name: name.to_string(),
            value,
        }
    }
}
