//! JSON wire shapes for layouts and type descriptions.
//!
//! [`FieldDef`] is the persisted form of a [`FieldDescriptor`]; consumers of
//! dumped layouts depend on its exact keys:
//!
//! ```text
//! {"path": ["test", ".z@2", "[0*64@0", ".x@0"], "kind": "integer",
//!  "pretty": "int", "type": "int", "bitpos": 96, "bitsize": 32, "signed": true}
//! ```
//!
//! Keys that do not apply to a kind are omitted. [`TypeDef`] describes a type
//! tree in JSON so that type sources without a native API (fixtures, catalog
//! files) can feed the flattener.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::{
    errors::WireError,
    field::{FieldDescriptor, FieldKind, Pointee},
    layout::Layout,
    path::Path,
    types::{Enumerator, Member, TypeDescriptor, TypeKind, array_size, mark_character},
};

/// Enumerators as a JSON object in declaration order. Values span both
/// `i64` and `u64`.
pub type EnumMembersDef = IndexMap<String, i128>;

fn enum_members_def(members: &[Enumerator]) -> EnumMembersDef {
    members
        .iter()
        .map(|member| (member.name.clone(), member.value))
        .collect()
}

fn enumerators(def: EnumMembersDef) -> Vec<Enumerator> {
    def.into_iter()
        .map(|(name, value)| Enumerator { name, value })
        .collect()
}

/// Kind of a persisted field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KindDef {
    Ptr,
    String,
    Enum,
    Integer,
    Float,
    Boolean,
}

/// Persisted field descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDef {
    /// Root name (or `null`) followed by segment tokens.
    pub path: Vec<Option<String>>,
    pub kind: KindDef,
    pub pretty: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub bitpos: u64,
    pub bitsize: u64,

    /// Pointee (or character) type name; pointers and strings only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointee: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointee_pretty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointee_raw: Option<String>,
    /// In bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pointee_sizeof: Option<u64>,

    /// Enums, integers and booleans only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signed: Option<bool>,
    /// Enums only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<EnumMembersDef>,
}

impl From<&FieldDescriptor> for FieldDef {
    fn from(field: &FieldDescriptor) -> Self {
        let mut path = Vec::with_capacity(field.path.segments.len() + 1);
        path.push(field.path.root.clone());
        path.extend(field.path.tokens().map(Some));

        let kind = match &field.kind {
            FieldKind::Ptr(_) => KindDef::Ptr,
            FieldKind::String(_) => KindDef::String,
            FieldKind::Enum { .. } => KindDef::Enum,
            FieldKind::Integer { .. } => KindDef::Integer,
            FieldKind::Float => KindDef::Float,
            FieldKind::Boolean { .. } => KindDef::Boolean,
        };

        let pointee = field.kind.pointee();
        let members = match &field.kind {
            FieldKind::Enum { members, .. } => Some(enum_members_def(members)),
            _ => None,
        };

        FieldDef {
            path,
            kind,
            pretty: field.pretty.clone(),
            type_name: field.type_name.clone(),
            bitpos: field.bitpos,
            bitsize: field.bitsize,
            pointee: pointee.map(|p| p.name.clone()),
            pointee_pretty: pointee.map(|p| p.pretty.clone()),
            pointee_raw: pointee.map(|p| p.raw.clone()),
            pointee_sizeof: pointee.map(|p| p.size_of),
            signed: field.kind.signed(),
            members,
        }
    }
}

impl TryFrom<FieldDef> for FieldDescriptor {
    type Error = WireError;

    fn try_from(def: FieldDef) -> Result<Self, Self::Error> {
        let kind_name = serde_kind_name(def.kind);
        let missing = |attribute| WireError::MissingAttribute {
            kind: format!("{kind_name} field"),
            attribute,
        };

        let mut parts = def.path.into_iter();
        let root = parts.next().flatten();
        let tokens: Vec<String> = parts.flatten().collect();
        let path = Path::from_tokens(root, tokens.iter().map(String::as_str))?;

        let kind = match def.kind {
            KindDef::Ptr | KindDef::String => {
                let pointee = Pointee {
                    name: def.pointee.ok_or_else(|| missing("pointee"))?,
                    pretty: def.pointee_pretty.ok_or_else(|| missing("pointee_pretty"))?,
                    raw: def.pointee_raw.ok_or_else(|| missing("pointee_raw"))?,
                    size_of: def.pointee_sizeof.ok_or_else(|| missing("pointee_sizeof"))?,
                };
                if def.kind == KindDef::Ptr {
                    FieldKind::Ptr(pointee)
                } else {
                    FieldKind::String(pointee)
                }
            }
            KindDef::Enum => FieldKind::Enum {
                signed: def.signed.ok_or_else(|| missing("signed"))?,
                members: enumerators(def.members.ok_or_else(|| missing("members"))?),
            },
            KindDef::Integer => FieldKind::Integer {
                signed: def.signed.ok_or_else(|| missing("signed"))?,
            },
            KindDef::Float => FieldKind::Float,
            KindDef::Boolean => FieldKind::Boolean {
                signed: def.signed.ok_or_else(|| missing("signed"))?,
            },
        };

        Ok(FieldDescriptor {
            path,
            pretty: def.pretty,
            type_name: def.type_name,
            bitpos: def.bitpos,
            bitsize: def.bitsize,
            kind,
        })
    }
}

fn serde_kind_name(kind: KindDef) -> &'static str {
    match kind {
        KindDef::Ptr => "ptr",
        KindDef::String => "string",
        KindDef::Enum => "enum",
        KindDef::Integer => "integer",
        KindDef::Float => "float",
        KindDef::Boolean => "boolean",
    }
}

/// Persisted layout: a JSON array of [`FieldDef`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayoutDef(pub Vec<FieldDef>);

impl From<&Layout> for LayoutDef {
    fn from(layout: &Layout) -> Self {
        LayoutDef(layout.iter().map(FieldDef::from).collect())
    }
}

impl TryFrom<LayoutDef> for Layout {
    type Error = WireError;

    fn try_from(def: LayoutDef) -> Result<Self, Self::Error> {
        def.0.into_iter().map(FieldDescriptor::try_from).collect()
    }
}

/// JSON description of a type tree node.
///
/// `code` is one of `struct`, `union`, `array`, `string-like`, `enum`,
/// `pointer`, `integer`, `float`, `boolean` or `typedef`; any other code is
/// kept as an unsupported type. `string-like` is an array whose integer
/// element is taken to be a character type. `sizeof` may be omitted for arrays and typedefs, where
/// it is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizeof: Option<u64>,
    #[serde(default)]
    pub signed: bool,
    /// Marks character integers. `char`, `signed char` and `unsigned char`
    /// are recognised by name without it.
    #[serde(default)]
    pub character: bool,
    /// Struct/union fields, or enum enumerators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub members: Option<MembersDef>,
    /// Pointer target, array element or typedef target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<Box<TypeDef>>,
    /// Inclusive array index bounds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<(i64, i64)>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MembersDef {
    Fields(Vec<MemberDef>),
    Enumerators(EnumMembersDef),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberDef {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub bitpos: u64,
    #[serde(default)]
    pub bitsize: u64,
    #[serde(rename = "type")]
    pub ty: TypeDef,
    #[serde(default)]
    pub is_base_class: bool,
}

fn is_char_name(name: Option<&str>) -> bool {
    matches!(name, Some("char" | "signed char" | "unsigned char"))
}

impl TryFrom<TypeDef> for TypeDescriptor {
    type Error = WireError;

    fn try_from(def: TypeDef) -> Result<Self, Self::Error> {
        let TypeDef {
            code,
            name,
            sizeof,
            signed,
            character,
            members,
            target,
            range,
        } = def;

        let missing = |attribute| WireError::MissingAttribute {
            kind: format!("{code} type"),
            attribute,
        };
        let target = target
            .map(|target| TypeDescriptor::try_from(*target))
            .transpose()?;

        let kind = match code.as_str() {
            "struct" | "union" => {
                let fields = match members {
                    Some(MembersDef::Fields(fields)) => fields,
                    Some(MembersDef::Enumerators(e)) if e.is_empty() => Vec::new(),
                    None => Vec::new(),
                    Some(MembersDef::Enumerators(_)) => return Err(missing("members")),
                };
                let members = fields
                    .into_iter()
                    .map(Member::try_from)
                    .collect::<Result<Vec<_>, _>>()?;
                if code == "struct" {
                    TypeKind::Struct { members }
                } else {
                    TypeKind::Union { members }
                }
            }
            "array" | "string-like" => {
                let (low, high) = range.ok_or_else(|| missing("range"))?;
                let mut element = target.ok_or_else(|| missing("target"))?;
                if code == "string-like" {
                    mark_character(&mut element);
                }
                TypeKind::Array {
                    element: Box::new(element),
                    low,
                    high,
                }
            }
            "enum" => {
                let members = match members {
                    Some(MembersDef::Enumerators(e)) => enumerators(e),
                    Some(MembersDef::Fields(f)) if f.is_empty() => Vec::new(),
                    None => Vec::new(),
                    Some(MembersDef::Fields(_)) => return Err(missing("members")),
                };
                TypeKind::Enum { signed, members }
            }
            "pointer" => TypeKind::Pointer {
                target: Box::new(target.ok_or_else(|| missing("target"))?),
            },
            "integer" => TypeKind::Integer {
                signed,
                character: character || is_char_name(name.as_deref()),
            },
            "float" => TypeKind::Float,
            "boolean" => TypeKind::Boolean { signed },
            "typedef" => TypeKind::Typedef {
                target: Box::new(target.ok_or_else(|| missing("target"))?),
            },
            other => TypeKind::Unsupported {
                code: other.to_string(),
            },
        };

        let size_of = sizeof.unwrap_or_else(|| match &kind {
            TypeKind::Array { element, low, high } => array_size(element.size_of, *low, *high),
            TypeKind::Typedef { target } => target.size_of,
            _ => 0,
        });

        Ok(TypeDescriptor {
            name,
            size_of,
            kind,
        })
    }
}

impl TryFrom<MemberDef> for Member {
    type Error = WireError;

    fn try_from(def: MemberDef) -> Result<Self, Self::Error> {
        Ok(Member {
            name: def.name,
            bitpos: def.bitpos,
            bitsize: def.bitsize,
            ty: def.ty.try_into()?,
            is_base_class: def.is_base_class,
        })
    }
}
