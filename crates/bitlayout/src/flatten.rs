//! Flattens a [`TypeDescriptor`] tree into an ordered list of
//! [`FieldDescriptor`]s, one per atomic field, each with its absolute bit
//! range and structural [`Path`].
//!
//! The walk is depth-first and pre-order. Anonymous members and base-class
//! subobjects add no path segment; their members splice into the parent.
//! Pointers are terminal: their targets are described, never walked.
//!
//! ```
//! use bitlayout::flatten::flatten;
//! use bitlayout::types::{Member, TypeDescriptor, TypeKind};
//!
//! let int = TypeDescriptor::integer("int", 4, true);
//! let point = TypeDescriptor::new(
//!     Some("point"),
//!     8,
//!     TypeKind::Struct {
//!         members: vec![Member::new("x", 0, int.clone()), Member::new("y", 32, int)],
//!     },
//! );
//!
//! let flat = flatten(&point);
//! let rendered: Vec<_> = flat.layout.iter().map(|f| (f.path.render(), f.bitpos)).collect();
//! assert_eq!(rendered, [("x".to_string(), 0), ("y".to_string(), 32)]);
//! ```

use crate::{
    errors::UnsupportedType,
    field::{FieldDescriptor, FieldKind, Pointee},
    layout::Layout,
    path::{Path, Segment},
    types::{Member, TypeDescriptor, TypeKind},
};

/// Result of a flatten call. `skipped` lists the subtrees that were dropped
/// because their type is not modelled; the layout is still usable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Flattened {
    pub layout: Layout,
    pub skipped: Vec<UnsupportedType>,
}

/// Flattens `ty`, using its own name as the path root.
pub fn flatten(ty: &TypeDescriptor) -> Flattened {
    flatten_with_root(ty, ty.name.clone())
}

/// Flattens `ty` with an explicit path root.
pub fn flatten_with_root(ty: &TypeDescriptor, root: Option<String>) -> Flattened {
    let mut flattener = Flattener {
        root,
        segments: Vec::new(),
        fields: Vec::new(),
        skipped: Vec::new(),
    };
    flattener.visit(ty, 0, 0);

    Flattened {
        layout: Layout::new(flattener.fields),
        skipped: flattener.skipped,
    }
}

#[derive(Clone, Copy)]
enum Aggregate {
    Struct,
    Union,
}

struct Flattener {
    root: Option<String>,
    segments: Vec<Segment>,
    fields: Vec<FieldDescriptor>,
    skipped: Vec<UnsupportedType>,
}

impl Flattener {
    /// `bitsize` is the explicit bitfield width of the member being visited,
    /// or 0 for "the whole type".
    fn visit(&mut self, ty: &TypeDescriptor, bitpos: u64, bitsize: u64) {
        match &ty.kind {
            TypeKind::Struct { members } => self.visit_members(Aggregate::Struct, members, bitpos),
            TypeKind::Union { members } => self.visit_members(Aggregate::Union, members, bitpos),
            TypeKind::Array { element, .. } if ty.is_string_like() => {
                let pointee = pointee_of(element);
                self.emit(ty, bitpos, bitsize, FieldKind::String(pointee));
            }
            TypeKind::Array { element, low, high } => {
                self.visit_array(ty, element, *low, *high, bitpos);
            }
            TypeKind::Enum { signed, members } => {
                let kind = FieldKind::Enum {
                    signed: *signed,
                    members: members.clone(),
                };
                self.emit(ty, bitpos, bitsize, kind);
            }
            TypeKind::Pointer { target } => {
                self.emit(ty, bitpos, bitsize, FieldKind::Ptr(pointee_of(target)));
            }
            TypeKind::Integer { signed, .. } => {
                self.emit(ty, bitpos, bitsize, FieldKind::Integer { signed: *signed });
            }
            TypeKind::Float => self.emit(ty, bitpos, bitsize, FieldKind::Float),
            TypeKind::Boolean { signed } => {
                self.emit(ty, bitpos, bitsize, FieldKind::Boolean { signed: *signed });
            }
            TypeKind::Typedef { target } => self.visit(target, bitpos, bitsize),
            TypeKind::Unsupported { code } => {
                self.skip(ty, code, "dropping member of unsupported type");
            }
        }
    }

    fn visit_members(&mut self, aggregate: Aggregate, members: &[Member], bitpos: u64) {
        for (rank, member) in members.iter().enumerate() {
            // Union members all start at the union's own offset.
            let member_bitpos = match aggregate {
                Aggregate::Struct => bitpos + member.bitpos,
                Aggregate::Union => bitpos,
            };

            let segment = match (&member.name, member.is_base_class) {
                (Some(name), false) => {
                    let name = name.clone();
                    Some(match aggregate {
                        Aggregate::Struct => Segment::StructField { name, rank },
                        Aggregate::Union => Segment::UnionField { name, rank },
                    })
                }
                _ => None,
            };

            match segment {
                Some(segment) => {
                    self.segments.push(segment);
                    self.visit(&member.ty, member_bitpos, member.bitsize);
                    self.segments.pop();
                }
                None => self.visit(&member.ty, member_bitpos, member.bitsize),
            }
        }
    }

    fn visit_array(
        &mut self,
        array: &TypeDescriptor,
        element: &TypeDescriptor,
        low: i64,
        high: i64,
        bitpos: u64,
    ) {
        let elem_bitsize = element.size_of.checked_mul(8);
        let empty = high < low;
        let flexible = array.size_of == 0;
        let count = if empty || flexible {
            Some(1)
        } else {
            u64::try_from(i128::from(high) - i128::from(low) + 1).ok()
        };

        // Every element must start at a representable bit offset.
        let last_bitpos = count
            .zip(elem_bitsize)
            .and_then(|(count, elem_bitsize)| (count - 1).checked_mul(elem_bitsize))
            .and_then(|span| span.checked_add(bitpos));
        let (Some(count), Some(elem_bitsize), Some(_)) = (count, elem_bitsize, last_bitpos) else {
            self.skip(array, "array", "dropping array with unrepresentable bounds");
            return;
        };

        for rank in 0..count {
            // low + rank never passes high, so it stays in range.
            let index = low.wrapping_add_unsigned(rank);
            let elem_bitpos = bitpos + rank * elem_bitsize;
            let rank = rank as usize;
            let segment = if empty {
                Segment::ZeroArrayElem {
                    index,
                    elem_bitsize,
                    rank,
                }
            } else if flexible {
                Segment::FlexArrayElem {
                    index,
                    elem_bitsize,
                    rank,
                }
            } else {
                Segment::ArrayElem {
                    index,
                    elem_bitsize,
                    rank,
                }
            };

            self.segments.push(segment);
            self.visit(element, elem_bitpos, elem_bitsize);
            self.segments.pop();
        }
    }

    fn emit(&mut self, ty: &TypeDescriptor, bitpos: u64, bitsize: u64, kind: FieldKind) {
        let bitsize = if bitsize > 0 {
            bitsize
        } else {
            ty.size_of.saturating_mul(8)
        };

        self.fields.push(FieldDescriptor {
            path: self.path(),
            pretty: ty.pretty(),
            type_name: ty.type_name(),
            bitpos,
            bitsize,
            kind,
        });
    }

    fn skip(&mut self, ty: &TypeDescriptor, code: &str, reason: &str) {
        let skipped = UnsupportedType {
            code: code.to_string(),
            name: ty.type_name(),
            path: self.path().render(),
        };
        tracing::warn!(
            code = %skipped.code,
            name = %skipped.name,
            path = %skipped.path,
            "{reason}"
        );
        self.skipped.push(skipped);
    }

    fn path(&self) -> Path {
        Path::new(self.root.clone(), self.segments.clone())
    }
}

fn pointee_of(target: &TypeDescriptor) -> Pointee {
    Pointee {
        name: target.type_name(),
        pretty: target.pretty(),
        raw: target.strip_typedefs().type_name(),
        size_of: target.size_of,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Enumerator;

    fn int() -> TypeDescriptor {
        TypeDescriptor::integer("int", 4, true)
    }

    fn strukt(name: Option<&str>, size_of: u64, members: Vec<Member>) -> TypeDescriptor {
        TypeDescriptor::new(name, size_of, TypeKind::Struct { members })
    }

    fn union(name: Option<&str>, size_of: u64, members: Vec<Member>) -> TypeDescriptor {
        TypeDescriptor::new(name, size_of, TypeKind::Union { members })
    }

    fn tokens(field: &FieldDescriptor) -> Vec<String> {
        field.path.tokens().collect()
    }

    #[test]
    fn test_scalar_root() {
        let flat = flatten(&int());
        assert_eq!(flat.layout.len(), 1);

        let field = &flat.layout.fields[0];
        assert_eq!(field.path, Path::new(Some("int".to_string()), vec![]));
        assert_eq!(field.bitpos, 0);
        assert_eq!(field.bitsize, 32);
        assert_eq!(field.kind, FieldKind::Integer { signed: true });
        assert_eq!(field.pretty, "int");
    }

    #[test]
    fn test_struct_members_accumulate_bitpos() {
        let inner = strukt(
            Some("inner"),
            8,
            vec![Member::new("a", 0, int()), Member::new("b", 32, int())],
        );
        let outer = strukt(
            Some("outer"),
            16,
            vec![Member::new("head", 0, int()), Member::new("in", 64, inner)],
        );

        let flat = flatten(&outer);
        let got: Vec<_> = flat
            .layout
            .iter()
            .map(|f| (f.path.render(), f.bitpos))
            .collect();
        assert_eq!(
            got,
            [
                ("head".to_string(), 0),
                ("in.a".to_string(), 64),
                ("in.b".to_string(), 96)
            ]
        );
        assert_eq!(tokens(&flat.layout.fields[2]), [".in@1", ".b@1"]);
    }

    #[test]
    fn test_anonymous_member_splices_into_parent() {
        let anon = strukt(
            None,
            8,
            vec![Member::new("a", 0, int()), Member::new("b", 32, int())],
        );
        let outer = strukt(
            Some("outer"),
            12,
            vec![Member::new("first", 0, int()), Member::anonymous(32, anon)],
        );

        let flat = flatten(&outer);
        let paths: Vec<_> = flat.layout.iter().map(tokens).collect();
        assert_eq!(paths, [vec![".first@0"], vec![".a@0"], vec![".b@1"]]);
        assert_eq!(flat.layout.fields[2].bitpos, 64);
    }

    #[test]
    fn test_base_class_adds_no_segment() {
        let base = strukt(Some("base"), 4, vec![Member::new("id", 0, int())]);
        let derived = strukt(
            Some("derived"),
            8,
            vec![
                Member {
                    is_base_class: true,
                    ..Member::new("base", 0, base)
                },
                Member::new("extra", 32, int()),
            ],
        );

        let flat = flatten(&derived);
        let paths: Vec<_> = flat.layout.iter().map(tokens).collect();
        assert_eq!(paths, [vec![".id@0"], vec![".extra@1"]]);
    }

    #[test]
    fn test_union_members_share_bitpos() {
        let u = union(
            Some("number"),
            8,
            vec![
                Member::new("i", 0, int()),
                Member::new("d", 0, TypeDescriptor::float("double", 8)),
            ],
        );
        let outer = strukt(
            Some("holder"),
            16,
            vec![Member::new("tag", 0, int()), Member::new("value", 64, u)],
        );

        let flat = flatten(&outer);
        assert_eq!(flat.layout.len(), 3);
        assert_eq!(flat.layout.fields[1].bitpos, 64);
        assert_eq!(flat.layout.fields[2].bitpos, 64);
        assert_eq!(tokens(&flat.layout.fields[1]), [".value@1", "?i@0"]);
        assert_eq!(tokens(&flat.layout.fields[2]), [".value@1", "?d@1"]);
        assert_eq!(flat.layout.fields[2].bitsize, 64);
    }

    #[test]
    fn test_fixed_array_expands_each_element() {
        let arr = TypeDescriptor::array(int(), 0, 3);
        let outer = strukt(
            Some("s"),
            20,
            vec![Member::new("pad", 0, int()), Member::new("v", 32, arr)],
        );

        let flat = flatten(&outer);
        let elems: Vec<_> = flat.layout.iter().skip(1).collect();
        assert_eq!(elems.len(), 4);
        for (i, field) in elems.iter().enumerate() {
            assert_eq!(field.bitpos, 32 + 32 * i as u64);
            assert_eq!(field.bitsize, 32);
            assert_eq!(field.path.render(), format!("v[{i}]"));
            assert_eq!(
                field.path.segments[1],
                Segment::ArrayElem {
                    index: i as i64,
                    elem_bitsize: 32,
                    rank: i
                }
            );
        }
    }

    #[test]
    fn test_array_with_nonzero_low_bound() {
        let arr = TypeDescriptor::array(int(), 1, 2);
        let flat = flatten(&arr);
        let got: Vec<_> = flat.layout.iter().map(tokens).collect();
        assert_eq!(got, [vec!["[1*32@0"], vec!["[2*32@1"]]);
        assert_eq!(flat.layout.fields[1].bitpos, 32);
    }

    #[test]
    fn test_zero_length_array_emits_placeholder() {
        let outer = strukt(
            Some("s"),
            4,
            vec![
                Member::new("n", 0, int()),
                Member::new("none", 32, TypeDescriptor::array(int(), 0, -1)),
            ],
        );

        let flat = flatten(&outer);
        assert_eq!(flat.layout.len(), 2);
        let placeholder = &flat.layout.fields[1];
        assert_eq!(tokens(placeholder), [".none@1", "!0*32@0"]);
        assert_eq!(placeholder.bitpos, 32);
        assert_eq!(placeholder.bitsize, 32);
        assert!(!placeholder.has_payload());
    }

    #[test]
    fn test_flexible_array_emits_one_representative() {
        let outer = strukt(
            Some("s"),
            4,
            vec![
                Member::new("n", 0, int()),
                Member::new("tail", 32, TypeDescriptor::flexible_array(int())),
            ],
        );

        let flat = flatten(&outer);
        assert_eq!(flat.layout.len(), 2);
        assert_eq!(tokens(&flat.layout.fields[1]), [".tail@1", "*0*32@0"]);
        assert_eq!(flat.layout.fields[1].path.render(), "tail[]");
    }

    #[test]
    fn test_char_array_is_one_string() {
        let name = TypeDescriptor::array(TypeDescriptor::character("char", true), 0, 15);
        let outer = strukt(Some("s"), 16, vec![Member::new("name", 0, name)]);

        let flat = flatten(&outer);
        assert_eq!(flat.layout.len(), 1);
        let field = &flat.layout.fields[0];
        assert_eq!(field.bitsize, 128);
        assert_eq!(field.pretty, "char [16]");
        assert_eq!(field.type_name, "");
        assert_eq!(
            field.kind,
            FieldKind::String(Pointee {
                name: "char".to_string(),
                pretty: "char".to_string(),
                raw: "char".to_string(),
                size_of: 1,
            })
        );
    }

    #[test]
    fn test_flexible_string_has_zero_bitsize() {
        let tail = TypeDescriptor::flexible_array(TypeDescriptor::character("char", true));
        let outer = strukt(
            Some("msg"),
            4,
            vec![Member::new("len", 0, int()), Member::new("text", 32, tail)],
        );

        let flat = flatten(&outer);
        let text = &flat.layout.fields[1];
        assert!(matches!(text.kind, FieldKind::String(_)));
        assert_eq!(text.bitpos, 32);
        assert_eq!(text.bitsize, 0);
    }

    #[test]
    fn test_bitfields_keep_explicit_width() {
        let flags = strukt(
            Some("flags"),
            4,
            vec![
                Member::bitfield("lo", 0, 3, TypeDescriptor::integer("unsigned int", 4, false)),
                Member::bitfield("hi", 3, 5, int()),
            ],
        );

        let flat = flatten(&flags);
        let got: Vec<_> = flat.layout.iter().map(|f| (f.bitpos, f.bitsize)).collect();
        assert_eq!(got, [(0, 3), (3, 5)]);
    }

    #[test]
    fn test_pointer_is_terminal() {
        let node = strukt(Some("node"), 4, vec![Member::new("v", 0, int())]);
        let typedefd = TypeDescriptor::typedef("node_t", node);
        let outer = strukt(
            Some("list"),
            8,
            vec![Member::new("head", 0, TypeDescriptor::pointer(typedefd, 8))],
        );

        let flat = flatten(&outer);
        assert_eq!(flat.layout.len(), 1);
        let head = &flat.layout.fields[0];
        assert_eq!(head.bitsize, 64);
        assert_eq!(head.pretty, "node_t *");
        assert_eq!(
            head.kind,
            FieldKind::Ptr(Pointee {
                name: "node_t".to_string(),
                pretty: "node_t".to_string(),
                raw: "struct node".to_string(),
                size_of: 4,
            })
        );
    }

    #[test]
    fn test_typedefs_are_stripped() {
        let e = TypeDescriptor::new(
            Some("e1"),
            4,
            TypeKind::Enum {
                signed: false,
                members: vec![Enumerator::new("E", 0)],
            },
        );
        let outer = strukt(
            Some("s"),
            4,
            vec![Member::new("e", 0, TypeDescriptor::typedef("e1", e))],
        );

        let flat = flatten(&outer);
        let field = &flat.layout.fields[0];
        assert_eq!(field.type_name, "enum e1");
        assert_eq!(field.pretty, "enum e1");
        assert_eq!(
            field.kind,
            FieldKind::Enum {
                signed: false,
                members: vec![Enumerator::new("E", 0)]
            }
        );
    }

    #[test]
    fn test_unsupported_member_is_skipped() {
        let func = TypeDescriptor::new(
            Some("handler"),
            1,
            TypeKind::Unsupported {
                code: "func".to_string(),
            },
        );
        let outer = strukt(
            Some("s"),
            12,
            vec![
                Member::new("a", 0, int()),
                Member::new("f", 32, func),
                Member::new("b", 64, int()),
            ],
        );

        let flat = flatten(&outer);
        let names: Vec<_> = flat.layout.iter().map(|f| f.path.render()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(
            flat.skipped,
            [UnsupportedType {
                code: "func".to_string(),
                name: "handler".to_string(),
                path: "f".to_string(),
            }]
        );
    }

    #[test]
    fn test_full_range_array_is_skipped() {
        let huge = TypeDescriptor::new(
            Some("huge"),
            4,
            TypeKind::Array {
                element: Box::new(int()),
                low: i64::MIN,
                high: i64::MAX,
            },
        );
        let outer = strukt(
            Some("s"),
            8,
            vec![Member::new("h", 0, huge), Member::new("b", 32, int())],
        );

        let flat = flatten(&outer);
        let names: Vec<_> = flat.layout.iter().map(|f| f.path.render()).collect();
        assert_eq!(names, ["b"]);
        assert_eq!(flat.skipped.len(), 1);
        assert_eq!(flat.skipped[0].code, "array");
        assert_eq!(flat.skipped[0].path, "h");
    }

    #[test]
    fn test_array_past_end_of_bit_space_is_skipped() {
        let wide = TypeDescriptor::new(
            None,
            4,
            TypeKind::Array {
                element: Box::new(int()),
                low: 0,
                high: i64::MAX,
            },
        );

        let flat = flatten(&wide);
        assert!(flat.layout.is_empty());
        assert_eq!(flat.skipped[0].code, "array");
    }

    #[test]
    fn test_negative_bounds_keep_their_indices() {
        let arr = TypeDescriptor::new(
            None,
            8,
            TypeKind::Array {
                element: Box::new(int()),
                low: i64::MIN,
                high: i64::MIN + 1,
            },
        );

        let flat = flatten(&arr);
        assert_eq!(flat.layout.len(), 2);
        assert_eq!(
            flat.layout.fields[1].path.segments[0],
            Segment::ArrayElem {
                index: i64::MIN + 1,
                elem_bitsize: 32,
                rank: 1,
            }
        );
        assert_eq!(flat.layout.fields[1].bitpos, 32);
    }

    #[test]
    fn test_nested_typedefs_are_followed() {
        let inner = TypeDescriptor::typedef("inner_t", int());
        let outer = TypeDescriptor::typedef("outer_t", inner);

        let flat = flatten(&outer);
        let field = &flat.layout.fields[0];
        assert_eq!(field.path.root.as_deref(), Some("outer_t"));
        assert_eq!(field.pretty, "int");
        assert_eq!(field.kind, FieldKind::Integer { signed: true });
    }

    #[test]
    fn test_explicit_root() {
        let flat = flatten_with_root(&int(), None);
        assert_eq!(flat.layout.fields[0].path.root, None);
    }
}
