#![allow(dead_code)]

use bitlayout::types::{Enumerator, Member, TypeDescriptor, TypeKind};

pub fn strukt(name: Option<&str>, size_of: u64, members: Vec<Member>) -> TypeDescriptor {
    TypeDescriptor::new(name, size_of, TypeKind::Struct { members })
}

pub fn union(name: Option<&str>, size_of: u64, members: Vec<Member>) -> TypeDescriptor {
    TypeDescriptor::new(name, size_of, TypeKind::Union { members })
}

/// ```c
/// typedef enum e1 { E } e1;
///
/// struct test {
///     e1 e;
///     struct {
///         char name[3];
///         bool f0 : 1; /* ... */ bool f7 : 1;
///         float f;
///     };
///     struct { int x; unsigned y; } z[2];
///     char c;
/// };
/// ```
pub fn test_struct() -> TypeDescriptor {
    let e1 = TypeDescriptor::new(
        Some("e1"),
        4,
        TypeKind::Enum {
            signed: false,
            members: vec![Enumerator::new("E", 0)],
        },
    );
    let char_ty = TypeDescriptor::character("char", false);
    let bool_ty = TypeDescriptor::boolean("_Bool");

    let mut flags = vec![Member::new("name", 0, TypeDescriptor::array(char_ty.clone(), 0, 2))];
    for i in 0..8 {
        flags.push(Member::bitfield(&format!("f{i}"), 24 + i, 1, bool_ty.clone()));
    }
    flags.push(Member::new("f", 32, TypeDescriptor::float("float", 4)));
    let anon = strukt(None, 8, flags);

    let xy = strukt(
        None,
        8,
        vec![
            Member::new("x", 0, TypeDescriptor::integer("int", 4, true)),
            Member::new("y", 32, TypeDescriptor::integer("unsigned int", 4, false)),
        ],
    );

    strukt(
        Some("test"),
        32,
        vec![
            Member::new("e", 0, TypeDescriptor::typedef("e1", e1)),
            Member::anonymous(32, anon),
            Member::new("z", 96, TypeDescriptor::array(xy, 0, 1)),
            Member::new("c", 224, char_ty),
        ],
    )
}
