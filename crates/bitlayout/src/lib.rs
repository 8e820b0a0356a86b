//! # bitlayout
//!
//! Explodes a C-like type (structs, unions, arrays, enums, pointers and
//! scalars, arbitrarily nested) into a flat list of atomic fields, each with
//! its exact bit range, and decodes raw byte buffers with that list.
//!
//! Flattening happens once per type; the resulting [`Layout`] can be stored
//! (see the `serde` feature) and applied to any number of buffers.
//!
//! ## Example
//!
//! ```
//! use bitlayout::flatten::flatten;
//! use bitlayout::types::{Member, TypeDescriptor, TypeKind};
//!
//! let point = TypeDescriptor::new(
//!     Some("point"),
//!     4,
//!     TypeKind::Struct {
//!         members: vec![
//!             Member::new("x", 0, TypeDescriptor::integer("short", 2, true)),
//!             Member::new("y", 16, TypeDescriptor::integer("short", 2, true)),
//!         ],
//!     },
//! );
//!
//! let layout = flatten(&point).layout;
//! let text = layout.gron(&[0xFF, 0xFF, 0x02, 0x00]);
//! assert_eq!(text, "x = -1\ny = 2\n");
//! ```

pub mod bits;
pub mod decode;
pub mod errors;
pub mod field;
pub mod flatten;
pub mod layout;
pub mod path;
#[cfg(feature = "serde")]
pub mod serde;
pub mod types;

pub use decode::{Value, decode};
pub use field::{FieldDescriptor, FieldKind};
pub use flatten::{Flattened, flatten, flatten_with_root};
pub use layout::{DecodedField, Layout};
pub use path::{Path, Segment};
pub use types::{TypeDescriptor, TypeKind};
