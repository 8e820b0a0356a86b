//! Layout: the ordered field descriptors of one resolved type.

use std::fmt::Write as _;

use crate::{
    decode::{Value, decode},
    errors::ReadError,
    field::FieldDescriptor,
};

/// Flattened fields in traversal order. Built once per type and reused,
/// read-only, against any number of buffers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layout {
    pub fields: Vec<FieldDescriptor>,
}

/// One decoded entry of [`Layout::decode`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedField<'a> {
    /// Display path, e.g. `z[1].y`.
    pub path: String,
    pub field: &'a FieldDescriptor,
    /// Errors stay local to the field that raised them.
    pub value: Result<Value<'a>, ReadError>,
}

impl Layout {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FieldDescriptor> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of bits the layout reaches into a buffer.
    pub fn bit_len(&self) -> u64 {
        self.fields
            .iter()
            .map(FieldDescriptor::end_bit)
            .max()
            .unwrap_or(0)
    }

    /// Decodes every field with a payload, in layout order.
    pub fn decode<'a>(&'a self, data: &'a [u8]) -> Vec<DecodedField<'a>> {
        self.fields
            .iter()
            .filter_map(|field| {
                let value = decode(field, data).transpose()?;
                Some(DecodedField {
                    path: field.path.render(),
                    field,
                    value,
                })
            })
            .collect()
    }

    /// Renders `path = value` lines for `data`. Fields that fail to decode
    /// show the error instead of a value.
    pub fn gron(&self, data: &[u8]) -> String {
        let mut out = String::new();
        for entry in self.decode(data) {
            let _ = match &entry.value {
                Ok(value) => writeln!(out, "{} = {}", entry.path, value),
                Err(err) => writeln!(out, "{} = <{}>", entry.path, err),
            };
        }
        out
    }
}

impl From<Vec<FieldDescriptor>> for Layout {
    fn from(fields: Vec<FieldDescriptor>) -> Self {
        Self::new(fields)
    }
}

impl FromIterator<FieldDescriptor> for Layout {
    fn from_iter<I: IntoIterator<Item = FieldDescriptor>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Layout {
    type Item = &'a FieldDescriptor;
    type IntoIter = std::slice::Iter<'a, FieldDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.iter()
    }
}
