//! Request handling: resolve, flatten, and write one JSON record per request.
//!
//! Input lines are JSON arrays `[scope, name]`. The scope is `null` for a
//! global type lookup, a module name, or an address (an integer, or a
//! `"0x..."` string) that the resolver maps to a module. Each input line
//! yields exactly one output line: a [`LayoutRecord`] or `null`.

use std::{
    fmt,
    io::{BufRead, Write},
};

use bitlayout::{Layout, TypeDescriptor, TypeKind, flatten, serde::LayoutDef};
use serde::{Deserialize, Serialize};

use crate::errors::{DriverError, ResolveError};

/// Lookup context of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Global,
    Module(String),
    Address(u64),
}

impl Scope {
    pub fn from_json(value: &serde_json::Value) -> Result<Self, DriverError> {
        match value {
            serde_json::Value::Null => Ok(Scope::Global),
            serde_json::Value::String(s) => match s.strip_prefix("0x") {
                Some(hex) => u64::from_str_radix(hex, 16)
                    .map(Scope::Address)
                    .map_err(|_| DriverError::BadRequest(format!("bad address {s:?}"))),
                None => Ok(Scope::Module(s.clone())),
            },
            serde_json::Value::Number(n) => n
                .as_u64()
                .map(Scope::Address)
                .ok_or_else(|| DriverError::BadRequest(format!("bad address {n}"))),
            other => Err(DriverError::BadRequest(format!("bad scope {other}"))),
        }
    }

    /// Scope as echoed in responses; addresses are always integers.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Scope::Global => serde_json::Value::Null,
            Scope::Module(module) => serde_json::Value::String(module.clone()),
            Scope::Address(address) => serde_json::Value::from(*address),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global scope"),
            Scope::Module(module) => write!(f, "module {module}"),
            Scope::Address(address) => write!(f, "address {address:#x}"),
        }
    }
}

/// Boundary to the type introspection service. Resolving a value yields the
/// value's type.
pub trait TypeResolver {
    fn resolve(&self, scope: &Scope, name: &str) -> Result<TypeDescriptor, ResolveError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub scope: Scope,
    pub name: String,
}

impl Request {
    /// Parses one `[scope, name]` input line.
    pub fn parse(line: &str) -> Result<Self, DriverError> {
        let (scope, name): (serde_json::Value, String) = serde_json::from_str(line)?;
        Ok(Request {
            scope: Scope::from_json(&scope)?,
            name,
        })
    }
}

/// One successful output line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutRecord {
    pub scope: serde_json::Value,
    pub name: String,
    pub layout: LayoutDef,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub records: usize,
    pub failed: usize,
}

pub struct Driver<R> {
    resolver: R,
    deref: bool,
}

impl<R: TypeResolver> Driver<R> {
    /// With `deref`, a pointer or array root is replaced by its pointee or
    /// element type before flattening.
    pub fn new(resolver: R, deref: bool) -> Self {
        Self { resolver, deref }
    }

    pub fn dump(&self, request: &Request) -> Result<LayoutRecord, DriverError> {
        let ty = self.resolver.resolve(&request.scope, &request.name)?;
        let ty = if self.deref { deref_root(ty) } else { ty };

        let flat = flatten(&ty);
        tracing::debug!(
            name = %request.name,
            scope = %request.scope,
            fields = flat.layout.len(),
            skipped = flat.skipped.len(),
            "flattened type"
        );

        Ok(LayoutRecord {
            scope: request.scope.to_json(),
            name: request.name.clone(),
            layout: LayoutDef::from(&flat.layout),
        })
    }

    /// Handles one input line; failures are logged and yield `None`.
    pub fn dump_line(&self, line: &str) -> Option<LayoutRecord> {
        let result = Request::parse(line).and_then(|request| self.dump(&request));
        match result {
            Ok(record) => Some(record),
            Err(err) => {
                tracing::warn!(%err, line, "failed to dump type layout");
                None
            }
        }
    }

    /// Processes every non-blank line of `input`, writing and flushing one
    /// output line each. Only I/O errors on the streams stop the batch.
    pub fn run<I: BufRead, W: Write>(&self, input: I, mut output: W) -> Result<BatchSummary, DriverError> {
        let mut summary = BatchSummary::default();

        for line in input.lines() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let record = self.dump_line(line);
            summary.records += 1;
            if record.is_none() {
                summary.failed += 1;
            }

            serde_json::to_writer(&mut output, &record)?;
            writeln!(output)?;
            output.flush()?;
        }

        Ok(summary)
    }
}

fn deref_root(ty: TypeDescriptor) -> TypeDescriptor {
    let target = match &ty.strip_typedefs().kind {
        TypeKind::Pointer { target } | TypeKind::Array { element: target, .. } => {
            Some(target.as_ref().clone())
        }
        _ => None,
    };
    target.unwrap_or(ty)
}

/// Reads a layout for decoding. Accepts a bare layout array, a single
/// [`LayoutRecord`], or JSONL output of [`Driver::run`], in which case the
/// first non-null record is used.
pub fn load_layout(text: &str) -> Result<Layout, DriverError> {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(text) {
        return layout_from_value(value);
    }

    for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let value: serde_json::Value = serde_json::from_str(line)?;
        if !value.is_null() {
            return layout_from_value(value);
        }
    }

    Err(DriverError::NoLayout)
}

fn layout_from_value(value: serde_json::Value) -> Result<Layout, DriverError> {
    let def = match value {
        serde_json::Value::Array(_) => serde_json::from_value::<LayoutDef>(value)?,
        serde_json::Value::Object(_) => serde_json::from_value::<LayoutRecord>(value)?.layout,
        _ => return Err(DriverError::NoLayout),
    };
    Ok(Layout::try_from(def)?)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use serde_json::json;

    use super::*;
    use crate::catalog::Catalog;

    fn catalog() -> Catalog {
        serde_json::from_value(json!({
            "types": {
                "point": {"code": "struct", "name": "point", "sizeof": 8, "members": [
                    {"name": "x", "bitpos": 0, "type": {"code": "integer", "name": "int", "sizeof": 4, "signed": true}},
                    {"name": "y", "bitpos": 32, "type": {"code": "integer", "name": "int", "sizeof": 4, "signed": true}}
                ]}
            },
            "modules": {
                "foo.o": {
                    "origin": {"code": "typedef", "name": "point_t", "target":
                        {"code": "struct", "name": "point", "sizeof": 8, "members": [
                            {"name": "x", "bitpos": 0, "type": {"code": "integer", "name": "int", "sizeof": 4, "signed": true}}
                        ]}},
                    "points": {"code": "array", "range": [0, 3], "target":
                        {"code": "integer", "name": "short", "sizeof": 2, "signed": true}}
                }
            },
            "ranges": [{"start": 4096, "end": 8192, "module": "foo.o"}]
        }))
        .unwrap()
    }

    fn run(driver: &Driver<Catalog>, input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        driver.run(Cursor::new(input), &mut out).unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[test]
    fn test_scope_parsing() {
        assert_eq!(Scope::from_json(&json!(null)).unwrap(), Scope::Global);
        assert_eq!(
            Scope::from_json(&json!("foo.o")).unwrap(),
            Scope::Module("foo.o".to_string())
        );
        assert_eq!(
            Scope::from_json(&json!("0x4006e0")).unwrap(),
            Scope::Address(0x4006e0)
        );
        assert_eq!(Scope::from_json(&json!(4096)).unwrap(), Scope::Address(4096));
        assert!(Scope::from_json(&json!("0xzz")).is_err());
        assert!(Scope::from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_global_type_record() {
        let driver = Driver::new(catalog(), true);
        let out = run(&driver, "[null, \"point\"]\n");

        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["scope"], json!(null));
        assert_eq!(out[0]["name"], json!("point"));
        assert_eq!(out[0]["layout"][1]["path"], json!(["point", ".y@1"]));
        assert_eq!(out[0]["layout"][1]["bitpos"], json!(32));
    }

    #[test]
    fn test_failures_become_null_and_batch_continues() {
        let driver = Driver::new(catalog(), true);
        let input = "[null, \"missing\"]\nnot json\n\n[\"bar.o\", \"point\"]\n[null, \"point\"]\n";

        let mut out = Vec::new();
        let summary = driver.run(Cursor::new(input), &mut out).unwrap();
        assert_eq!(summary, BatchSummary { records: 4, failed: 3 });

        let lines: Vec<_> = std::str::from_utf8(&out).unwrap().lines().collect();
        assert_eq!(lines[..3], ["null", "null", "null"]);
        assert!(lines[3].starts_with("{\"scope\":null,\"name\":\"point\",\"layout\":["));
    }

    #[test]
    fn test_module_scope_and_typedef_root() {
        let driver = Driver::new(catalog(), true);
        let out = run(&driver, "[\"foo.o\", \"origin\"]\n");
        assert_eq!(out[0]["layout"][0]["path"], json!(["point_t", ".x@0"]));
    }

    #[test]
    fn test_module_falls_back_to_global_types() {
        let driver = Driver::new(catalog(), true);
        let out = run(&driver, "[\"foo.o\", \"point\"]\n");
        assert_eq!(out[0]["layout"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_address_scope_is_echoed_as_integer() {
        let driver = Driver::new(catalog(), true);
        let out = run(&driver, "[\"0x1800\", \"points\"]\n[\"0x10\", \"points\"]\n");

        assert_eq!(out[0]["scope"], json!(0x1800));
        assert_eq!(out[1], json!(null));
    }

    #[test]
    fn test_deref_replaces_array_root() {
        let deref = Driver::new(catalog(), true);
        let out = run(&deref, "[\"foo.o\", \"points\"]\n");
        assert_eq!(out[0]["layout"], json!([{
            "path": ["short"], "kind": "integer", "pretty": "short", "type": "short",
            "bitpos": 0, "bitsize": 16, "signed": true
        }]));

        let no_deref = Driver::new(catalog(), false);
        let out = run(&no_deref, "[\"foo.o\", \"points\"]\n");
        let layout = out[0]["layout"].as_array().unwrap();
        assert_eq!(layout.len(), 4);
        assert_eq!(layout[3]["path"], json!([null, "[3*16@3"]));
        assert_eq!(layout[3]["bitpos"], json!(48));
    }

    #[test]
    fn test_load_layout_formats() {
        let driver = Driver::new(catalog(), true);
        let record = driver
            .dump(&Request::parse("[null, \"point\"]").unwrap())
            .unwrap();

        let as_record = serde_json::to_string(&record).unwrap();
        let as_array = serde_json::to_string(&record.layout).unwrap();
        let as_jsonl = format!("null\n{as_record}\n");

        for text in [&as_record, &as_array, &as_jsonl] {
            let layout = load_layout(text).unwrap();
            assert_eq!(layout.gron(&[1, 0, 0, 0, 0xFE, 0xFF, 0xFF, 0xFF]), "x = 1\ny = -2\n");
        }

        assert!(matches!(load_layout("null\n"), Err(DriverError::NoLayout)));
    }
}
