//! A [`TypeResolver`] backed by a JSON catalog of type trees.
//!
//! ```text
//! {
//!   "types":   { "<global type name>": <TypeDef>, ... },
//!   "modules": { "<module>": { "<type or value name>": <TypeDef>, ... }, ... },
//!   "ranges":  [ { "start": 4194304, "end": 4198400, "module": "<module>" }, ... ]
//! }
//! ```
//!
//! Within a module, names are looked up in the module first and then among
//! the global types. `ranges` map addresses (`[start, end)`) to modules.

use std::{collections::BTreeMap, fs::File, io::BufReader, path::Path};

use bitlayout::{TypeDescriptor, serde::TypeDef};
use serde::Deserialize;

use crate::{
    driver::{Scope, TypeResolver},
    errors::{DriverError, ResolveError},
};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub types: BTreeMap<String, TypeDef>,
    #[serde(default)]
    pub modules: BTreeMap<String, BTreeMap<String, TypeDef>>,
    #[serde(default)]
    pub ranges: Vec<AddressRange>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressRange {
    pub start: u64,
    pub end: u64,
    pub module: String,
}

impl Catalog {
    pub fn from_path(path: &Path) -> Result<Self, DriverError> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }

    fn module_for_address(&self, address: u64) -> Option<&str> {
        self.ranges
            .iter()
            .find(|range| range.start <= address && address < range.end)
            .map(|range| range.module.as_str())
    }

    fn lookup(&self, scope: &Scope, name: &str) -> Result<&TypeDef, ResolveError> {
        let module = match scope {
            Scope::Global => None,
            Scope::Module(module) => Some(module.as_str()),
            Scope::Address(address) => Some(
                self.module_for_address(*address)
                    .ok_or_else(|| ResolveError::ScopeNotFound(scope.to_string()))?,
            ),
        };

        let local = match module {
            Some(module) => self
                .modules
                .get(module)
                .ok_or_else(|| ResolveError::ScopeNotFound(scope.to_string()))?
                .get(name),
            None => None,
        };

        local
            .or_else(|| self.types.get(name))
            .ok_or_else(|| ResolveError::NameNotFound {
                scope: scope.to_string(),
                name: name.to_string(),
            })
    }
}

impl TypeResolver for Catalog {
    fn resolve(&self, scope: &Scope, name: &str) -> Result<TypeDescriptor, ResolveError> {
        let def = self.lookup(scope, name)?;
        TypeDescriptor::try_from(def.clone()).map_err(|source| ResolveError::InvalidType {
            name: name.to_string(),
            source,
        })
    }
}
