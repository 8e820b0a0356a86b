//! # bitlayout-cli
//!
//! Batch driver around `bitlayout`: resolves `(scope, name)` requests to type
//! trees through a [`driver::TypeResolver`], flattens them and writes one JSON
//! record per request. Also decodes raw buffers with a dumped layout.
//!
//! The [`catalog::Catalog`] resolver reads type trees from a JSON file, which
//! stands in for a debugger or debug-info reader.

pub mod catalog;
pub mod driver;
pub mod errors;
