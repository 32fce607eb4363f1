//! Symbol model shared by the analyzer and the code generator.
//!
//! - `module`: the module graph, per-module symbol tables and lookup
//! - `records`: variables, functions, methods, fields, structs and traits

pub mod module;
pub mod records;

#[cfg(test)]
mod tests;
