//! Semantic analysis.
//!
//! Analysis runs in two phases over every module of the graph:
//!
//! - Discovery declares structs, traits, submodules, imports, fields,
//!   functions, impls and globals, in import order
//! - Checking visits every body once, type-checks each statement and
//!   evaluates each expression symbolically
//!
//! Diagnostics are collected rather than returned, and analysis continues
//! after an error with a placeholder value so sibling nodes are still
//! checked.

pub mod declare;
pub mod eval;
pub mod expr;
pub mod stmt;
pub mod type_checker;

#[cfg(test)]
mod tests;
