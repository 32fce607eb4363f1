//! LLVM code generation.
//!
//! Lowering runs after analysis succeeds and turns the module graph into a
//! single LLVM module:
//!
//! - Struct layouts and trait fat pointer types are declared first
//! - Every function and method gets a prototype before any body is lowered
//! - Globals are emitted with constant initializers folded by analysis
//! - Bodies are lowered statement by statement, with trait calls going
//!   through per-(struct, trait) vtables

pub mod cast;
pub mod compiler;
pub mod dispatch;
pub mod expr;
pub mod identity;
pub mod layout;
pub mod shadow;
pub mod stmt;

#[cfg(test)]
mod tests;
