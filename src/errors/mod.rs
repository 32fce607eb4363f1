//! Error types and error handling for the compiler.
//!
//! This module defines the error types used throughout the compilation
//! process. It includes:
//!
//! - The closed diagnostic catalogue with positional message templates
//! - Error structures with source span information
//! - A diagnostics sink used by the analyzer to keep going after errors
//! - Pipeline-level and code generation failures

pub mod errors;
