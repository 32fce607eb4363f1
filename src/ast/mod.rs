/// AST (Abstract Syntax Tree) module
/// Contains all definitions related to the AST structure
///
/// Submodules:
/// - ast: Arena-backed statement and expression nodes
/// - types: Semantic type descriptors and the implicit-cast lattice
/// - values: Compile-time values used by symbolic evaluation
pub mod ast;
pub mod types;
pub mod values;

#[cfg(test)]
mod tests;
