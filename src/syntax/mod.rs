//! Fixture front end: grammar, AST, and parser.

pub mod ast;
pub mod parser;

pub use ast::{CaseDecl, Fixture};
pub use parser::parse;
