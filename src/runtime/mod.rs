//! Execution of fixture test case bodies.

pub mod eval;
pub mod value;

pub use eval::{Interpreter, ScriptBody};
pub use value::Value;
