//! Interpreter for fixture test case bodies.
//!
//! Each run-through of a fixture case gets a brand new [`Interpreter`], so
//! locals declared in the case body are rebuilt from scratch for every leaf
//! path. Statements are executed against the runner's [`Context`]: sections
//! go through [`Context::section`], assertion macros become
//! [`Context::evaluate`] calls, and so on.
//!
//! ## Error Handling
//!
//! Problems with the fixture itself (an undefined variable, a redeclaration,
//! division by zero) are [`CatchError::Eval`] diagnostics built with
//! `err_src!`. They never escape the interpreter: each one is recorded on the
//! current path as an `Error` outcome, which aborts that path only.

use std::collections::HashMap;
use std::sync::Arc;

use log::debug;
use miette::Report;

use crate::diagnostics::{CatchError, SourceArc, Span};
use crate::err_src;
use crate::registry::{TestBody, TestCase};
use crate::report::{AssertKind, Location};
use crate::runner::{Abort, Assertion, Context};
use crate::runtime::value::Value;
use crate::syntax::ast::{
    AssertMacro, BinaryOp, CaseDecl, Expr, LocalType, LogMacro, Stmt, StmtKind, UnaryOp,
};
use crate::tags::TagSet;

// ============================================================================
// TEST BODY
// ============================================================================

/// A fixture `TEST_CASE` body, runnable by the runner.
#[derive(Debug, Clone)]
pub struct ScriptBody {
    decl: Arc<CaseDecl>,
    source: SourceArc,
    file: Arc<str>,
}

impl ScriptBody {
    pub fn new(decl: CaseDecl, source: SourceArc, file: impl Into<Arc<str>>) -> Self {
        Self {
            decl: Arc::new(decl),
            source,
            file: file.into(),
        }
    }

    /// Wraps the body into a registrable test case.
    pub fn into_test_case(self) -> TestCase {
        let name = self.decl.name.clone();
        let tags = TagSet::parse(&self.decl.tags);
        let location = Location::new(&*self.file, self.decl.line);
        TestCase::new(name, tags, location, Arc::new(self))
    }
}

impl TestBody for ScriptBody {
    fn run(&self, ctx: &mut Context) -> Result<(), Abort> {
        let mut interpreter = Interpreter::new(&self.source, &self.file);
        interpreter.exec_block(ctx, &self.decl.body)
    }
}

// ============================================================================
// INTERPRETER
// ============================================================================

/// A declared local. `ty` is never `Auto` once stored.
#[derive(Debug, Clone, Copy)]
struct Local {
    ty: LocalType,
    value: Value,
}

pub struct Interpreter<'a> {
    source: &'a SourceArc,
    file: &'a str,
    scopes: Vec<HashMap<String, Local>>,
}

impl<'a> Interpreter<'a> {
    pub fn new(source: &'a SourceArc, file: &'a str) -> Self {
        Self {
            source,
            file,
            scopes: Vec::new(),
        }
    }

    /// Executes `block` in a fresh lexical scope.
    pub fn exec_block(&mut self, ctx: &mut Context, block: &[Stmt]) -> Result<(), Abort> {
        self.scopes.push(HashMap::new());
        let result = block.iter().try_for_each(|stmt| self.exec_stmt(ctx, stmt));
        self.scopes.pop();
        result
    }

    fn exec_stmt(&mut self, ctx: &mut Context, stmt: &Stmt) -> Result<(), Abort> {
        let location = Location::new(self.file, stmt.line);

        match &stmt.kind {
            StmtKind::Section { name, body } => {
                ctx.section(name, |ctx| self.exec_block(ctx, body))
            }

            StmtKind::Assert {
                macro_name,
                expr,
                text,
            } => {
                let (value, expanded) = self.expand(expr).map_err(|e| record(ctx, e, &location))?;
                let assertion = Assertion::new(assert_kind(*macro_name), value, text, location)
                    .with_expansion(expanded);
                ctx.evaluate(assertion).map(|_| ())
            }

            StmtKind::Log { level, message } => {
                match level {
                    LogMacro::Warn => ctx.warn(message, location),
                    LogMacro::Info => ctx.info(message),
                }
                Ok(())
            }

            StmtKind::Fail {
                message,
                continue_path,
            } => {
                if *continue_path {
                    ctx.fail_check(message, location);
                    Ok(())
                } else {
                    Err(ctx.fail(message, location))
                }
            }

            StmtKind::Succeed { message } => {
                ctx.succeed(message, location);
                Ok(())
            }

            StmtKind::Declare { ty, name, init } => {
                let value = match init {
                    Some(expr) => self.eval(expr).map_err(|e| record(ctx, e, &location))?,
                    None => Value::default(),
                };
                self.declare(*ty, name, value, stmt.span)
                    .map_err(|e| record(ctx, e, &location))
            }

            StmtKind::Assign { name, op, value } => {
                let result = self.eval(value).and_then(|rhs| {
                    let new_value = match op.binary() {
                        Some(bin) => {
                            let current = self.lookup(name, stmt.span)?;
                            self.arithmetic(bin, current, rhs, value.span())?
                        }
                        None => rhs,
                    };
                    self.assign(name, new_value, stmt.span)
                });
                result.map_err(|e| record(ctx, e, &location))
            }

            StmtKind::Update { name, delta } => {
                let result = self.lookup(name, stmt.span).and_then(|current| {
                    let updated = current.as_int().checked_add(*delta).ok_or_else(|| {
                        err_src!(Eval, "integer overflow", self.source, stmt.span)
                    })?;
                    self.assign(name, Value::Int(updated), stmt.span)
                });
                result.map_err(|e| record(ctx, e, &location))
            }

            StmtKind::Expr(expr) => self
                .eval(expr)
                .map(|_| ())
                .map_err(|e| record(ctx, e, &location)),

            StmtKind::Block(block) => self.exec_block(ctx, block),
        }
    }

    // ========================================================================
    // VARIABLES
    // ========================================================================

    fn declare(&mut self, ty: LocalType, name: &str, value: Value, span: Span) -> Result<(), CatchError> {
        let Some(scope) = self.scopes.last_mut() else {
            return Err(err_src!(Internal, "no scope to declare into", self.source, span));
        };
        if scope.contains_key(name) {
            return Err(err_src!(
                Eval,
                format!("redeclaration of '{}'", name),
                self.source,
                span,
                "each local may be declared once per block"
            ));
        }
        let ty = match (ty, value) {
            (LocalType::Auto, Value::Bool(_)) => LocalType::Bool,
            (LocalType::Auto, Value::Int(_)) => LocalType::Int,
            (declared, _) => declared,
        };
        let value = convert(ty, value);
        scope.insert(name.to_string(), Local { ty, value });
        Ok(())
    }

    fn lookup(&self, name: &str, span: Span) -> Result<Value, CatchError> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).map(|local| local.value))
            .ok_or_else(|| undefined(name, self.source, span))
    }

    fn assign(&mut self, name: &str, value: Value, span: Span) -> Result<(), CatchError> {
        let slot = self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name));
        match slot {
            Some(slot) => {
                slot.value = convert(slot.ty, value);
                Ok(())
            }
            None => Err(undefined(name, self.source, span)),
        }
    }

    // ========================================================================
    // EXPRESSIONS
    // ========================================================================

    /// Evaluates an asserted expression and renders its expansion. A
    /// top-level comparison shows both operand values, e.g. `43 == 42`.
    fn expand(&self, expr: &Expr) -> Result<(bool, String), CatchError> {
        if let Expr::Binary(op, lhs, rhs, _) = expr {
            if op.is_comparison() {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                let value = compare(*op, left, right);
                return Ok((value, format!("{} {} {}", left, op, right)));
            }
        }
        let value = self.eval(expr)?;
        Ok((value.is_truthy(), value.to_string()))
    }

    pub fn eval(&self, expr: &Expr) -> Result<Value, CatchError> {
        match expr {
            Expr::Int(n, _) => Ok(Value::Int(*n)),
            Expr::Bool(b, _) => Ok(Value::Bool(*b)),
            Expr::Var(name, span) => self.lookup(name, *span),

            Expr::Unary(op, operand, span) => {
                let value = self.eval(operand)?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => value
                        .as_int()
                        .checked_neg()
                        .map(Value::Int)
                        .ok_or_else(|| err_src!(Eval, "integer overflow", self.source, *span)),
                }
            }

            Expr::Binary(BinaryOp::And, lhs, rhs, _) => {
                let value = self.eval(lhs)?.is_truthy() && self.eval(rhs)?.is_truthy();
                Ok(Value::Bool(value))
            }

            Expr::Binary(BinaryOp::Or, lhs, rhs, _) => {
                let value = self.eval(lhs)?.is_truthy() || self.eval(rhs)?.is_truthy();
                Ok(Value::Bool(value))
            }

            Expr::Binary(op, lhs, rhs, span) => {
                let left = self.eval(lhs)?;
                let right = self.eval(rhs)?;
                if op.is_comparison() {
                    Ok(Value::Bool(compare(*op, left, right)))
                } else {
                    self.arithmetic(*op, left, right, *span)
                }
            }
        }
    }

    fn arithmetic(&self, op: BinaryOp, left: Value, right: Value, span: Span) -> Result<Value, CatchError> {
        let (l, r) = (left.as_int(), right.as_int());
        if matches!(op, BinaryOp::Div | BinaryOp::Rem) && r == 0 {
            return Err(err_src!(Eval, "division by zero", self.source, span));
        }
        let result = match op {
            BinaryOp::Add => l.checked_add(r),
            BinaryOp::Sub => l.checked_sub(r),
            BinaryOp::Mul => l.checked_mul(r),
            BinaryOp::Div => l.checked_div(r),
            BinaryOp::Rem => l.checked_rem(r),
            other => {
                return Err(err_src!(
                    Internal,
                    format!("'{}' is not an arithmetic operator", other),
                    self.source,
                    span
                ))
            }
        };
        result
            .map(Value::Int)
            .ok_or_else(|| err_src!(Eval, "integer overflow", self.source, span))
    }
}

/// Implicit conversion on initialization and assignment.
fn convert(ty: LocalType, value: Value) -> Value {
    match ty {
        LocalType::Bool => Value::Bool(value.is_truthy()),
        LocalType::Int => Value::Int(value.as_int()),
        LocalType::Auto => value,
    }
}

fn compare(op: BinaryOp, left: Value, right: Value) -> bool {
    let (l, r) = (left.as_int(), right.as_int());
    match op {
        BinaryOp::Eq => l == r,
        BinaryOp::Ne => l != r,
        BinaryOp::Lt => l < r,
        BinaryOp::Le => l <= r,
        BinaryOp::Gt => l > r,
        BinaryOp::Ge => l >= r,
        _ => false,
    }
}

fn assert_kind(macro_name: AssertMacro) -> AssertKind {
    match macro_name {
        AssertMacro::Require => AssertKind::Require,
        AssertMacro::RequireFalse => AssertKind::RequireFalse,
        AssertMacro::Check => AssertKind::Check,
        AssertMacro::CheckFalse => AssertKind::CheckFalse,
    }
}

fn undefined(name: &str, source: &SourceArc, span: Span) -> CatchError {
    err_src!(
        Eval,
        format!("use of undeclared identifier '{}'", name),
        source,
        span,
        "declare it with `int` or `bool` earlier in the test case"
    )
}

/// Records `error` on the current path and turns it into an abort.
fn record(ctx: &mut Context, error: CatchError, location: &Location) -> Abort {
    let message = error.to_string();
    debug!("{:?}", Report::new(error));
    ctx.error(message, Some(location.clone()))
}
