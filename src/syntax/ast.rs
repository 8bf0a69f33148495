//! Abstract syntax tree for Catch-style fixture sources.
//!
//! Every statement keeps its byte span and 1-based line so the runner can
//! report assertion locations as `file:line`, and so runtime errors can point
//! back into the fixture with a miette label.

use std::fmt;

use crate::diagnostics::Span;

/// One parsed fixture file.
#[derive(Debug, Clone, PartialEq)]
pub struct Fixture {
    pub cases: Vec<CaseDecl>,
}

/// A `TEST_CASE("name", "[tags]") { ... }` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseDecl {
    pub name: String,
    /// The raw tag string, e.g. `[tag][neat]`. Empty when omitted.
    pub tags: String,
    pub line: u32,
    pub span: Span,
    pub body: Block,
}

pub type Block = Vec<Stmt>;

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub line: u32,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Section {
        name: String,
        body: Block,
    },
    Assert {
        macro_name: AssertMacro,
        expr: Expr,
        /// Source text of the asserted expression, whitespace-normalised.
        text: String,
    },
    Log {
        level: LogMacro,
        message: String,
    },
    Fail {
        message: String,
        /// `FAIL_CHECK` records the failure without aborting the path.
        continue_path: bool,
    },
    Succeed {
        message: String,
    },
    Declare {
        ty: LocalType,
        name: String,
        init: Option<Expr>,
    },
    Assign {
        name: String,
        op: AssignOp,
        value: Expr,
    },
    Update {
        name: String,
        delta: i64,
    },
    Expr(Expr),
    Block(Block),
}

/// Declared type of a fixture local. `long` is folded into `Int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalType {
    Int,
    Bool,
    /// Takes the type of its initializer.
    Auto,
}

impl LocalType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "int" | "long" => Some(LocalType::Int),
            "bool" => Some(LocalType::Bool),
            "auto" => Some(LocalType::Auto),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertMacro {
    Require,
    RequireFalse,
    Check,
    CheckFalse,
}

impl AssertMacro {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "REQUIRE" => Some(AssertMacro::Require),
            "REQUIRE_FALSE" => Some(AssertMacro::RequireFalse),
            "CHECK" => Some(AssertMacro::Check),
            "CHECK_FALSE" => Some(AssertMacro::CheckFalse),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMacro {
    Warn,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
}

impl AssignOp {
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "=" => Some(AssignOp::Set),
            "+=" => Some(AssignOp::Add),
            "-=" => Some(AssignOp::Sub),
            "*=" => Some(AssignOp::Mul),
            "/=" => Some(AssignOp::Div),
            _ => None,
        }
    }

    /// The binary operator a compound assignment applies, if any.
    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64, Span),
    Bool(bool, Span),
    Var(String, Span),
    Unary(UnaryOp, Box<Expr>, Span),
    Binary(BinaryOp, Box<Expr>, Box<Expr>, Span),
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Int(_, span)
            | Expr::Bool(_, span)
            | Expr::Var(_, span)
            | Expr::Unary(_, _, span)
            | Expr::Binary(_, _, _, span) => *span,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    pub fn from_token(token: &str) -> Option<Self> {
        let op = match token {
            "||" => BinaryOp::Or,
            "&&" => BinaryOp::And,
            "==" => BinaryOp::Eq,
            "!=" => BinaryOp::Ne,
            "<" => BinaryOp::Lt,
            "<=" => BinaryOp::Le,
            ">" => BinaryOp::Gt,
            ">=" => BinaryOp::Ge,
            "+" => BinaryOp::Add,
            "-" => BinaryOp::Sub,
            "*" => BinaryOp::Mul,
            "/" => BinaryOp::Div,
            "%" => BinaryOp::Rem,
            _ => return None,
        };
        Some(op)
    }

    /// Comparisons are the operators whose operands Catch decomposes into
    /// the expanded assertion text.
    pub fn is_comparison(&self) -> bool {
        matches!(
            self,
            BinaryOp::Eq | BinaryOp::Ne | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge
        )
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Or => "||",
            BinaryOp::And => "&&",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
