//! Fixture parser: pest grammar to AST.
//!
//! Purely syntactic. Variable resolution, arithmetic, and assertion semantics
//! all happen later in the interpreter.

use pest::{
    error::{Error, InputLocation},
    iterators::Pair,
    Parser,
};
use pest_derive::Parser;

use crate::diagnostics::{CatchError, SourceArc, Span};
use crate::err_src;
use crate::syntax::ast::{
    AssertMacro, AssignOp, BinaryOp, Block, CaseDecl, Expr, Fixture, LocalType, LogMacro, Stmt,
    StmtKind, UnaryOp,
};

#[derive(Parser)]
#[grammar = "syntax/grammar.pest"]
struct FixtureParser;

// ============================================================================
// PUBLIC API
// ============================================================================

/// Parses a whole fixture source into its test case declarations.
pub fn parse(source: &SourceArc) -> Result<Fixture, CatchError> {
    let text = source.inner().as_str();
    let mut pairs = FixtureParser::parse(Rule::fixture, text)
        .map_err(|e| convert_parse_error(e, source))?;

    let Some(fixture) = pairs.next() else {
        return Ok(Fixture { cases: vec![] });
    };

    let cases = fixture
        .into_inner()
        .filter(|p| p.as_rule() == Rule::test_case)
        .map(|p| build_case(p, source))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Fixture { cases })
}

// ============================================================================
// AST BUILDERS
// ============================================================================

fn build_case(pair: Pair<Rule>, source: &SourceArc) -> Result<CaseDecl, CatchError> {
    let span = get_span(&pair);
    let line = get_line(&pair);
    let mut name = None;
    let mut tags = String::new();
    let mut body = Vec::new();

    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::string if name.is_none() => name = Some(unescape(inner, source)?),
            Rule::string => tags = unescape(inner, source)?,
            Rule::block => body = build_block(inner, source)?,
            rule => return Err(unexpected(rule, span, source)),
        }
    }

    let name = name.ok_or_else(|| err_src!(Parse, "test case is missing a name", source, span))?;
    if name.trim().is_empty() {
        return Err(err_src!(
            Parse,
            "test case name must not be empty",
            source,
            span
        ));
    }

    Ok(CaseDecl {
        name,
        tags,
        line,
        span,
        body,
    })
}

fn build_block(pair: Pair<Rule>, source: &SourceArc) -> Result<Block, CatchError> {
    pair.into_inner().map(|p| build_stmt(p, source)).collect()
}

fn build_stmt(pair: Pair<Rule>, source: &SourceArc) -> Result<Stmt, CatchError> {
    let span = get_span(&pair);
    let line = get_line(&pair);
    let rule = pair.as_rule();
    let mut inner = pair.into_inner();

    let kind = match rule {
        Rule::section => {
            let name = unescape(next(&mut inner, span, source)?, source)?;
            let body = build_block(next(&mut inner, span, source)?, source)?;
            StmtKind::Section { name, body }
        }

        Rule::assertion => {
            let keyword = next(&mut inner, span, source)?;
            let macro_name = AssertMacro::from_keyword(keyword.as_str())
                .ok_or_else(|| unexpected(keyword.as_rule(), span, source))?;
            let expr_pair = next(&mut inner, span, source)?;
            let text = normalize_whitespace(expr_pair.as_str());
            let expr = build_expr(expr_pair, source)?;
            StmtKind::Assert {
                macro_name,
                expr,
                text,
            }
        }

        Rule::log_stmt => {
            let level = match next(&mut inner, span, source)?.as_str() {
                "WARN" => LogMacro::Warn,
                _ => LogMacro::Info,
            };
            let message = unescape(next(&mut inner, span, source)?, source)?;
            StmtKind::Log { level, message }
        }

        Rule::fail_stmt => {
            let continue_path = next(&mut inner, span, source)?.as_str() == "FAIL_CHECK";
            let message = unescape(next(&mut inner, span, source)?, source)?;
            StmtKind::Fail {
                message,
                continue_path,
            }
        }

        Rule::succeed_stmt => {
            let message = unescape(next(&mut inner, span, source)?, source)?;
            StmtKind::Succeed { message }
        }

        Rule::declaration => {
            let type_pair = next(&mut inner, span, source)?;
            let ty = LocalType::from_keyword(type_pair.as_str())
                .ok_or_else(|| unexpected(type_pair.as_rule(), span, source))?;
            let name = next(&mut inner, span, source)?.as_str().to_string();
            let init = inner.next().map(|p| build_expr(p, source)).transpose()?;
            StmtKind::Declare { ty, name, init }
        }

        Rule::update_stmt => {
            let first = next(&mut inner, span, source)?;
            let second = next(&mut inner, span, source)?;
            let (op, ident) = if first.as_rule() == Rule::incdec {
                (first, second)
            } else {
                (second, first)
            };
            let delta = if op.as_str() == "++" { 1 } else { -1 };
            StmtKind::Update {
                name: ident.as_str().to_string(),
                delta,
            }
        }

        Rule::assign_stmt => {
            let name = next(&mut inner, span, source)?.as_str().to_string();
            let op_pair = next(&mut inner, span, source)?;
            let op = AssignOp::from_token(op_pair.as_str())
                .ok_or_else(|| unexpected(op_pair.as_rule(), span, source))?;
            let value = build_expr(next(&mut inner, span, source)?, source)?;
            StmtKind::Assign { name, op, value }
        }

        Rule::expr_stmt => StmtKind::Expr(build_expr(next(&mut inner, span, source)?, source)?),

        Rule::block => StmtKind::Block(
            inner
                .map(|p| build_stmt(p, source))
                .collect::<Result<Vec<_>, _>>()?,
        ),

        rule => return Err(unexpected(rule, span, source)),
    };

    Ok(Stmt { kind, line, span })
}

fn build_expr(pair: Pair<Rule>, source: &SourceArc) -> Result<Expr, CatchError> {
    let span = get_span(&pair);

    match pair.as_rule() {
        Rule::expr => build_expr(next(&mut pair.into_inner(), span, source)?, source),

        Rule::or_expr
        | Rule::and_expr
        | Rule::eq_expr
        | Rule::rel_expr
        | Rule::add_expr
        | Rule::mul_expr => {
            let mut inner = pair.into_inner();
            let mut lhs = build_expr(next(&mut inner, span, source)?, source)?;
            while let Some(op_pair) = inner.next() {
                let op = BinaryOp::from_token(op_pair.as_str())
                    .ok_or_else(|| unexpected(op_pair.as_rule(), span, source))?;
                let rhs = build_expr(next(&mut inner, span, source)?, source)?;
                let joined = Span::new(lhs.span().start, rhs.span().end);
                lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs), joined);
            }
            Ok(lhs)
        }

        Rule::unary => {
            let mut ops = Vec::new();
            let mut operand = None;
            for inner in pair.into_inner() {
                if inner.as_rule() == Rule::unary_op {
                    let op = if inner.as_str() == "!" {
                        UnaryOp::Not
                    } else {
                        UnaryOp::Neg
                    };
                    ops.push(op);
                } else {
                    operand = Some(build_expr(inner, source)?);
                }
            }
            let operand =
                operand.ok_or_else(|| err_src!(Parse, "expected an operand", source, span))?;
            // Prefix operators bind innermost-last: `!-x` is `!(-x)`.
            Ok(ops
                .into_iter()
                .rev()
                .fold(operand, |acc, op| Expr::Unary(op, Box::new(acc), span)))
        }

        Rule::integer => {
            let value = pair.as_str().parse::<i64>().map_err(|e| {
                err_src!(Parse, format!("invalid integer literal: {}", e), source, span)
            })?;
            Ok(Expr::Int(value, span))
        }

        Rule::boolean => Ok(Expr::Bool(pair.as_str() == "true", span)),

        Rule::ident => Ok(Expr::Var(pair.as_str().to_string(), span)),

        rule => Err(unexpected(rule, span, source)),
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn next<'i>(
    pairs: &mut pest::iterators::Pairs<'i, Rule>,
    span: Span,
    source: &SourceArc,
) -> Result<Pair<'i, Rule>, CatchError> {
    pairs
        .next()
        .ok_or_else(|| err_src!(Parse, "incomplete statement", source, span))
}

fn unexpected(rule: Rule, span: Span, source: &SourceArc) -> CatchError {
    err_src!(
        Parse,
        format!("unsupported construct: {:?}", rule),
        source,
        span
    )
}

fn get_span(pair: &Pair<Rule>) -> Span {
    let s = pair.as_span();
    Span::new(s.start(), s.end())
}

fn get_line(pair: &Pair<Rule>) -> u32 {
    pair.line_col().0 as u32
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unescape(pair: Pair<Rule>, source: &SourceArc) -> Result<String, CatchError> {
    let span = get_span(&pair);
    let body = match pair.into_inner().next() {
        Some(body) => body.as_str(),
        None => return Ok(String::new()),
    };

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some(other @ ('"' | '\\' | '\'')) => out.push(other),
            Some(other) => {
                return Err(err_src!(
                    Parse,
                    format!("unknown escape sequence '\\{}'", other),
                    source,
                    span
                ))
            }
            None => return Err(err_src!(Parse, "dangling escape", source, span)),
        }
    }
    Ok(out)
}

fn convert_parse_error(error: Error<Rule>, source: &SourceArc) -> CatchError {
    let span = match error.location {
        InputLocation::Pos(pos) => Span::new(pos, pos),
        InputLocation::Span((start, end)) => Span::new(start, end),
    };
    err_src!(
        Parse,
        format!("syntax error: {}", error.variant.message()),
        source,
        span,
        "fixtures may only contain TEST_CASE blocks at the top level"
    )
}
