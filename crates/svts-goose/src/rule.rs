//! Trip-rule expression grammar and evaluator (component F): a small
//! boolean expression language over the GOOSE data-object map, built on
//! a `pest` grammar the same way other structured-text front ends in
//! this codebase parse their own expression languages.

use std::collections::HashMap;

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use svts_common::{SvtsError, SvtsResult};

use crate::datamap::{GooseDataMap, GooseValue};

#[derive(Parser)]
#[grammar = "rule.pest"]
struct RuleParser;

/// A comparison operator, per the grammar's `op` production.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

/// A literal value on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// `bool`.
    Bool(bool),
    /// `signed_integer`.
    Int(i64),
    /// `float`.
    Float(f64),
    /// A quoted UTF-8 string.
    Str(String),
}

/// Parsed trip-rule expression (grammar's `expr` production).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Short-circuit logical OR.
    Or(Box<Expr>, Box<Expr>),
    /// Short-circuit logical AND.
    And(Box<Expr>, Box<Expr>),
    /// Logical negation.
    Not(Box<Expr>),
    /// A path comparison against a literal.
    Cmp(String, CmpOp, Literal),
}

/// Parse a trip-rule expression string into an [`Expr`] AST.
pub fn parse(text: &str) -> SvtsResult<Expr> {
    let mut pairs = RuleParser::parse(Rule::rule_expr, text)
        .map_err(|e| SvtsError::ParseError(format!("trip-rule syntax error: {e}")))?;
    let rule_expr = pairs
        .next()
        .ok_or_else(|| SvtsError::ParseError("empty trip-rule expression".to_string()))?;
    let or_expr = rule_expr
        .into_inner()
        .next()
        .ok_or_else(|| SvtsError::ParseError("trip-rule expression has no body".to_string()))?;
    build_or(or_expr)
}

fn build_or(pair: Pair<Rule>) -> SvtsResult<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = build_and(inner.next().ok_or_else(missing("and_expr"))?)?;
    for and_pair in inner {
        expr = Expr::Or(Box::new(expr), Box::new(build_and(and_pair)?));
    }
    Ok(expr)
}

fn build_and(pair: Pair<Rule>) -> SvtsResult<Expr> {
    let mut inner = pair.into_inner();
    let mut expr = build_not(inner.next().ok_or_else(missing("not_expr"))?)?;
    for not_pair in inner {
        expr = Expr::And(Box::new(expr), Box::new(build_not(not_pair)?));
    }
    Ok(expr)
}

fn build_not(pair: Pair<Rule>) -> SvtsResult<Expr> {
    let mut negations = 0usize;
    let mut cmp_pair = None;
    for p in pair.into_inner() {
        match p.as_rule() {
            Rule::not_op => negations += 1,
            Rule::cmp => cmp_pair = Some(p),
            _ => {}
        }
    }
    let mut expr = build_cmp(cmp_pair.ok_or_else(missing("cmp"))?)?;
    for _ in 0..negations {
        expr = Expr::Not(Box::new(expr));
    }
    Ok(expr)
}

fn build_cmp(pair: Pair<Rule>) -> SvtsResult<Expr> {
    let inner = pair
        .into_inner()
        .next()
        .ok_or_else(missing("comparison or parenthesized expression"))?;
    match inner.as_rule() {
        Rule::comparison => build_comparison(inner),
        Rule::paren_expr => {
            let or_expr = inner
                .into_inner()
                .next()
                .ok_or_else(missing("parenthesized expr"))?;
            build_or(or_expr)
        }
        r => Err(SvtsError::ParseError(format!("unexpected grammar rule {r:?}"))),
    }
}

fn build_comparison(pair: Pair<Rule>) -> SvtsResult<Expr> {
    let mut inner = pair.into_inner();
    let path = inner.next().ok_or_else(missing("path"))?.as_str().to_string();
    let op_str = inner.next().ok_or_else(missing("cmp_op"))?.as_str();
    let op = match op_str {
        "==" => CmpOp::Eq,
        "!=" => CmpOp::Ne,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Ge,
        other => return Err(SvtsError::ParseError(format!("unknown operator {other}"))),
    };
    let literal_pair = inner.next().ok_or_else(missing("literal"))?;
    let literal = build_literal(literal_pair)?;
    Ok(Expr::Cmp(path, op, literal))
}

fn build_literal(pair: Pair<Rule>) -> SvtsResult<Literal> {
    let inner = pair.into_inner().next().ok_or_else(missing("literal value"))?;
    match inner.as_rule() {
        Rule::bool_lit => Ok(Literal::Bool(inner.as_str() == "true")),
        Rule::float_lit => inner
            .as_str()
            .parse::<f64>()
            .map(Literal::Float)
            .map_err(|e| SvtsError::ParseError(format!("invalid float literal: {e}"))),
        Rule::int_lit => inner
            .as_str()
            .parse::<i64>()
            .map(Literal::Int)
            .map_err(|e| SvtsError::ParseError(format!("invalid integer literal: {e}"))),
        Rule::string_lit => {
            let content = inner
                .into_inner()
                .next()
                .map(|p| p.as_str().to_string())
                .unwrap_or_default();
            Ok(Literal::Str(content))
        }
        r => Err(SvtsError::ParseError(format!("unexpected literal rule {r:?}"))),
    }
}

fn missing(what: &'static str) -> impl Fn() -> SvtsError {
    move || SvtsError::ParseError(format!("malformed trip-rule expression: missing {what}"))
}

/// Absolute tolerance used for float equality comparisons.
const FLOAT_EQ_TOLERANCE: f64 = 1e-9;

/// Evaluate a parsed expression against the current data-object map.
/// A missing path evaluates any comparison it appears in to `false`
/// (never an error); type coercion is disabled (e.g. bool vs int always
/// compares `false`).
#[must_use]
pub fn eval(expr: &Expr, map: &GooseDataMap) -> bool {
    match expr {
        Expr::Or(a, b) => eval(a, map) || eval(b, map),
        Expr::And(a, b) => eval(a, map) && eval(b, map),
        Expr::Not(a) => !eval(a, map),
        Expr::Cmp(path, op, literal) => eval_cmp(map.get(path).as_ref(), *op, literal),
    }
}

fn eval_cmp(value: Option<&GooseValue>, op: CmpOp, literal: &Literal) -> bool {
    let Some(value) = value else { return false };
    match (value, literal) {
        (GooseValue::Bool(a), Literal::Bool(b)) => apply_eq(op, *a == *b),
        (GooseValue::Utf8(a), Literal::Str(b)) => apply_ord(op, a.as_str().cmp(b.as_str())),
        (GooseValue::Int(a), Literal::Int(b)) => apply_ord(op, a.cmp(b)),
        (GooseValue::Uint(a), Literal::Int(b)) if *b >= 0 => {
            apply_ord(op, (*a).cmp(&(*b as u64)))
        }
        (GooseValue::Float(a), Literal::Float(b)) => apply_float(op, *a, *b),
        // Int-vs-float, bool-vs-numeric, bitstring comparisons, and any
        // other cross-type pairing are type coercion and are disabled.
        _ => false,
    }
}

fn apply_eq(op: CmpOp, equal: bool) -> bool {
    match op {
        CmpOp::Eq => equal,
        CmpOp::Ne => !equal,
        _ => false,
    }
}

fn apply_ord(op: CmpOp, ordering: std::cmp::Ordering) -> bool {
    use std::cmp::Ordering::{Equal, Greater, Less};
    match (op, ordering) {
        (CmpOp::Eq, Equal) => true,
        (CmpOp::Ne, Equal) => false,
        (CmpOp::Ne, _) => true,
        (CmpOp::Lt, Less) => true,
        (CmpOp::Le, Less | Equal) => true,
        (CmpOp::Gt, Greater) => true,
        (CmpOp::Ge, Greater | Equal) => true,
        _ => false,
    }
}

fn apply_float(op: CmpOp, a: f64, b: f64) -> bool {
    let equal = (a - b).abs() <= FLOAT_EQ_TOLERANCE;
    match op {
        CmpOp::Eq => equal,
        CmpOp::Ne => !equal,
        CmpOp::Lt => a < b,
        CmpOp::Le => a <= b || equal,
        CmpOp::Gt => a > b,
        CmpOp::Ge => a >= b || equal,
    }
}

/// One named, independently enabled trip rule.
#[derive(Debug, Clone)]
struct NamedRule {
    text: String,
    ast: Expr,
    enabled: bool,
}

/// The trip-rule evaluator (component F): a named set of boolean
/// expressions over the GOOSE data-object map. `evaluate()` returns the
/// first rule (iteration order unspecified) whose expression is true
/// and whose `enabled` flag is set.
#[derive(Debug, Default)]
pub struct RuleSet {
    rules: HashMap<String, NamedRule>,
}

impl RuleSet {
    /// Construct an empty rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a rule. Transactional: a syntactically invalid
    /// expression is rejected with an error and the previous rule (if
    /// any) under this name is left completely intact.
    pub fn add_rule(&mut self, name: &str, expression: &str) -> SvtsResult<()> {
        let ast = parse(expression)?;
        let enabled = self.rules.get(name).map_or(true, |r| r.enabled);
        self.rules.insert(
            name.to_string(),
            NamedRule {
                text: expression.to_string(),
                ast,
                enabled,
            },
        );
        Ok(())
    }

    /// Remove a rule by name; a no-op if it did not exist.
    pub fn remove_rule(&mut self, name: &str) {
        self.rules.remove(name);
    }

    /// Enable or disable a rule by name.
    pub fn set_enabled(&mut self, name: &str, enabled: bool) -> SvtsResult<()> {
        self.rules
            .get_mut(name)
            .map(|r| r.enabled = enabled)
            .ok_or_else(|| SvtsError::ConfigInvalid(format!("no such rule: {name}")))
    }

    /// The raw expression text currently stored for `name`, if any.
    #[must_use]
    pub fn rule_text(&self, name: &str) -> Option<&str> {
        self.rules.get(name).map(|r| r.text.as_str())
    }

    /// Number of rules currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether no rules are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate every enabled rule against `map`; returns the name of the
    /// first rule found true. Referentially transparent on an unchanging
    /// map: repeated calls with no map mutation return the same result.
    #[must_use]
    pub fn evaluate(&self, map: &GooseDataMap) -> Option<String> {
        self.rules
            .iter()
            .find(|(_, rule)| rule.enabled && eval(&rule.ast, map))
            .map(|(name, _)| name.clone())
    }
}
