//! Expression-based population and categorization predicates.
//!
//! Study populations and categorization rules are boolean expressions over
//! named variables. This module provides the expression tree and its
//! evaluation against a per-patient context of computed values. Referencing
//! a name the context does not hold is fatal: predicates are validated at
//! study-build time and evaluation repeats the check.

use std::collections::HashSet;

use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StudyDefError};

/// A per-patient value computed for one variable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// A date, e.g. first diagnosis in a period
    Date(NaiveDate),
    /// A boolean presence flag
    Bool(bool),
    /// An integer, e.g. an age or a consultation count
    Int(i64),
    /// A numeric measurement value
    Float(f64),
    /// A categorical value, e.g. a sex code or a smoking category
    Str(String),
    /// No matching record
    Missing,
}

impl Value {
    /// Truthiness of a value when used as a bare predicate term.
    ///
    /// A present date is true; a missing value is false; numbers are true
    /// when non-zero; strings are true when non-empty.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Date(_) => true,
            Self::Bool(b) => *b,
            Self::Int(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::Str(s) => !s.is_empty(),
            Self::Missing => false,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// A literal a variable can be compared against
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    /// Integer literal
    Int(i64),
    /// Floating point literal
    Float(f64),
    /// String literal
    Str(String),
}

impl Literal {
    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Str(_) => None,
        }
    }
}

/// A boolean expression over named variables
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A variable used as a bare term, true when its value is truthy
    Var(String),

    /// Variable equals a literal value
    Eq(String, Literal),

    /// Variable does not equal a literal value
    NotEq(String, Literal),

    /// Variable is greater than a literal value
    Gt(String, Literal),

    /// Variable is greater than or equal to a literal value
    GtEq(String, Literal),

    /// Variable is less than a literal value
    Lt(String, Literal),

    /// Variable is less than or equal to a literal value
    LtEq(String, Literal),

    /// Variable is a member of a set of values
    In(String, Vec<Literal>),

    /// Logical AND of expressions
    And(Vec<Expr>),

    /// Logical OR of expressions
    Or(Vec<Expr>),

    /// Logical NOT of an expression
    Not(Box<Expr>),

    /// Always evaluates to true
    AlwaysTrue,
}

impl Expr {
    /// Variable reference as a bare boolean term
    #[must_use]
    pub fn var(name: &str) -> Self {
        Self::Var(name.to_string())
    }

    /// Equality against a string literal
    #[must_use]
    pub fn eq_str(name: &str, value: &str) -> Self {
        Self::Eq(name.to_string(), Literal::Str(value.to_string()))
    }

    /// Returns the set of all variable names this expression references
    #[must_use]
    pub fn required_variables(&self) -> HashSet<String> {
        let mut names = HashSet::new();
        self.collect_required_variables(&mut names);
        names
    }

    fn collect_required_variables(&self, names: &mut HashSet<String>) {
        match self {
            Self::Var(name)
            | Self::Eq(name, _)
            | Self::NotEq(name, _)
            | Self::Gt(name, _)
            | Self::GtEq(name, _)
            | Self::Lt(name, _)
            | Self::LtEq(name, _)
            | Self::In(name, _) => {
                names.insert(name.clone());
            }
            Self::And(exprs) | Self::Or(exprs) => {
                for expr in exprs {
                    expr.collect_required_variables(names);
                }
            }
            Self::Not(expr) => {
                expr.collect_required_variables(names);
            }
            Self::AlwaysTrue => {}
        }
    }

    /// Evaluate the expression against computed variable values
    pub fn evaluate(&self, ctx: &VariableContext) -> Result<bool> {
        match self {
            Self::Var(name) => Ok(ctx.resolve(name)?.is_truthy()),
            Self::Eq(name, literal) => Ok(literal_eq(ctx.resolve(name)?, literal)),
            Self::NotEq(name, literal) => {
                let value = ctx.resolve(name)?;
                if matches!(value, Value::Missing) {
                    return Ok(false);
                }
                Ok(!literal_eq(value, literal))
            }
            Self::Gt(name, literal) => ordered(ctx, name, literal, |a, b| a > b),
            Self::GtEq(name, literal) => ordered(ctx, name, literal, |a, b| a >= b),
            Self::Lt(name, literal) => ordered(ctx, name, literal, |a, b| a < b),
            Self::LtEq(name, literal) => ordered(ctx, name, literal, |a, b| a <= b),
            Self::In(name, literals) => {
                let value = ctx.resolve(name)?;
                Ok(literals.iter().any(|l| literal_eq(value, l)))
            }
            Self::And(exprs) => {
                for expr in exprs {
                    if !expr.evaluate(ctx)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            Self::Or(exprs) => {
                for expr in exprs {
                    if expr.evaluate(ctx)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Self::Not(expr) => Ok(!expr.evaluate(ctx)?),
            Self::AlwaysTrue => Ok(true),
        }
    }
}

fn literal_eq(value: &Value, literal: &Literal) -> bool {
    match (value, literal) {
        (Value::Str(s), Literal::Str(t)) => s == t,
        (_, _) => match (value.as_f64(), literal.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

fn ordered(
    ctx: &VariableContext,
    name: &str,
    literal: &Literal,
    cmp: impl Fn(f64, f64) -> bool,
) -> Result<bool> {
    let value = ctx.resolve(name)?;
    if matches!(value, Value::Missing) {
        return Ok(false);
    }
    let left = value
        .as_f64()
        .ok_or_else(|| StudyDefError::NonNumericComparison {
            name: name.to_string(),
        })?;
    let right = literal
        .as_f64()
        .ok_or_else(|| StudyDefError::NonNumericComparison {
            name: name.to_string(),
        })?;
    Ok(cmp(left, right))
}

/// Computed variable values for one patient, in declaration order
#[derive(Debug, Clone, Default)]
pub struct VariableContext {
    values: IndexMap<String, Value>,
}

impl VariableContext {
    /// Create an empty context
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a computed value under a variable name
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Look up a computed value
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Look up a computed value, failing on an undefined name
    pub fn resolve(&self, name: &str) -> Result<&Value> {
        self.values
            .get(name)
            .ok_or_else(|| StudyDefError::UndefinedVariable {
                name: name.to_string(),
                referenced_by: "predicate".to_string(),
            })
    }

    /// The computed values, in insertion order
    #[must_use]
    pub fn values(&self) -> &IndexMap<String, Value> {
        &self.values
    }

    /// Consume the context, yielding the computed values
    #[must_use]
    pub fn into_values(self) -> IndexMap<String, Value> {
        self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> VariableContext {
        let mut ctx = VariableContext::new();
        ctx.insert("age", Value::Int(67));
        ctx.insert("sex", Value::Str("F".to_string()));
        ctx.insert("imd", Value::Int(300));
        ctx.insert("af", Value::Date(NaiveDate::from_ymd_opt(2019, 6, 1).unwrap()));
        ctx.insert("warfarin_last_four_months", Value::Missing);
        ctx
    }

    #[test]
    fn bare_variable_uses_truthiness() {
        let ctx = ctx();
        assert!(Expr::var("af").evaluate(&ctx).unwrap());
        assert!(!Expr::var("warfarin_last_four_months").evaluate(&ctx).unwrap());
    }

    #[test]
    fn comparisons_and_logic_compose() {
        let ctx = ctx();
        let predicate = Expr::And(vec![
            Expr::GtEq("age".to_string(), Literal::Int(18)),
            Expr::LtEq("age".to_string(), Literal::Int(110)),
            Expr::Gt("imd".to_string(), Literal::Int(0)),
            Expr::Or(vec![Expr::eq_str("sex", "M"), Expr::eq_str("sex", "F")]),
            Expr::Not(Box::new(Expr::var("warfarin_last_four_months"))),
        ]);
        assert!(predicate.evaluate(&ctx).unwrap());
    }

    #[test]
    fn missing_values_never_satisfy_comparisons() {
        let ctx = ctx();
        let gt = Expr::Gt("warfarin_last_four_months".to_string(), Literal::Int(0));
        assert!(!gt.evaluate(&ctx).unwrap());
        let eq = Expr::eq_str("warfarin_last_four_months", "x");
        assert!(!eq.evaluate(&ctx).unwrap());
    }

    #[test]
    fn membership_test_matches_any_listed_value() {
        let ctx = ctx();
        let member = Expr::In(
            "sex".to_string(),
            vec![Literal::Str("M".to_string()), Literal::Str("F".to_string())],
        );
        assert!(member.evaluate(&ctx).unwrap());
    }

    #[test]
    fn undefined_variable_is_fatal() {
        let ctx = ctx();
        let result = Expr::var("ethnicity").evaluate(&ctx);
        assert!(matches!(
            result,
            Err(StudyDefError::UndefinedVariable { name, .. }) if name == "ethnicity"
        ));
    }

    #[test]
    fn ordered_comparison_of_a_date_is_fatal() {
        let ctx = ctx();
        let result = Expr::Gt("af".to_string(), Literal::Int(0)).evaluate(&ctx);
        assert!(matches!(
            result,
            Err(StudyDefError::NonNumericComparison { name }) if name == "af"
        ));
    }

    #[test]
    fn required_variables_collects_every_reference() {
        let predicate = Expr::And(vec![
            Expr::var("registration_history"),
            Expr::var("af"),
            Expr::GtEq("age".to_string(), Literal::Int(18)),
            Expr::Not(Box::new(Expr::Or(vec![
                Expr::var("lmwh_last_four_months"),
                Expr::var("doac_last_four_months"),
            ]))),
        ]);
        let names = predicate.required_variables();
        assert_eq!(names.len(), 5);
        assert!(names.contains("registration_history"));
        assert!(names.contains("doac_last_four_months"));
    }
}
