use crate::ast::EvaluationTrace;
use crate::error::FormulaError;
use crate::parser::{self, ParseLimits};
use ahash::AHashMap;
use tracing::debug;

mod engine;

use engine::AstEngine;

/// A successful evaluation: the finite result and how it was reached.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub value: f64,
    pub trace: EvaluationTrace,
}

/// Evaluates a purely arithmetic expression against a set of named inputs.
///
/// The expression may only contain digits, `+ - * /`, parentheses, `.`,
/// whitespace and identifiers naming entries of `variables`. It is parsed into
/// an AST and interpreted; nothing in the input is ever executed as code.
///
/// # Errors
///
/// * `FormulaError::UnsafeCharacters` if a character falls outside the allow-list.
/// * `FormulaError::Syntax` if the expression is not well formed.
/// * `FormulaError::UnknownVariable` if an identifier has no value.
/// * `FormulaError::NonFiniteResult` for results such as division by zero.
pub fn evaluate_expression(
    expression: &str,
    variables: &AHashMap<String, f64>,
) -> Result<f64, FormulaError> {
    evaluate_traced(expression, variables, None, ParseLimits::default()).map(|e| e.value)
}

/// Like [`evaluate_expression`], but returns the evaluation trace as well.
/// `labels` maps variable names to the text shown for them in the trace.
pub fn evaluate_traced(
    expression: &str,
    variables: &AHashMap<String, f64>,
    labels: Option<&AHashMap<String, String>>,
    limits: ParseLimits,
) -> Result<Evaluation, FormulaError> {
    let ast = parser::parse_with_limits(expression, limits)?;
    let trace = AstEngine::new(&ast, variables, labels).evaluate()?;
    let value = trace.get_outcome();

    if !value.is_finite() {
        debug!(expression, value, "expression produced a non-finite result");
        return Err(FormulaError::NonFiniteResult(value));
    }

    debug!(expression, value, "expression evaluated");
    Ok(Evaluation { value, trace })
}
