use crate::ast::{EvaluationTrace, Expression};
use crate::error::FormulaError;
use ahash::AHashMap;

/// The core recursive engine for evaluating a single parsed formula.
pub(super) struct AstEngine<'a> {
    expression: &'a Expression,
    variables: &'a AHashMap<String, f64>,
    labels: Option<&'a AHashMap<String, String>>,
}

impl<'a> AstEngine<'a> {
    pub(super) fn new(
        expression: &'a Expression,
        variables: &'a AHashMap<String, f64>,
        labels: Option<&'a AHashMap<String, String>>,
    ) -> Self {
        Self {
            expression,
            variables,
            labels,
        }
    }

    /// Evaluates the AST and returns a trace of the execution.
    pub(super) fn evaluate(&self) -> Result<EvaluationTrace, FormulaError> {
        self.evaluate_recursive(self.expression)
    }

    fn evaluate_recursive(&self, expr: &Expression) -> Result<EvaluationTrace, FormulaError> {
        match expr {
            Expression::Sum(l, r) => self.eval_binary(l, r, "+", |a, b| a + b),
            Expression::Subtract(l, r) => self.eval_binary(l, r, "-", |a, b| a - b),
            Expression::Multiply(l, r) => self.eval_binary(l, r, "*", |a, b| a * b),
            Expression::Divide(l, r) => self.eval_binary(l, r, "/", |a, b| a / b),
            Expression::Negate(v) => {
                let child_trace = self.evaluate_recursive(v)?;
                let outcome = -child_trace.get_outcome();
                Ok(EvaluationTrace::UnaryOp {
                    op_symbol: "-",
                    child: Box::new(child_trace),
                    outcome,
                })
            }
            Expression::Literal(n) => Ok(EvaluationTrace::Leaf {
                source: n.to_string(),
                value: *n,
                is_input: false,
            }),
            Expression::Variable(name) => {
                let value = self
                    .variables
                    .get(name)
                    .copied()
                    .ok_or_else(|| FormulaError::UnknownVariable(name.clone()))?;
                let source = self
                    .labels
                    .and_then(|labels| labels.get(name))
                    .cloned()
                    .unwrap_or_else(|| name.clone());
                Ok(EvaluationTrace::Leaf {
                    source,
                    value,
                    is_input: true,
                })
            }
        }
    }

    fn eval_binary<F>(
        &self,
        l: &Expression,
        r: &Expression,
        op: &'static str,
        f: F,
    ) -> Result<EvaluationTrace, FormulaError>
    where
        F: Fn(f64, f64) -> f64,
    {
        let left_trace = self.evaluate_recursive(l)?;
        let right_trace = self.evaluate_recursive(r)?;
        let outcome = f(left_trace.get_outcome(), right_trace.get_outcome());
        Ok(EvaluationTrace::BinaryOp {
            op_symbol: op,
            left: Box::new(left_trace),
            right: Box::new(right_trace),
            outcome,
        })
    }
}
