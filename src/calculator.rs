use crate::data::StepRecord;
use crate::error::FormulaError;
use crate::evaluator;
use crate::parser::ParseLimits;
use crate::reference::extract_references;
use crate::trace::TraceFormatter;
use itertools::Itertools;
use tracing::{debug, warn};

/// Decimal places used when no other precision is configured.
pub const DEFAULT_DECIMALS: usize = 2;

/// Fixed-point formatting never produces more fractional digits than this.
pub const MAX_DECIMALS: usize = 100;

/// The outcome of calculating a formula against a process instance's step data.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculationResult {
    /// The finite result. `None` when the formula could not be calculated.
    pub value: Option<f64>,
    /// References that could not be resolved and were counted as `0`, in the
    /// order they appear in the formula.
    pub missing_refs: Vec<String>,
    /// Why there is no value. Always `None` when `value` is present.
    pub error: Option<FormulaError>,
    /// The evaluated expression with every reference annotated with its value.
    pub explanation: Option<String>,
}

impl CalculationResult {
    fn failure(error: FormulaError, missing_refs: Vec<String>) -> Self {
        Self {
            value: None,
            missing_refs,
            error: Some(error),
            explanation: None,
        }
    }

    /// `true` when a value was produced, even if some references were missing.
    pub fn is_ok(&self) -> bool {
        self.value.is_some()
    }

    pub fn has_missing_refs(&self) -> bool {
        !self.missing_refs.is_empty()
    }

    /// The human-readable failure reason, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Calculates formulas for calculated fields.
///
/// A `Calculator` holds no per-calculation state and can be shared freely
/// between threads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calculator {
    decimals: usize,
    limits: ParseLimits,
}

impl Default for Calculator {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Configures a [`Calculator`].
#[derive(Debug, Clone)]
pub struct CalculatorBuilder {
    decimals: usize,
    limits: ParseLimits,
}

impl CalculatorBuilder {
    pub fn new() -> Self {
        Self {
            decimals: DEFAULT_DECIMALS,
            limits: ParseLimits::default(),
        }
    }

    /// Decimal places used by [`Calculator::format`].
    pub fn with_decimals(mut self, decimals: usize) -> Self {
        self.decimals = decimals.min(MAX_DECIMALS);
        self
    }

    /// Longest formula, in characters after reference substitution, that will be evaluated.
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.limits.max_length = max_length;
        self
    }

    /// Deepest nesting of parentheses and signs that will be evaluated.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.limits.max_depth = max_depth;
        self
    }

    /// Largest number of operators and operands a formula may contain.
    pub fn with_max_nodes(mut self, max_nodes: usize) -> Self {
        self.limits.max_nodes = max_nodes;
        self
    }

    pub fn build(self) -> Calculator {
        Calculator {
            decimals: self.decimals,
            limits: self.limits,
        }
    }
}

impl Default for CalculatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Calculator {
    pub fn builder() -> CalculatorBuilder {
        CalculatorBuilder::new()
    }

    pub fn decimals(&self) -> usize {
        self.decimals
    }

    pub fn limits(&self) -> ParseLimits {
        self.limits
    }

    /// Calculates `formula` against the captured data of a process instance.
    ///
    /// Never fails outright: a blank formula, unsafe characters, a syntax
    /// error, or a non-finite result all produce a result without a value.
    /// Missing references are reported but do not prevent a value.
    pub fn calculate(&self, formula: &str, records: &[StepRecord]) -> CalculationResult {
        if formula.trim().is_empty() {
            return CalculationResult::failure(FormulaError::EmptyFormula, Vec::new());
        }

        let extracted = extract_references(formula, records);
        if !extracted.missing_refs.is_empty() {
            warn!(
                formula,
                missing = %extracted.missing_refs.iter().join(", "),
                "formula references values that are not available, using 0"
            );
        }

        let labels = extracted.labels();
        match evaluator::evaluate_traced(
            &extracted.expression,
            &extracted.variables,
            Some(&labels),
            self.limits,
        ) {
            Ok(evaluation) => {
                debug!(formula, value = evaluation.value, "calculated field value");
                CalculationResult {
                    value: Some(evaluation.value),
                    missing_refs: extracted.missing_refs,
                    error: None,
                    explanation: Some(TraceFormatter::format_trace(&evaluation.trace)),
                }
            }
            Err(error) => {
                let error = error.map_position(|p| extracted.source_position(p));
                warn!(formula, %error, "formula could not be calculated");
                CalculationResult::failure(error, extracted.missing_refs)
            }
        }
    }

    /// Formats a value with this calculator's decimal places.
    pub fn format(&self, value: f64) -> String {
        format_calculated_value(value, self.decimals)
    }
}

/// Calculates `formula` against `records` with the default [`Calculator`].
pub fn calculate_field_value(formula: &str, records: &[StepRecord]) -> CalculationResult {
    Calculator::default().calculate(formula, records)
}

/// Formats a value as a fixed-point decimal string, e.g. `123.456789` with
/// 2 decimals becomes `"123.46"`.
///
/// Negative zero prints as `0`, and non-finite values print as `NaN`,
/// `Infinity` or `-Infinity`. `decimals` is capped at [`MAX_DECIMALS`].
pub fn format_calculated_value(value: f64, decimals: usize) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let value = if value == 0.0 { 0.0 } else { value };
    format!("{:.*}", decimals.min(MAX_DECIMALS), value)
}
