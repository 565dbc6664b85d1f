//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and functions from the keisan crate.
//!
//! # Example
//!
//! ```rust
//! use keisan::prelude::*;
//!
//! let result = calculate_field_value("(2 + 3) * 4", &[]);
//! assert_eq!(result.value, Some(20.0));
//! ```

// Calculation
pub use crate::calculator::{
    CalculationResult, Calculator, CalculatorBuilder, calculate_field_value,
    format_calculated_value,
};
pub use crate::evaluator::{Evaluation, evaluate_expression};
pub use crate::reference::{CellReference, ExtractedFormula, extract_references};

// AST and trace types
pub use crate::ast::{EvaluationTrace, Expression};
pub use crate::trace::TraceFormatter;

// Data structures
pub use crate::data::{FieldValue, StepRecord};
pub use crate::process::{
    ExecutionMode, FieldDefinition, FieldKind, IntoProcess, ProcessDefinition, ProcessInstance,
    StepDefinition,
};

// Error types
pub use crate::error::{DefinitionError, FormulaError, ProcessError};
