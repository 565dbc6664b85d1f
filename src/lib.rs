//! # Keisan - Formula Evaluation for Calculated Fields
//!
//! **Keisan** evaluates the formulas behind *calculated fields* in multi-step
//! processes. A formula combines numbers, `+ - * /` and parentheses with cell
//! references of the form `[Step<N>.<field>]`, which name a field captured when
//! step `N` of a process instance was completed:
//!
//! ```text
//! ([Step1.price] * [Step1.quantity]) * (1 + [Step2.tax_rate])
//! ```
//!
//! ## Core Workflow
//!
//! 1.  **Extract**: every cell reference is replaced by a generated variable and
//!     resolved against the instance's step records. References that cannot be
//!     resolved count as `0` and are reported back.
//! 2.  **Parse**: the rewritten expression is checked against a character
//!     allow-list and parsed into an AST. Formulas are never executed as code.
//! 3.  **Evaluate**: the AST is interpreted with IEEE-754 arithmetic. Non-finite
//!     results such as a division by zero are failures, not values.
//!
//! On top of that, the [`process`] module models process definitions whose
//! fields may be calculated, validates their formulas up front, and tracks
//! running instances.
//!
//! ## Quick Start
//!
//! ```rust
//! use keisan::prelude::*;
//! use serde_json::json;
//!
//! let records = vec![
//!     StepRecord::new(1, [("price".to_string(), json!(100)), ("quantity".to_string(), json!(5))].into_iter().collect()),
//!     StepRecord::new(2, [("discount".to_string(), json!(10))].into_iter().collect()),
//! ];
//!
//! let result = calculate_field_value("([Step1.price] * [Step1.quantity]) - [Step2.discount]", &records);
//! assert_eq!(result.value, Some(490.0));
//! assert!(result.missing_refs.is_empty());
//! assert_eq!(format_calculated_value(result.value.unwrap(), 2), "490.00");
//!
//! let missing = calculate_field_value("[Step3.missing_field]", &records);
//! assert_eq!(missing.value, Some(0.0));
//! assert_eq!(missing.missing_refs, vec!["[Step3.missing_field]"]);
//! ```

pub mod ast;
pub mod calculator;
pub mod data;
pub mod error;
pub mod evaluator;
pub mod parser;
pub mod prelude;
pub mod process;
pub mod reference;
pub mod trace;
