//! Tests for the formula calculation entry points.
mod common;
use common::*;
use keisan::prelude::*;
use serde_json::json;

#[test]
fn test_multiplication_of_references() {
    let result = calculate_field_value("[Step1.price] * [Step1.quantity]", &step_data());
    assert_eq!(result.value, Some(500.0));
    assert!(result.error.is_none());
    assert!(result.missing_refs.is_empty());
}

#[test]
fn test_references_across_steps() {
    let result = calculate_field_value(
        "([Step1.price] * [Step1.quantity]) - [Step2.discount]",
        &step_data(),
    );
    assert_eq!(result.value, Some(490.0));
    assert!(result.error.is_none());
}

#[test]
fn test_tax_calculation() {
    let result = calculate_field_value(
        "([Step1.price] * [Step1.quantity]) * (1 + [Step2.tax_rate])",
        &step_data(),
    );
    assert_eq!(result.value, Some(575.0));
    assert!(result.error.is_none());
}

#[test]
fn test_missing_field_defaults_to_zero() {
    let result = calculate_field_value("[Step3.missing_field]", &step_data());
    assert_eq!(result.value, Some(0.0));
    assert!(result.error.is_none());
    assert_eq!(result.missing_refs, vec!["[Step3.missing_field]"]);
}

#[test]
fn test_division() {
    let result = calculate_field_value("[Step1.price] / [Step1.quantity]", &step_data());
    assert_eq!(result.value, Some(20.0));
}

#[test]
fn test_format_calculated_value() {
    assert_eq!(format_calculated_value(123.456789, 2), "123.46");
}

#[test]
fn test_empty_formula() {
    for formula in ["", "   ", "\t\n"] {
        let result = calculate_field_value(formula, &step_data());
        assert_eq!(result.value, None);
        assert_eq!(result.error, Some(FormulaError::EmptyFormula));
        assert_eq!(result.error_message().as_deref(), Some("Empty formula"));
        assert!(result.missing_refs.is_empty());
    }
}

#[test]
fn test_repeated_calls_are_identical() {
    let records = step_data();
    let formula = "[Step1.price] * [Step9.x] + [Step2.tax_rate] / 3";
    let first = calculate_field_value(formula, &records);
    for _ in 0..10 {
        assert_eq!(calculate_field_value(formula, &records), first);
    }
}

#[test]
fn test_missing_references_are_counted_as_zero() {
    let result = calculate_field_value(
        "[Step1.price] + [Step1.nope] * 2 + [Step7.price]",
        &step_data(),
    );
    assert_eq!(result.value, Some(100.0));
    assert_eq!(result.missing_refs, vec!["[Step1.nope]", "[Step7.price]"]);
}

#[test]
fn test_repeated_missing_reference_is_reported_each_time() {
    let result = calculate_field_value("[Step4.a] + [Step4.a]", &step_data());
    assert_eq!(result.value, Some(0.0));
    assert_eq!(result.missing_refs, vec!["[Step4.a]", "[Step4.a]"]);
}

#[test]
fn test_division_by_zero_fails() {
    let records = vec![record(1, &[("a", json!(10)), ("b", json!(0))])];
    let result = calculate_field_value("[Step1.a] / [Step1.b]", &records);
    assert_eq!(result.value, None);
    assert!(matches!(
        result.error,
        Some(FormulaError::NonFiniteResult(v)) if v.is_infinite()
    ));

    let result = calculate_field_value("[Step1.b] / [Step1.b]", &records);
    assert_eq!(result.value, None);
    assert!(result.error.is_some());
}

#[test]
fn test_division_by_missing_reference_fails_but_reports_it() {
    let result = calculate_field_value("[Step1.price] / [Step5.count]", &step_data());
    assert_eq!(result.value, None);
    assert!(result.error.is_some());
    assert_eq!(result.missing_refs, vec!["[Step5.count]"]);
}

#[test]
fn test_wrapped_and_textual_values() {
    let records = vec![record(
        1,
        &[
            ("option", json!({"value": "12", "label": "Twelve"})),
            ("weight", json!("2.5 kg")),
            ("flag", json!(true)),
        ],
    )];
    let result = calculate_field_value("[Step1.option] * [Step1.weight]", &records);
    assert_eq!(result.value, Some(30.0));

    let result = calculate_field_value("[Step1.option] + [Step1.flag]", &records);
    assert_eq!(result.value, Some(12.0));
    assert_eq!(result.missing_refs, vec!["[Step1.flag]"]);
}

#[test]
fn test_explanation_annotates_references() {
    let result = calculate_field_value(
        "([Step1.price] * [Step1.quantity]) - [Step2.discount]",
        &step_data(),
    );
    assert_eq!(
        result.explanation.as_deref(),
        Some("[Step1.price] (was 100) * [Step1.quantity] (was 5) - [Step2.discount] (was 10)")
    );
}

#[test]
fn test_malformed_reference_fails_safely() {
    for formula in ["[Step.price] * 2", "[StepA.price]", "[Step1.price * 2"] {
        let result = calculate_field_value(formula, &step_data());
        assert_eq!(result.value, None, "formula {:?} should not produce a value", formula);
        assert!(matches!(
            result.error,
            Some(FormulaError::UnsafeCharacters { character: '[', .. })
        ));
    }
}

#[test]
fn test_calculator_respects_configured_limits() {
    let calculator = Calculator::builder().with_max_depth(3).build();
    let result = calculator.calculate("((((1))))", &[]);
    assert!(matches!(result.error, Some(FormulaError::TooComplex(_))));

    let result = calculator.calculate("((1))", &[]);
    assert_eq!(result.value, Some(1.0));
}

#[test]
fn test_long_operator_chains_are_refused_not_crashed() {
    let longest = format!("{}1", "1+".repeat(2047));
    assert_eq!(longest.len(), 4095);
    let result = calculate_field_value(&longest, &[]);
    assert_eq!(result.value, None);
    assert!(matches!(result.error, Some(FormulaError::TooComplex(_))));

    let product = format!("{}2", "2*".repeat(2047));
    let result = calculate_field_value(&product, &[]);
    assert!(matches!(result.error, Some(FormulaError::TooComplex(_))));

    let chain = format!("{}1", "1+".repeat(199));
    let result = calculate_field_value(&chain, &[]);
    assert_eq!(result.value, Some(200.0));

    let calculator = Calculator::builder().with_max_nodes(4096).build();
    let result = calculator.calculate(&chain, &[]);
    assert_eq!(result.value, Some(200.0));
}

#[test]
fn test_error_positions_point_into_the_written_formula() {
    let result = calculate_field_value("[Step1.price] + $", &step_data());
    assert_eq!(
        result.error,
        Some(FormulaError::UnsafeCharacters {
            character: '$',
            position: 16
        })
    );

    let result = calculate_field_value("[Step1.price] * [Step1.quantity] 2", &step_data());
    assert!(matches!(
        result.error,
        Some(FormulaError::Syntax { position: 33, .. })
    ));
}
