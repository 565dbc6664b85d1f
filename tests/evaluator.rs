//! Tests for the safe expression evaluator and its input boundary.
mod common;
use ahash::AHashMap;
use common::*;
use keisan::prelude::*;
use serde_json::json;

fn vars(pairs: &[(&str, f64)]) -> AHashMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn test_operator_precedence_and_associativity() {
    let v = AHashMap::new();
    assert_eq!(evaluate_expression("2 + 3 * 4", &v), Ok(14.0));
    assert_eq!(evaluate_expression("(2 + 3) * 4", &v), Ok(20.0));
    assert_eq!(evaluate_expression("100 / 10 / 5", &v), Ok(2.0));
    assert_eq!(evaluate_expression("10 - 2 - 3", &v), Ok(5.0));
    assert_eq!(evaluate_expression("-(2 + 3) * 2", &v), Ok(-10.0));
    assert_eq!(evaluate_expression("1.5e2 + .5", &v), Ok(150.5));
}

#[test]
fn test_matches_manual_substitution() {
    let v = vars(&[("p", 19.99), ("q", 3.0), ("d", 0.1)]);
    let expected = (19.99 * 3.0) * (1.0 - 0.1);
    assert_eq!(evaluate_expression("(p * q) * (1 - d)", &v), Ok(expected));

    let records = vec![record(
        1,
        &[("p", json!(19.99)), ("q", json!(3)), ("d", json!(0.1))],
    )];
    let result = calculate_field_value("([Step1.p] * [Step1.q]) * (1 - [Step1.d])", &records);
    assert_eq!(result.value, Some(expected));
}

#[test]
fn test_code_injection_is_refused_before_evaluation() {
    let injections = [
        "[Step1.price]; process.exit()",
        "constructor.constructor('return this')()",
        "[Step1.price] + globalThis[\"x\"]",
        "1 && 1",
        "a = 5",
        "`${1}`",
        "1 % 2",
        "2 ^ 3",
        "1, 2",
    ];
    for formula in injections {
        let result = calculate_field_value(formula, &step_data());
        assert_eq!(result.value, None, "{:?} must not produce a value", formula);
        assert!(
            matches!(result.error, Some(FormulaError::UnsafeCharacters { .. })),
            "{:?} should be refused by the character check, got {:?}",
            formula,
            result.error
        );
    }
}

#[test]
fn test_word_characters_are_not_a_way_in() {
    // Identifiers pass the character check but only ever name generated variables.
    for formula in ["this", "Infinity", "NaN", "Math", "price"] {
        let result = calculate_field_value(formula, &step_data());
        assert_eq!(result.value, None);
        assert_eq!(
            result.error,
            Some(FormulaError::UnknownVariable(formula.to_string()))
        );
    }
}

#[test]
fn test_syntax_errors_are_failures() {
    for formula in ["(1 + 2", "1 +", "* 3", "2 ** 3", "1 2", "()", "3x"] {
        let result = calculate_field_value(formula, &[]);
        assert_eq!(result.value, None, "{:?} must not produce a value", formula);
        assert!(matches!(result.error, Some(FormulaError::Syntax { .. })));
    }
}

#[test]
fn test_non_finite_values_are_rejected() {
    let records = vec![record(1, &[("big", json!("Infinity")), ("zero", json!(0))])];
    let result = calculate_field_value("[Step1.big] - 1", &records);
    assert!(matches!(result.error, Some(FormulaError::NonFiniteResult(_))));
    assert!(result.missing_refs.is_empty());

    let result = calculate_field_value("1e308 * 10", &records);
    assert!(matches!(result.error, Some(FormulaError::NonFiniteResult(_))));

    let result = calculate_field_value("-1 / [Step1.zero]", &records);
    assert!(matches!(
        result.error,
        Some(FormulaError::NonFiniteResult(v)) if v == f64::NEG_INFINITY
    ));
}
