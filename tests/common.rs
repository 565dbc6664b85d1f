//! Common test utilities for building step data and process definitions.
use keisan::prelude::*;
use serde_json::{Value, json};

/// Builds a step record from `(key, value)` pairs.
#[allow(dead_code)]
pub fn record(step_order: u32, fields: &[(&str, Value)]) -> StepRecord {
    StepRecord::new(
        step_order,
        fields
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}

/// The step data used by the reference scenarios:
///
/// * Step 1: `price = 100`, `quantity = 5`
/// * Step 2: `discount = 10`, `tax_rate = 0.15`
#[allow(dead_code)]
pub fn step_data() -> Vec<StepRecord> {
    vec![
        record(1, &[("price", json!(100)), ("quantity", json!(5))]),
        record(2, &[("discount", json!(10)), ("tax_rate", json!(0.15))]),
    ]
}

/// A three-step order process:
///
/// * Step 1 "Quote": inputs `price` (required) and `quantity` (required),
///   calculated `subtotal = price * quantity`
/// * Step 2 "Adjustments": inputs `discount` and `tax_rate`,
///   calculated `taxed = (subtotal - discount) * (1 + tax_rate)`
/// * Step 3 "Approval": input `approved_by`, calculated `per_unit = taxed / quantity`
#[allow(dead_code)]
pub fn order_process(mode: ExecutionMode, allow_rollback: bool) -> ProcessDefinition {
    ProcessDefinition {
        name: "Order approval".to_string(),
        mode,
        allow_rollback,
        steps: vec![
            StepDefinition {
                order: 1,
                name: "Quote".to_string(),
                fields: vec![
                    FieldDefinition::input("price", true),
                    FieldDefinition::input("quantity", true),
                    FieldDefinition::calculated("subtotal", "[Step1.price] * [Step1.quantity]"),
                ],
            },
            StepDefinition {
                order: 2,
                name: "Adjustments".to_string(),
                fields: vec![
                    FieldDefinition::input("discount", false),
                    FieldDefinition::input("tax_rate", false),
                    FieldDefinition::calculated(
                        "taxed",
                        "([Step1.subtotal] - [Step2.discount]) * (1 + [Step2.tax_rate])",
                    ),
                ],
            },
            StepDefinition {
                order: 3,
                name: "Approval".to_string(),
                fields: vec![
                    FieldDefinition::input("approved_by", true),
                    FieldDefinition::calculated("per_unit", "[Step2.taxed] / [Step1.quantity]"),
                ],
            },
        ],
    }
}

/// Converts `(key, value)` pairs into the data map taken by `complete_step`.
#[allow(dead_code)]
pub fn data(fields: &[(&str, Value)]) -> ahash::AHashMap<String, Value> {
    fields
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}
