//! Cell reference scanning and substitution.
//!
//! A formula refers to data captured in earlier steps with tokens like
//! `[Step1.price]`. Before evaluation every such token is replaced by a
//! generated variable name and the value it resolves to is recorded:
//!
//! ```text
//! [Step1.price] * [Step1.quantity]   ->   __ref0 * __ref1
//! ```

use crate::data::{FieldValue, StepRecord, find_record};
use ahash::AHashMap;
use regex::{Captures, Regex};
use std::fmt;
use std::sync::OnceLock;

/// Matches `[Step<digits>.<anything but ']'>]`.
pub fn reference_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[Step(\d+)\.([^\]]+)\]").unwrap())
}

/// A parsed `[Step<N>.<field>]` token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellReference {
    pub step_order: u32,
    pub field_key: String,
}

impl CellReference {
    pub fn new(step_order: u32, field_key: impl Into<String>) -> Self {
        Self {
            step_order,
            field_key: field_key.into(),
        }
    }
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[Step{}.{}]", self.step_order, self.field_key)
    }
}

/// Lists the references of a formula in order of appearance, together with
/// their source text. Tokens whose step index does not fit a `u32` are
/// returned with `None`, since no step can have that order.
pub fn scan_references(formula: &str) -> Vec<(String, Option<CellReference>)> {
    reference_re()
        .captures_iter(formula)
        .map(|caps| (caps[0].to_string(), parse_captures(&caps)))
        .collect()
}

fn parse_captures(caps: &Captures) -> Option<CellReference> {
    let step_order = caps[1].parse::<u32>().ok()?;
    Some(CellReference::new(step_order, &caps[2]))
}

/// One reference occurrence after resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedReference {
    /// The original token, e.g. `[Step1.price]`.
    pub source: String,
    /// The variable that replaced it in the expression.
    pub variable: String,
    pub value: FieldValue,
    /// Character offset of the token in the formula.
    pub position: usize,
}

impl ResolvedReference {
    pub fn is_missing(&self) -> bool {
        matches!(self.value, FieldValue::Unresolvable)
    }
}

/// A formula with every reference replaced by a variable.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedFormula {
    /// The rewritten, purely arithmetic expression.
    pub expression: String,
    /// The value of each generated variable. Missing references are `0`.
    pub variables: AHashMap<String, f64>,
    /// Source text of every reference that could not be resolved, in order.
    pub missing_refs: Vec<String>,
    pub references: Vec<ResolvedReference>,
}

impl ExtractedFormula {
    /// Maps each generated variable back to the token it replaced.
    pub fn labels(&self) -> AHashMap<String, String> {
        self.references
            .iter()
            .map(|r| (r.variable.clone(), r.source.clone()))
            .collect()
    }

    /// Translates a character offset in `expression` into the matching offset
    /// in the formula it was extracted from. Offsets inside a generated
    /// variable map to the start of the reference it replaced.
    pub fn source_position(&self, position: usize) -> usize {
        let mut source_offset = 0;
        let mut expression_offset = 0;
        for reference in &self.references {
            let start = expression_offset + (reference.position - source_offset);
            if position < start {
                break;
            }
            let variable_len = reference.variable.chars().count();
            if position < start + variable_len {
                return reference.position;
            }
            source_offset = reference.position + reference.source.chars().count();
            expression_offset = start + variable_len;
        }
        source_offset + (position - expression_offset)
    }
}

/// Picks a variable prefix that does not occur anywhere in `formula`, so
/// generated names can never collide with text the author wrote.
fn variable_prefix(formula: &str) -> String {
    let mut prefix = String::from("__ref");
    while formula.contains(&prefix) {
        prefix.insert(0, '_');
    }
    prefix
}

/// Replaces every reference in `formula` with a fresh variable and resolves
/// it against `records`.
///
/// Each occurrence gets its own variable, even when the same token appears
/// twice. A reference to a step without a record, to an absent or null field,
/// or to a value that is not numeric is reported in `missing_refs` and
/// evaluates as `0`. Malformed tokens are left untouched.
pub fn extract_references(formula: &str, records: &[StepRecord]) -> ExtractedFormula {
    let prefix = variable_prefix(formula);
    let mut variables = AHashMap::new();
    let mut missing_refs = Vec::new();
    let mut references = Vec::new();

    let expression = reference_re()
        .replace_all(formula, |caps: &Captures| {
            let source = caps[0].to_string();
            let position = caps
                .get(0)
                .map_or(0, |m| formula[..m.start()].chars().count());
            let value = match parse_captures(caps) {
                Some(cell) => find_record(records, cell.step_order)
                    .map(|record| record.resolve_field(&cell.field_key))
                    .unwrap_or(FieldValue::Unresolvable),
                None => FieldValue::Unresolvable,
            };

            let variable = format!("{}{}", prefix, references.len());
            if value.as_number().is_none() {
                missing_refs.push(source.clone());
            }
            variables.insert(variable.clone(), value.as_number().unwrap_or(0.0));
            references.push(ResolvedReference {
                source,
                variable: variable.clone(),
                value,
                position,
            });
            variable
        })
        .into_owned();

    ExtractedFormula {
        expression,
        variables,
        missing_refs,
        references,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<StepRecord> {
        vec![StepRecord::new(
            1,
            [
                ("price".to_string(), json!(100)),
                ("note".to_string(), json!("n/a")),
            ]
            .into_iter()
            .collect(),
        )]
    }

    #[test]
    fn test_each_occurrence_gets_its_own_variable() {
        let extracted = extract_references("[Step1.price] + [Step1.price]", &records());
        assert_eq!(extracted.expression, "__ref0 + __ref1");
        assert_eq!(extracted.variables.get("__ref0"), Some(&100.0));
        assert_eq!(extracted.variables.get("__ref1"), Some(&100.0));
        assert!(extracted.missing_refs.is_empty());
    }

    #[test]
    fn test_missing_references_default_to_zero() {
        let extracted = extract_references(
            "[Step2.price] + [Step1.absent] + [Step1.note] + [Step2.price]",
            &records(),
        );
        assert_eq!(
            extracted.missing_refs,
            vec!["[Step2.price]", "[Step1.absent]", "[Step1.note]", "[Step2.price]"]
        );
        assert!(extracted.variables.values().all(|v| *v == 0.0));
    }

    #[test]
    fn test_prefix_avoids_collisions_with_author_text() {
        let extracted = extract_references("__ref0 + [Step1.price]", &records());
        assert_eq!(extracted.expression, "__ref0 + ___ref0");
        assert_eq!(extracted.variables.get("___ref0"), Some(&100.0));
        assert!(!extracted.variables.contains_key("__ref0"));
    }

    #[test]
    fn test_malformed_references_are_left_alone() {
        let extracted = extract_references("[Step.price] + [StepX.a] + [Step1.price", &records());
        assert_eq!(extracted.expression, "[Step.price] + [StepX.a] + [Step1.price");
        assert!(extracted.references.is_empty());
    }

    #[test]
    fn test_source_position_skips_substituted_references() {
        let formula = "[Step1.price] + $ * [Step2.rate] - é";
        let extracted = extract_references(formula, &records());
        assert_eq!(extracted.expression, "__ref0 + $ * __ref1 - é");
        assert_eq!(extracted.references[1].position, 20);

        assert_eq!(extracted.source_position(9), 16);
        assert_eq!(extracted.source_position(3), 0);
        assert_eq!(extracted.source_position(14), 20);
        let accent = formula.chars().position(|c| c == 'é').unwrap();
        assert_eq!(extracted.source_position(22), accent);

        let plain = extract_references("1 + $", &[]);
        assert_eq!(plain.source_position(4), 4);
    }

    #[test]
    fn test_overflowing_step_index_is_missing() {
        let extracted = extract_references("[Step99999999999.price]", &records());
        assert_eq!(extracted.missing_refs, vec!["[Step99999999999.price]"]);
        assert_eq!(extracted.expression, "__ref0");
    }

    #[test]
    fn test_scan_references() {
        let refs = scan_references("[Step1.a] * [Step12.b c]");
        assert_eq!(
            refs,
            vec![
                ("[Step1.a]".to_string(), Some(CellReference::new(1, "a"))),
                ("[Step12.b c]".to_string(), Some(CellReference::new(12, "b c"))),
            ]
        );
        assert_eq!(CellReference::new(3, "x").to_string(), "[Step3.x]");
    }
}
