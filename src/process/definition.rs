use crate::calculator::{
    CalculationResult, Calculator, DEFAULT_DECIMALS, format_calculated_value,
};
use crate::data::{StepRecord, find_record};
use crate::error::{DefinitionError, FormulaError, ProcessError};
use crate::parser::{self, ParseLimits};
use crate::reference::{extract_references, scan_references};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// How the steps of a process may be completed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Steps are completed one after another in `order`.
    #[default]
    Sequential,
    /// Steps may be completed in any order.
    Independent,
}

/// The complete definition of a multi-step process.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ProcessDefinition {
    pub name: String,
    #[serde(default)]
    pub mode: ExecutionMode,
    /// Whether a running instance may return to an earlier step.
    #[serde(default)]
    pub allow_rollback: bool,
    pub steps: Vec<StepDefinition>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepDefinition {
    /// Position of the step, starting at 1. Formulas refer to it as `Step<order>`.
    pub order: u32,
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldDefinition {
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

fn default_decimals() -> usize {
    DEFAULT_DECIMALS
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    /// A value entered by the user.
    Input {
        #[serde(default)]
        required: bool,
    },
    /// A value derived from a formula over other fields.
    Calculated {
        formula: String,
        #[serde(default = "default_decimals")]
        decimals: usize,
    },
}

impl FieldDefinition {
    pub fn input(key: &str, required: bool) -> Self {
        Self {
            key: key.to_string(),
            label: key.to_string(),
            kind: FieldKind::Input { required },
        }
    }

    pub fn calculated(key: &str, formula: &str) -> Self {
        Self {
            key: key.to_string(),
            label: key.to_string(),
            kind: FieldKind::Calculated {
                formula: formula.to_string(),
                decimals: DEFAULT_DECIMALS,
            },
        }
    }

    pub fn formula(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Calculated { formula, .. } => Some(formula),
            FieldKind::Input { .. } => None,
        }
    }
}

/// A calculated field of a step, evaluated against an instance's data.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculatedField {
    pub step_order: u32,
    pub key: String,
    pub label: String,
    pub result: CalculationResult,
    /// The value formatted with the field's decimals, if there is one.
    pub display: Option<String>,
}

impl StepDefinition {
    pub fn field(&self, key: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.key == key)
    }

    pub fn calculated_fields(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Calculated { .. }))
    }

    /// `true` when `key` is a calculated field declared after `other`.
    fn is_calculated_after(&self, key: &str, other: &str) -> bool {
        let index = |k: &str| self.fields.iter().position(|f| f.key == k);
        match (index(key), index(other)) {
            (Some(a), Some(b)) => a > b && self.fields[a].formula().is_some(),
            _ => false,
        }
    }
}

impl ProcessDefinition {
    pub fn step(&self, order: u32) -> Option<&StepDefinition> {
        self.steps.iter().find(|s| s.order == order)
    }

    /// Step orders in ascending order.
    pub fn step_orders(&self) -> Vec<u32> {
        self.steps.iter().map(|s| s.order).sorted().collect()
    }

    /// Checks that the definition is internally consistent and that every
    /// calculated field's formula is well formed and refers to real fields.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        self.validate_with(&Calculator::default())
    }

    /// Like [`validate`](Self::validate), but checks formulas against the
    /// limits of the calculator that will evaluate them.
    pub fn validate_with(&self, calculator: &Calculator) -> Result<(), DefinitionError> {
        for step in &self.steps {
            if step.order == 0 {
                return Err(DefinitionError::InvalidStepOrder {
                    step_name: step.name.clone(),
                });
            }
        }
        if let Some(order) = self.steps.iter().map(|s| s.order).duplicates().next() {
            return Err(DefinitionError::DuplicateStepOrder(order));
        }

        for step in &self.steps {
            if let Some(key) = step.fields.iter().map(|f| f.key.as_str()).duplicates().next() {
                return Err(DefinitionError::DuplicateFieldKey {
                    step_order: step.order,
                    field_key: key.to_string(),
                });
            }
            for field in step.calculated_fields() {
                self.validate_formula(step, field, calculator.limits())?;
            }
        }
        Ok(())
    }

    fn validate_formula(
        &self,
        step: &StepDefinition,
        field: &FieldDefinition,
        limits: ParseLimits,
    ) -> Result<(), DefinitionError> {
        let formula = field.formula().unwrap_or_default();
        let invalid = |source: FormulaError| DefinitionError::InvalidFormula {
            step_order: step.order,
            field_key: field.key.clone(),
            source,
        };

        if formula.trim().is_empty() {
            return Err(invalid(FormulaError::EmptyFormula));
        }
        let extracted = extract_references(formula, &[]);
        parser::parse_with_limits(&extracted.expression, limits)
            .map_err(|e| invalid(e.map_position(|p| extracted.source_position(p))))?;

        for (source, cell) in scan_references(formula) {
            let unknown = || DefinitionError::UnknownReference {
                step_order: step.order,
                field_key: field.key.clone(),
                reference: source.clone(),
            };
            let cell = cell.ok_or_else(unknown)?;
            let target = self.step(cell.step_order).ok_or_else(unknown)?;
            if target.field(&cell.field_key).is_none() {
                return Err(unknown());
            }
            if cell.step_order == step.order && cell.field_key == field.key {
                return Err(DefinitionError::SelfReference {
                    step_order: step.order,
                    field_key: field.key.clone(),
                });
            }
            if self.mode == ExecutionMode::Sequential && cell.step_order > step.order {
                return Err(DefinitionError::ForwardReference {
                    step_order: step.order,
                    field_key: field.key.clone(),
                    reference: source,
                });
            }
            if cell.step_order == step.order && step.is_calculated_after(&cell.field_key, &field.key) {
                return Err(DefinitionError::LaterFieldReference {
                    step_order: step.order,
                    field_key: field.key.clone(),
                    reference: source,
                });
            }
        }
        Ok(())
    }

    /// Evaluates every calculated field of a step with the default calculator.
    pub fn calculate_step(
        &self,
        order: u32,
        records: &[StepRecord],
    ) -> Result<Vec<CalculatedField>, ProcessError> {
        self.calculate_step_with(&Calculator::default(), order, records)
    }

    /// Evaluates every calculated field of a step, in field order.
    ///
    /// Calculated fields of the other recorded steps are evaluated first, in
    /// step order, so formulas can use values calculated in earlier steps.
    /// Each successfully calculated value is made available to the fields
    /// after it, so a step can also build totals out of its own subtotals.
    /// `records` is left untouched; calculated values already stored in it
    /// are recomputed.
    pub fn calculate_step_with(
        &self,
        calculator: &Calculator,
        order: u32,
        records: &[StepRecord],
    ) -> Result<Vec<CalculatedField>, ProcessError> {
        let step = self.step(order).ok_or(ProcessError::UnknownStep(order))?;

        let mut working = records.to_vec();
        let prerequisites: Vec<&StepDefinition> = self
            .steps
            .iter()
            .filter(|s| s.order != order && find_record(&working, s.order).is_some())
            .filter(|s| self.mode == ExecutionMode::Independent || s.order < order)
            .sorted_by_key(|s| s.order)
            .collect();
        for prior in prerequisites {
            Self::apply_calculations(calculator, prior, &mut working);
        }

        Ok(Self::apply_calculations(calculator, step, &mut working))
    }

    /// Calculates the fields of `step` and stores each value in its record.
    fn apply_calculations(
        calculator: &Calculator,
        step: &StepDefinition,
        working: &mut Vec<StepRecord>,
    ) -> Vec<CalculatedField> {
        let order = step.order;
        if find_record(working, order).is_none() {
            working.push(StepRecord::new(order, Default::default()));
        }

        let mut calculated = Vec::new();
        for field in &step.fields {
            let FieldKind::Calculated { formula, decimals } = &field.kind else {
                continue;
            };
            let result = calculator.calculate(formula, working);
            let shown = result
                .value
                .map(|v| format_calculated_value(v, *decimals));

            if let Some(record) = working.iter_mut().find(|r| r.step_order == order) {
                record.store_calculated(&field.key, result.value);
            }
            debug!(step = order, field = %field.key, ?shown, "calculated field");

            calculated.push(CalculatedField {
                step_order: order,
                key: field.key.clone(),
                label: field.label.clone(),
                result,
                display: shown,
            });
        }
        calculated
    }
}
