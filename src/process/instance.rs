use super::conversion::IntoProcess;
use super::definition::{CalculatedField, ExecutionMode, FieldKind, ProcessDefinition};
use crate::calculator::Calculator;
use crate::data::StepRecord;
use crate::error::{InstanceSetupError, ProcessError};
use ahash::AHashMap;
use serde_json::Value;
use tracing::info;

/// A running process: a definition plus the steps completed so far.
#[derive(Debug, Clone)]
pub struct ProcessInstance {
    definition: ProcessDefinition,
    records: Vec<StepRecord>,
    calculator: Calculator,
}

impl ProcessInstance {
    /// Starts a new instance. The definition is validated first.
    pub fn new(definition: ProcessDefinition) -> Result<Self, ProcessError> {
        Self::with_definition_and_calculator(definition, Calculator::default())
    }

    /// Starts a new instance that evaluates formulas with `calculator`. The
    /// definition is validated against that calculator's limits.
    pub fn with_definition_and_calculator(
        definition: ProcessDefinition,
        calculator: Calculator,
    ) -> Result<Self, ProcessError> {
        definition.validate_with(&calculator)?;
        Ok(Self {
            definition,
            records: Vec::new(),
            calculator,
        })
    }

    /// Starts a new instance from any format that converts into a definition.
    pub fn from_custom<T: IntoProcess>(custom: T) -> Result<Self, InstanceSetupError> {
        let definition = custom.into_process()?;
        Ok(Self::new(definition)?)
    }

    /// Switches to another calculator, re-validating the definition against it.
    pub fn with_calculator(mut self, calculator: Calculator) -> Result<Self, ProcessError> {
        self.definition.validate_with(&calculator)?;
        self.calculator = calculator;
        Ok(self)
    }

    pub fn definition(&self) -> &ProcessDefinition {
        &self.definition
    }

    /// Completed step records, ordered by step.
    pub fn records(&self) -> &[StepRecord] {
        &self.records
    }

    pub fn is_step_completed(&self, order: u32) -> bool {
        self.records.iter().any(|r| r.step_order == order)
    }

    /// The first step, by order, that has not been completed yet.
    pub fn current_step(&self) -> Option<u32> {
        self.definition
            .step_orders()
            .into_iter()
            .find(|order| !self.is_step_completed(*order))
    }

    pub fn is_complete(&self) -> bool {
        self.current_step().is_none()
    }

    /// Records the data entered for a step, together with the values of its
    /// calculated fields.
    ///
    /// Completing a step that is already completed replaces its data. In
    /// sequential processes any other step must be the current one.
    pub fn complete_step(
        &mut self,
        order: u32,
        data: AHashMap<String, Value>,
    ) -> Result<(), ProcessError> {
        let step = self
            .definition
            .step(order)
            .ok_or(ProcessError::UnknownStep(order))?;

        let is_edit = self.is_step_completed(order);
        if self.definition.mode == ExecutionMode::Sequential && !is_edit {
            if let Some(expected) = self.current_step() {
                if expected != order {
                    return Err(ProcessError::OutOfOrder {
                        attempted: order,
                        expected,
                    });
                }
            }
        }

        for field in &step.fields {
            if let FieldKind::Input { required: true } = field.kind {
                let present = match data.get(&field.key) {
                    None | Some(Value::Null) => false,
                    Some(Value::String(s)) => !s.trim().is_empty(),
                    Some(_) => true,
                };
                if !present {
                    return Err(ProcessError::MissingRequiredField {
                        step_order: order,
                        field_key: field.key.clone(),
                    });
                }
            }
        }

        self.records.retain(|r| r.step_order != order);
        self.records.push(StepRecord::new(order, data));
        self.records.sort_by_key(|r| r.step_order);

        let calculated =
            self.definition
                .calculate_step_with(&self.calculator, order, &self.records)?;
        if let Some(record) = self.records.iter_mut().find(|r| r.step_order == order) {
            for field in &calculated {
                record.store_calculated(&field.key, field.result.value);
            }
        }

        info!(
            process = %self.definition.name,
            step = order,
            edit = is_edit,
            "step completed"
        );
        Ok(())
    }

    /// Returns to a completed step, discarding every step recorded after it.
    /// The target step keeps its data so it can be edited.
    pub fn rollback_to(&mut self, order: u32) -> Result<(), ProcessError> {
        if !self.definition.allow_rollback {
            return Err(ProcessError::RollbackNotAllowed);
        }
        if self.definition.step(order).is_none() {
            return Err(ProcessError::UnknownStep(order));
        }
        if !self.is_step_completed(order) {
            return Err(ProcessError::RollbackTargetNotCompleted(order));
        }

        let before = self.records.len();
        self.records.retain(|r| r.step_order <= order);
        info!(
            process = %self.definition.name,
            step = order,
            discarded = before - self.records.len(),
            "rolled back"
        );
        Ok(())
    }

    /// Evaluates the calculated fields of a step against the data recorded so far.
    pub fn calculate_step(&self, order: u32) -> Result<Vec<CalculatedField>, ProcessError> {
        self.definition
            .calculate_step_with(&self.calculator, order, &self.records)
    }
}
