use thiserror::Error;

/// Errors that can occur while evaluating a single formula.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FormulaError {
    #[error("Empty formula")]
    EmptyFormula,

    #[error("Formula contains unsafe character '{character}' at position {position}")]
    UnsafeCharacters { character: char, position: usize },

    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    #[error("Unknown identifier '{0}' in formula")]
    UnknownVariable(String),

    #[error("Calculation did not produce a finite number (got {0})")]
    NonFiniteResult(f64),

    #[error("Formula is too complex: {0}")]
    TooComplex(String),
}

impl FormulaError {
    /// Rewrites the character offset carried by positional errors.
    pub fn map_position(self, f: impl FnOnce(usize) -> usize) -> Self {
        match self {
            FormulaError::UnsafeCharacters {
                character,
                position,
            } => FormulaError::UnsafeCharacters {
                character,
                position: f(position),
            },
            FormulaError::Syntax { message, position } => FormulaError::Syntax {
                message,
                position: f(position),
            },
            other => other,
        }
    }
}

/// Errors found while validating a `ProcessDefinition`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DefinitionError {
    #[error("Step order must be a positive integer, but step '{step_name}' has order 0")]
    InvalidStepOrder { step_name: String },

    #[error("Step order {0} is used by more than one step")]
    DuplicateStepOrder(u32),

    #[error("Field key '{field_key}' appears more than once in step {step_order}")]
    DuplicateFieldKey { step_order: u32, field_key: String },

    #[error("Calculated field '{field_key}' in step {step_order} has an invalid formula: {source}")]
    InvalidFormula {
        step_order: u32,
        field_key: String,
        source: FormulaError,
    },

    #[error(
        "Calculated field '{field_key}' in step {step_order} references '{reference}', which does not exist"
    )]
    UnknownReference {
        step_order: u32,
        field_key: String,
        reference: String,
    },

    #[error("Calculated field '{field_key}' in step {step_order} references itself")]
    SelfReference { step_order: u32, field_key: String },

    #[error(
        "Calculated field '{field_key}' in step {step_order} references '{reference}', which belongs to a later step"
    )]
    ForwardReference {
        step_order: u32,
        field_key: String,
        reference: String,
    },

    #[error(
        "Calculated field '{field_key}' in step {step_order} references '{reference}', which is calculated after it"
    )]
    LaterFieldReference {
        step_order: u32,
        field_key: String,
        reference: String,
    },
}

/// Errors raised by operations on a running `ProcessInstance`.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    #[error("Process definition is invalid: {0}")]
    InvalidDefinition(#[from] DefinitionError),

    #[error("Step {0} is not part of this process")]
    UnknownStep(u32),

    #[error("Step {attempted} cannot be completed yet; step {expected} must be completed first")]
    OutOfOrder { attempted: u32, expected: u32 },

    #[error("Step {step_order} is missing required field '{field_key}'")]
    MissingRequiredField { step_order: u32, field_key: String },

    #[error("This process does not allow rolling back to a previous step")]
    RollbackNotAllowed,

    #[error("Cannot roll back to step {0} because it has not been completed")]
    RollbackTargetNotCompleted(u32),
}

/// Errors that can occur when converting a custom user format into a `ProcessDefinition`.
#[derive(Error, Debug, Clone)]
pub enum ConversionError {
    #[error("Invalid custom data: {0}")]
    ValidationError(String),
}

/// Failure to start a `ProcessInstance` from a custom format.
#[derive(Error, Debug, Clone)]
pub enum InstanceSetupError {
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    Process(#[from] ProcessError),
}
