use super::definition::ProcessDefinition;
use crate::error::ConversionError;

/// A trait for custom data models that can be converted into a `ProcessDefinition`.
///
/// Process configurations are usually stored in whatever shape the host
/// application prefers (database rows, form-builder JSON, ...). Implementing
/// this trait provides the translation layer into keisan's canonical model.
///
/// # Example
///
/// ```rust,no_run
/// use keisan::error::ConversionError;
/// use keisan::process::{FieldDefinition, IntoProcess, ProcessDefinition, StepDefinition};
///
/// struct StoredStep { position: u32, title: String, formula_fields: Vec<(String, String)> }
/// struct StoredProcess { title: String, steps: Vec<StoredStep> }
///
/// impl IntoProcess for StoredProcess {
///     fn into_process(self) -> Result<ProcessDefinition, ConversionError> {
///         let steps = self
///             .steps
///             .into_iter()
///             .map(|s| StepDefinition {
///                 order: s.position,
///                 name: s.title,
///                 fields: s
///                     .formula_fields
///                     .iter()
///                     .map(|(key, formula)| FieldDefinition::calculated(key, formula))
///                     .collect(),
///             })
///             .collect();
///         Ok(ProcessDefinition {
///             name: self.title,
///             mode: Default::default(),
///             allow_rollback: false,
///             steps,
///         })
///     }
/// }
/// ```
pub trait IntoProcess {
    /// Consumes the object and converts it into a process definition.
    fn into_process(self) -> Result<ProcessDefinition, ConversionError>;
}

impl IntoProcess for ProcessDefinition {
    fn into_process(self) -> Result<ProcessDefinition, ConversionError> {
        Ok(self)
    }
}

/// Parses a process definition from its JSON form.
pub fn process_from_json(json: &str) -> Result<ProcessDefinition, ConversionError> {
    serde_json::from_str(json).map_err(|e| ConversionError::ValidationError(e.to_string()))
}
