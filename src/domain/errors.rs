use thiserror::Error;

/// Errors raised by the model layer itself. Everything upstream
/// (network, storage, serialization) travels as `anyhow::Error` with
/// context attached at the call site.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("model input dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("label count {labels} does not match input count {inputs}")]
    LabelMismatch { inputs: usize, labels: usize },
}
