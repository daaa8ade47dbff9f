//! Error and result types shared by every model and primitive
use std::result;

pub type Result<T> = result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Hyperparameters are missing, ill-typed, or outside the family's domain
    #[error("malformed parameters for `{model}`: {reason}")]
    MalformedParameters { model: &'static str, reason: String },
    /// A removal that does not undo a prior addition
    #[error("invalid removal: {reason}")]
    InvalidRemoval { reason: String },
    /// A sampling or normalization primitive was handed no weights
    #[error("empty input")]
    EmptyInput,
    /// A loaded dump does not reproduce the state it was dumped from
    #[error("serialization mismatch: {reason}")]
    SerializationMismatch { reason: String },
    /// A value outside the support of the model
    #[error("invalid value for `{model}`: {reason}")]
    InvalidValue { model: &'static str, reason: String },
    /// A primitive was called with inconsistent arguments
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// No variant with this name has been registered
    #[error("unknown model `{0}`")]
    UnknownModel(String),
    /// A type-erased group was handed to a model it does not belong to
    #[error("group belongs to `{found}`, not `{expected}`")]
    GroupMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Codec(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn malformed(model: &'static str, reason: impl Into<String>) -> Self {
        Error::MalformedParameters {
            model,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_value(
        model: &'static str,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidValue {
            model,
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_removal(reason: impl Into<String>) -> Self {
        Error::InvalidRemoval {
            reason: reason.into(),
        }
    }

    /// `true` for the errors a caller caused by handing in bad parameters
    pub fn is_malformed_parameters(&self) -> bool {
        matches!(self, Error::MalformedParameters { .. })
    }

    /// `true` for a removal of a value that was never added
    pub fn is_invalid_removal(&self) -> bool {
        matches!(self, Error::InvalidRemoval { .. })
    }
}
