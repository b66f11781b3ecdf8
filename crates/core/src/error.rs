use crate::notice::NoticeKind;
use crate::wizard::WizardStep;

/// Result alias that carries the custom [`TempleError`] type.
pub type Result<T> = std::result::Result<T, TempleError>;

/// Common error type for the core crate.
///
/// Every variant has a recovery path back to an interactive state; none of
/// them is fatal to the stage.
#[derive(Debug, thiserror::Error)]
pub enum TempleError {
    /// A fourth deity was selected while three are already placed.
    #[error("at most three deities can be placed in the temple")]
    MaxEntitiesExceeded,
    /// A wizard transition whose guard is not satisfied.
    #[error("cannot move from step {from} to {to}")]
    InvalidTransition { from: WizardStep, to: WizardStep },
    /// Save or load against the persistence gateway failed.
    #[error("persistence failure: {0}")]
    PersistenceFailure(String),
    /// An image or sound reference could not be resolved.
    #[error("asset resolution failure: {0}")]
    AssetResolutionFailure(String),
    /// Loading, playing or stopping a sound failed.
    #[error("audio device failure: {0}")]
    AudioDeviceFailure(String),
    /// Caller supplied arguments that can never succeed.
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
    /// Free-form message for conditions without a dedicated variant.
    #[error("{0}")]
    Message(String),
    /// Wrapper around standard IO errors.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// Wrapper around JSON (de)serialisation errors.
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

impl TempleError {
    /// Creates a new error that simply wraps the provided message.
    pub fn msg<T: Into<String>>(msg: T) -> Self {
        Self::Message(msg.into())
    }

    /// Notice category used when this error is surfaced to the user.
    pub fn notice_kind(&self) -> NoticeKind {
        match self {
            Self::MaxEntitiesExceeded => NoticeKind::MaxEntitiesExceeded,
            Self::InvalidTransition { .. } => NoticeKind::InvalidTransition,
            Self::PersistenceFailure(_) | Self::Io(_) | Self::Json(_) => {
                NoticeKind::PersistenceFailure
            }
            Self::AssetResolutionFailure(_) => NoticeKind::AssetResolutionFailure,
            Self::AudioDeviceFailure(_) => NoticeKind::AudioDeviceFailure,
            Self::InvalidInput(_) | Self::Message(_) => NoticeKind::General,
        }
    }
}

impl From<&str> for TempleError {
    fn from(value: &str) -> Self {
        Self::msg(value)
    }
}

impl From<String> for TempleError {
    fn from(value: String) -> Self {
        Self::Message(value)
    }
}
