/// The ways in which computing a next due date can fail.
///
/// Every failure is atomic: nothing the caller passed in is modified, so the
/// caller's existing due date stays valid no matter which variant comes back.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A recurrence definition that can't be represented by this engine.
    ///
    /// This is reported when a rule is built or parsed, and retrying with the
    /// same input will always fail the same way.
    #[error("invalid recurrence rule: {0}")]
    InvalidRule(String),
    /// A negative or otherwise unrepresentable timestamp.
    #[error("invalid timestamp `{millis}`: {reason}")]
    InvalidTimestamp { millis: i64, reason: String },
    /// The rule's frequency can't be resolved to a deterministic next date
    /// with the weekday/interval combination it carries.
    #[error("unsupported frequency: {0}")]
    UnsupportedFrequency(String),
    /// The search for a next occurrence ran away or fell off the edge of the
    /// supported datetime range.
    #[error("could not resolve next occurrence: {0}")]
    RecurrenceUnresolved(String),
}

impl Error {
    pub(crate) fn invalid_rule(msg: impl Into<String>) -> Error {
        Error::InvalidRule(msg.into())
    }

    pub(crate) fn invalid_timestamp(
        millis: i64,
        reason: impl std::fmt::Display,
    ) -> Error {
        Error::InvalidTimestamp { millis, reason: reason.to_string() }
    }

    pub(crate) fn unresolved(msg: impl Into<String>) -> Error {
        Error::RecurrenceUnresolved(msg.into())
    }

    /// Returns true when this error is caused by the input rule rather than
    /// by a particular computation.
    pub fn is_rule_error(&self) -> bool {
        matches!(*self, Error::InvalidRule(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
