use thiserror::Error;

/// Typed failures surfaced by the dispatch engine. Validation errors fail
/// the write that produced them and never reach a scheduled dispatch.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid display format '{value}', expected one of: {available}")]
    InvalidDisplayFormat { value: String, available: String },

    #[error("invalid email address ({0})")]
    InvalidRecipientAddress(String),

    #[error("the segment is still used by the scheduled report(s) {reports}")]
    SegmentInUse { reports: String },

    #[error("an error occurred while sending '{filename}' to {recipient}: {message}")]
    DeliveryFailure {
        filename: String,
        recipient: String,
        message: String,
    },

    #[error("no channel registered for report type '{0}'")]
    UnknownChannel(String),
}
