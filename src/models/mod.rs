pub mod application;
pub mod inbound_message;
pub mod internship;
pub mod notification_log;

/// Returned when a stored enum column holds an unknown value.
#[derive(Debug, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}
