use thiserror::Error;

/// Failure taxonomy for remote policy calls.
///
/// `Unavailable` covers transport failures, timeouts, and unparseable
/// responses; it is the only variant that may trigger the permanent switch
/// to local evaluation. `Rejected` is a structured error from the engine
/// and is treated as a normal deny by callers making security decisions.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("policy engine unavailable: {0}")]
    Unavailable(String),
    #[error("policy engine rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
}

impl PolicyError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PolicyError::Unavailable(_))
    }
}

impl From<reqwest::Error> for PolicyError {
    fn from(err: reqwest::Error) -> Self {
        PolicyError::Unavailable(err.to_string())
    }
}
