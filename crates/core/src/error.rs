use thiserror::Error;

/// Failure taxonomy for one registration attempt. Each variant maps to a
/// distinct operator triage path, so transport errors are classified at the
/// source instead of by matching message substrings later.
#[derive(Error, Debug, Clone)]
pub enum DriverError {
    #[error("proxy unreachable: {0}")]
    ProxyUnreachable(String),

    #[error("proxy timeout after {0}s")]
    ProxyTimeout(u64),

    #[error("google verification required: {0}")]
    GoogleVerificationRequired(String),

    #[error("target login control not found")]
    TargetLoginControlNotFound,

    #[error("target google button not found")]
    TargetGoogleButtonNotFound,

    #[error("browser error: {0}")]
    Browser(String),

    #[error("automation error: {0}")]
    Unknown(String),
}

impl DriverError {
    /// Transient failures can be re-paired after the operator deletes the
    /// task; the rest need human action first (2FA, site layout change).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DriverError::ProxyUnreachable(_)
                | DriverError::ProxyTimeout(_)
                | DriverError::Browser(_)
                | DriverError::Unknown(_)
        )
    }
}
