use thiserror::Error;

/// Failures of the sign-in flow. None of them leave a session behind.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Sign-in cancelled.")]
    Cancelled,

    #[error("Sign-in expired. Please retry.")]
    Expired,

    #[error("Account exists with a different sign-in method.")]
    CredentialConflict,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Google Sign-In failed. Please try again.")]
    MissingToken,

    #[error("Signed-in account has no email address.")]
    MissingEmail,

    #[error("Invalid sign-in state. Please retry.")]
    StateMismatch,

    #[error("{0}")]
    Config(String),

    #[error("{0}")]
    Provider(String),
}

/// User-facing buckets for sign-in failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailureKind {
    CredentialConflict,
    NetworkFailure,
    Other,
}

impl AuthError {
    pub fn category(&self) -> AuthFailureKind {
        match self {
            AuthError::CredentialConflict => AuthFailureKind::CredentialConflict,
            AuthError::Network(_) => AuthFailureKind::NetworkFailure,
            _ => AuthFailureKind::Other,
        }
    }

    pub fn user_message(&self) -> String {
        match self.category() {
            AuthFailureKind::CredentialConflict => {
                "Account exists with a different sign-in method.".to_string()
            }
            AuthFailureKind::NetworkFailure => {
                "Network error. Please check your internet connection.".to_string()
            }
            AuthFailureKind::Other => self.to_string(),
        }
    }

    /// Identity Toolkit reports failures as an upper-case code, sometimes
    /// followed by ` : detail`.
    pub fn from_provider_code(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or("").trim();
        match code {
            "EMAIL_EXISTS" | "FEDERATED_USER_ID_ALREADY_LINKED" => AuthError::CredentialConflict,
            _ => AuthError::Provider(format!("Google Sign-In failed: {message}")),
        }
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            AuthError::Network(err.to_string())
        } else {
            AuthError::Provider(err.to_string())
        }
    }
}

/// Failures talking to the tree store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Config(String),

    #[error("Session refresh failed: {0}")]
    Session(String),

    #[error("Task worker stopped")]
    WorkerStopped,
}
