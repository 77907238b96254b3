use thiserror::Error;

/// Failure talking to one of the remote collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Worth retrying from the UI: network trouble, timeouts, 429 and 5xx.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Unauthorized | Self::Decode(_) => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return Self::Timeout;
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        if let Some(status) = err.status() {
            if status.as_u16() == 401 {
                return Self::Unauthorized;
            }
            return Self::Status {
                status: status.as_u16(),
                body: String::new(),
            };
        }
        Self::Transport(err.to_string())
    }
}

/// Why a paid unlock of a blocked fixture did not happen.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnlockError {
    #[error("gate is not blocked")]
    NotBlocked,

    #[error("insufficient balance: {balance} < {cost}")]
    InsufficientBalance { balance: u64, cost: u64 },

    #[error("payment was declined")]
    PaymentDeclined,

    #[error("quota service refused the paid view")]
    Rejected,

    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },
}
