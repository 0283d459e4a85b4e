use thiserror::Error;

/// Where in the action lifecycle a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Detected before any mutating call.
    Precondition,
    /// Backend refused to prepare; nothing changed.
    Preparation,
    /// User declined in the wallet.
    Cancelled,
    /// Wallet or network rejected the transaction; nothing was recorded.
    Submission,
    /// On-chain effect happened but the backend did not record it.
    Confirmation,
    /// Client and backend disagree on the wire format.
    Corruption,
}

/// Terminal failure of one action (or of a whole split before any action ran).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("wallet not connected; connect your wallet first to perform on-chain actions")]
    WalletNotConnected,

    #[error("no savings goal configured; create a savings goal first")]
    NoSavingsGoal,

    #[error("invalid split configuration: {0}")]
    InvalidSplit(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to fetch financial data: {0}")]
    Financials(String),

    #[error("{0}")]
    Prepare(String),

    #[error("unexpected error decoding prepared transaction: {0}")]
    Decode(String),

    #[error("transaction was cancelled in the wallet")]
    UserCancelled,

    #[error("failed to submit transaction: {0}")]
    Submit(String),

    #[error(
        "transaction {signature} succeeded on-chain but failed to record ({detail}); please contact support"
    )]
    Confirm { signature: String, detail: String },
}

impl ActionError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ActionError::WalletNotConnected
            | ActionError::NoSavingsGoal
            | ActionError::InvalidSplit(_)
            | ActionError::InvalidRequest(_)
            | ActionError::Financials(_) => ErrorCategory::Precondition,
            ActionError::Prepare(_) => ErrorCategory::Preparation,
            ActionError::Decode(_) => ErrorCategory::Corruption,
            ActionError::UserCancelled => ErrorCategory::Cancelled,
            ActionError::Submit(_) => ErrorCategory::Submission,
            ActionError::Confirm { .. } => ErrorCategory::Confirmation,
        }
    }

    /// Only a lost confirmation leaves chain and backend out of sync.
    pub fn needs_escalation(&self) -> bool {
        self.category() == ErrorCategory::Confirmation
    }
}

/// Failure talking to the remote backend.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackendError {
    /// Non-2xx answer. `message` is the backend's `detail`/`error` text if it sent one.
    #[error("backend returned {status}: {}", message.as_deref().unwrap_or("no details"))]
    Rejected { status: u16, message: Option<String> },

    #[error("request failed: {0}")]
    Transport(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            BackendError::InvalidResponse(e.to_string())
        } else {
            BackendError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum WalletError {
    #[error("user rejected the request")]
    UserRejected,

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("matches neither legacy ({legacy}) nor versioned ({versioned}) encoding")]
    Unrecognized { legacy: String, versioned: String },
}

/// Failure fetching or storing the weekly report.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to generate the report: {0}")]
    Backend(#[from] BackendError),

    #[error("failed to save the report: {0}")]
    Io(#[from] std::io::Error),
}
