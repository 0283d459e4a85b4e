use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ActionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Save,
    Stake,
}

impl ActionKind {
    /// Path segment of the prepare-action endpoint.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Save => "save",
            ActionKind::Stake => "stake",
        }
    }

    pub fn past_tense(&self) -> &'static str {
        match self {
            ActionKind::Save => "saved",
            ActionKind::Stake => "staked",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "save" => Ok(ActionKind::Save),
            "stake" => Ok(ActionKind::Stake),
            other => Err(format!("unknown action: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[serde(rename = "NGN")]
    Ngn,
    #[default]
    #[serde(rename = "USD")]
    Usd,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Ngn => f.write_str("NGN"),
            Currency::Usd => f.write_str("USD"),
        }
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NGN" => Ok(Currency::Ngn),
            "USD" => Ok(Currency::Usd),
            other => Err(format!("unsupported currency: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GoalKind {
    Savings,
    Investment,
}

/// A savings or investment target tracked by the backend. Read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: u64,
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    #[serde(rename = "type")]
    pub kind: GoalKind,
    pub currency: Currency,
}

/// First savings goal in backend order.
pub fn first_savings_goal(goals: &[Goal]) -> Option<&Goal> {
    goals.iter().find(|g| g.kind == GoalKind::Savings)
}

/// Identity of the caller, injected into every orchestration run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub wallet_address: String,
}

impl Session {
    pub fn new(wallet_address: impl Into<String>) -> Self {
        Self { wallet_address: wallet_address.into() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionRequest {
    pub kind: ActionKind,
    pub amount: f64,
    pub currency: Currency,
    pub goal_id: Option<u64>,
}

impl ActionRequest {
    pub fn new(kind: ActionKind, amount: f64, currency: Currency, goal_id: Option<u64>) -> Self {
        Self { kind, amount, currency, goal_id }
    }

    pub fn validate(&self) -> Result<(), ActionError> {
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ActionError::InvalidRequest(format!(
                "amount must be a positive number, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Surplus and budget currency as observed at the start of a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FinancialSnapshot {
    pub surplus: f64,
    pub currency: Currency,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionReceipt {
    pub kind: ActionKind,
    pub amount: f64,
    pub currency: Currency,
    pub signature: String,
    pub goal_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Success(ActionReceipt),
    Failure {
        kind: Option<ActionKind>,
        error: ActionError,
    },
    Info(String),
}

impl ActionOutcome {
    pub fn failure(kind: Option<ActionKind>, error: ActionError) -> Self {
        ActionOutcome::Failure { kind, error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ActionOutcome::Success(_))
    }

    pub fn error(&self) -> Option<&ActionError> {
        match self {
            ActionOutcome::Failure { error, .. } => Some(error),
            _ => None,
        }
    }

    /// Transcript text for this outcome.
    pub fn message(&self) -> String {
        match self {
            ActionOutcome::Success(r) => format!(
                "Success! I've {} {:.2} {}{}. Transaction: {}",
                r.kind.past_tense(),
                r.amount,
                r.currency,
                if r.goal_id.is_some() { " to your goal" } else { "" },
                short_signature(&r.signature),
            ),
            ActionOutcome::Failure { error: ActionError::UserCancelled, .. } => {
                "Action cancelled: the transaction was not approved in your wallet.".to_string()
            }
            ActionOutcome::Failure { error, .. } => format!("Action Failed: {error}"),
            ActionOutcome::Info(text) => text.clone(),
        }
    }
}

/// `abcdefgh...stuvwxyz` for long signatures, unchanged otherwise.
pub fn short_signature(sig: &str) -> String {
    let chars: Vec<char> = sig.chars().collect();
    if chars.len() <= 16 {
        return sig.to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 8..].iter().collect();
    format!("{head}...{tail}")
}
