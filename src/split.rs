//! Percentage splits of the current surplus into stake and save actions.

use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{info, warn};

use crate::domain::{ActionKind, ActionOutcome, ActionRequest, Session};
use crate::engine::ActionEngine;
use crate::error::ActionError;
use crate::notifier::Notification;

pub const DEFAULT_SPLIT_DELAY: Duration = Duration::from_millis(1_000);

const NO_SURPLUS: &str = "It looks like you don't have a surplus to take action on right now.";
const NO_PERCENTAGES: &str = "I couldn't determine valid percentages for saving or staking. Please try rephrasing your request.";

/// How much of the surplus to stake and to save, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SplitPlan {
    pub stake_percent: f64,
    pub save_percent: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    #[serde(default)]
    stake_percent: Option<f64>,
    #[serde(default)]
    save_percent: Option<f64>,
}

impl SplitPlan {
    /// Accepts the suggestion as an object or as a JSON-encoded string of one.
    /// Missing percentages are zero; anything else malformed is an error.
    pub fn parse(suggested: &Value) -> Result<Self, ActionError> {
        let value = match suggested {
            Value::String(s) => serde_json::from_str::<Value>(s)
                .map_err(|e| ActionError::InvalidSplit(format!("not valid JSON: {e}")))?,
            other => other.clone(),
        };
        if !value.is_object() {
            return Err(ActionError::InvalidSplit(format!("expected an object, got {value}")));
        }
        let raw: RawPlan =
            serde_json::from_value(value).map_err(|e| ActionError::InvalidSplit(e.to_string()))?;

        let plan = SplitPlan {
            stake_percent: raw.stake_percent.unwrap_or(0.0),
            save_percent: raw.save_percent.unwrap_or(0.0),
        };
        for (name, p) in [("stakePercent", plan.stake_percent), ("savePercent", plan.save_percent)] {
            if !p.is_finite() || !(0.0..=100.0).contains(&p) {
                return Err(ActionError::InvalidSplit(format!("{name} must be between 0 and 100, got {p}")));
            }
        }
        if plan.stake_percent + plan.save_percent > 100.0 {
            return Err(ActionError::InvalidSplit(format!(
                "percentages add up to {}%",
                plan.stake_percent + plan.save_percent
            )));
        }
        Ok(plan)
    }

    pub fn is_empty(&self) -> bool {
        self.stake_percent <= 0.0 && self.save_percent <= 0.0
    }

    /// Concrete actions against `surplus`, stake first.
    pub fn actions(&self, surplus: f64) -> Vec<(ActionKind, f64)> {
        let mut out = Vec::with_capacity(2);
        if self.stake_percent > 0.0 {
            out.push((ActionKind::Stake, surplus * self.stake_percent / 100.0));
        }
        if self.save_percent > 0.0 {
            out.push((ActionKind::Save, surplus * self.save_percent / 100.0));
        }
        out
    }
}

/// Drives zero, one or two actions through an [`ActionEngine`], one at a time.
#[derive(Clone)]
pub struct SplitExecutor {
    engine: ActionEngine,
    delay: Duration,
}

impl SplitExecutor {
    pub fn new(engine: ActionEngine) -> Self {
        Self { engine, delay: DEFAULT_SPLIT_DELAY }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn engine(&self) -> &ActionEngine {
        &self.engine
    }

    async fn report(&self, outcome: ActionOutcome) -> ActionOutcome {
        self.engine.sink().post(Notification::from_outcome(&outcome)).await;
        outcome
    }

    pub async fn execute_split(&self, session: &Session, suggested: &Value) -> Vec<ActionOutcome> {
        let backend = self.engine.backend();

        // Surplus moves with every incoming transaction; never reuse an older figure.
        let snapshot = match backend.fetch_financials(&session.wallet_address).await {
            Ok(s) => s,
            Err(e) => return vec![self.report(ActionOutcome::failure(None, ActionError::Financials(e.to_string()))).await],
        };
        if !(snapshot.surplus > 0.0) {
            info!(surplus = snapshot.surplus, "split.no_surplus");
            return vec![self.report(ActionOutcome::Info(NO_SURPLUS.into())).await];
        }

        let plan = match SplitPlan::parse(suggested) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, %suggested, "split.invalid_plan");
                return vec![self.report(ActionOutcome::failure(None, e)).await];
            }
        };
        if plan.is_empty() {
            return vec![self.report(ActionOutcome::Info(NO_PERCENTAGES.into())).await];
        }

        // Saving needs a home before anything runs, stake included.
        let goal_id = if plan.save_percent > 0.0 {
            match self.engine.resolve_savings_goal(&session.wallet_address).await {
                Ok(id) => Some(id),
                Err(e) => return vec![self.report(ActionOutcome::failure(Some(ActionKind::Save), e)).await],
            }
        } else {
            None
        };

        let actions = plan.actions(snapshot.surplus);
        info!(surplus = snapshot.surplus, currency = %snapshot.currency, ?plan, n = actions.len(), "split.start");

        let mut outcomes = Vec::with_capacity(actions.len());
        for (i, (kind, amount)) in actions.into_iter().enumerate() {
            if i > 0 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let goal = match kind {
                ActionKind::Save => goal_id,
                ActionKind::Stake => None,
            };
            let outcome = self
                .engine
                .execute(session, ActionRequest::new(kind, amount, snapshot.currency, goal))
                .await;
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Acts on the whole current surplus with a single action.
    pub async fn execute_surplus(&self, session: &Session, kind: ActionKind, goal_id: Option<u64>) -> ActionOutcome {
        let snapshot = match self.engine.backend().fetch_financials(&session.wallet_address).await {
            Ok(s) => s,
            Err(e) => return self.report(ActionOutcome::failure(Some(kind), ActionError::Financials(e.to_string()))).await,
        };
        if !(snapshot.surplus > 0.0) {
            return self.report(ActionOutcome::Info(NO_SURPLUS.into())).await;
        }
        self.engine
            .execute(session, ActionRequest::new(kind, snapshot.surplus, snapshot.currency, goal_id))
            .await
    }
}
