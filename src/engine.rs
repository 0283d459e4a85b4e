use std::sync::Arc;
use tracing::{error, info, warn};

use crate::api::{ActionBackend, ConfirmRequest, PrepareRequest};
use crate::decoder;
use crate::domain::{first_savings_goal, ActionKind, ActionOutcome, ActionReceipt, ActionRequest, Session};
use crate::error::{ActionError, BackendError, WalletError};
use crate::notifier::{Notification, NotificationSink};
use crate::wallet::Wallet;

const PREPARE_FALLBACK: &str = "failed to prepare transaction";
const LIQUIDITY_HINT: &str =
    "could not find a swap route; liquidity is likely too low right now, please try again later";

/// Runs one save/stake action end to end:
/// connected? -> goal -> prepare -> decode -> sign & send -> confirm.
///
/// Every step is terminal on failure and nothing is retried. Once the wallet
/// has returned a signature the transaction is never submitted again.
#[derive(Clone)]
pub struct ActionEngine {
    wallet: Arc<dyn Wallet>,
    backend: Arc<dyn ActionBackend>,
    sink: Arc<dyn NotificationSink>,
}

impl ActionEngine {
    pub fn new(
        wallet: Arc<dyn Wallet>,
        backend: Arc<dyn ActionBackend>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self { wallet, backend, sink }
    }

    pub fn backend(&self) -> &Arc<dyn ActionBackend> {
        &self.backend
    }

    pub fn sink(&self) -> &Arc<dyn NotificationSink> {
        &self.sink
    }

    /// Executes the request and appends the outcome to the sink.
    pub async fn execute(&self, session: &Session, req: ActionRequest) -> ActionOutcome {
        let kind = req.kind;
        let outcome = match self.run(session, req).await {
            Ok(receipt) => ActionOutcome::Success(receipt),
            Err(e) => {
                if e.needs_escalation() {
                    error!(%kind, error = %e, "engine.unrecorded_onchain_action");
                } else {
                    warn!(%kind, error = %e, "engine.failed");
                }
                ActionOutcome::failure(Some(kind), e)
            }
        };
        self.sink.post(Notification::from_outcome(&outcome)).await;
        outcome
    }

    /// First savings goal of `wallet`, fetched fresh.
    pub async fn resolve_savings_goal(&self, wallet: &str) -> Result<u64, ActionError> {
        let goals = self.backend.fetch_goals(wallet).await;
        first_savings_goal(&goals).map(|g| g.id).ok_or(ActionError::NoSavingsGoal)
    }

    async fn run(&self, session: &Session, req: ActionRequest) -> Result<ActionReceipt, ActionError> {
        if self.wallet.public_key().is_none() {
            return Err(ActionError::WalletNotConnected);
        }
        req.validate()?;

        let goal_id = match (req.kind, req.goal_id) {
            (ActionKind::Save, None) => {
                let id = self.resolve_savings_goal(&session.wallet_address).await?;
                info!(goal_id = id, "engine.goal_resolved");
                Some(id)
            }
            (_, g) => g,
        };

        info!(kind = %req.kind, amount = req.amount, currency = %req.currency, ?goal_id, "engine.prepare");
        let prepared = self
            .backend
            .prepare_action(
                req.kind,
                &PrepareRequest { amount: req.amount, currency: req.currency, goal_id },
            )
            .await
            .map_err(prepare_error)?;

        let tx = decoder::decode(&prepared).map_err(|e| ActionError::Decode(e.to_string()))?;
        info!(encoding = tx.encoding(), "engine.decoded");

        let signature = self.wallet.send_transaction(tx).await.map_err(|e| match e {
            WalletError::UserRejected => ActionError::UserCancelled,
            WalletError::Failed(msg) => ActionError::Submit(msg),
        })?;
        info!(%signature, "engine.submitted");

        let confirm = ConfirmRequest {
            tx_sig: signature.clone(),
            action: req.kind,
            amount: req.amount,
            currency: req.currency,
            goal_id,
        };
        match self.backend.confirm_action(&confirm).await {
            Ok(r) if r.success => {}
            Ok(_) => {
                return Err(ActionError::Confirm {
                    signature,
                    detail: "backend did not acknowledge the transaction".into(),
                })
            }
            Err(e) => return Err(ActionError::Confirm { signature, detail: e.to_string() }),
        }
        info!(%signature, "engine.confirmed");

        Ok(ActionReceipt {
            kind: req.kind,
            amount: req.amount,
            currency: req.currency,
            signature,
            goal_id,
        })
    }
}

fn prepare_error(e: BackendError) -> ActionError {
    let msg = match e {
        BackendError::Rejected { message, .. } => message.unwrap_or_else(|| PREPARE_FALLBACK.to_string()),
        BackendError::Transport(m) | BackendError::InvalidResponse(m) => format!("{PREPARE_FALLBACK}: {m}"),
    };
    if msg.to_lowercase().contains("liquidity") {
        return ActionError::Prepare(LIQUIDITY_HINT.to_string());
    }
    ActionError::Prepare(msg)
}
