//! In-crate fakes for the collaborator traits. Every call is recorded.

use async_trait::async_trait;
use base64::Engine as _;
use solana_sdk::hash::Hash;
use solana_sdk::message::{v0, VersionedMessage};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::system_instruction;
use solana_sdk::transaction::{Transaction, VersionedTransaction};
use std::sync::Mutex;

use crate::api::{ActionBackend, ConfirmRequest, ConfirmResponse, ParsedMessage, PrepareRequest};
use crate::decoder::SignableTransaction;
use crate::domain::{ActionKind, Currency, FinancialSnapshot, Goal, GoalKind};
use crate::error::{BackendError, WalletError};
use crate::notifier::{Notification, NotificationSink};
use crate::wallet::Wallet;

pub fn goal(id: u64, kind: GoalKind) -> Goal {
    Goal {
        id,
        name: format!("goal-{id}"),
        target_amount: 1_000.0,
        current_amount: 0.0,
        kind,
        currency: Currency::Usd,
    }
}

pub fn legacy_b64() -> String {
    let payer = Pubkey::new_unique();
    let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
    let tx = Transaction::new_with_payer(&[ix], Some(&payer));
    base64::engine::general_purpose::STANDARD.encode(bincode::serialize(&tx).unwrap())
}

pub fn versioned_b64() -> String {
    let payer = Pubkey::new_unique();
    let ix = system_instruction::transfer(&payer, &Pubkey::new_unique(), 1);
    let msg = v0::Message::try_compile(&payer, &[ix], &[], Hash::new_unique()).unwrap();
    let tx = VersionedTransaction {
        signatures: vec![Signature::default(); msg.header.num_required_signatures as usize],
        message: VersionedMessage::V0(msg),
    };
    base64::engine::general_purpose::STANDARD.encode(bincode::serialize(&tx).unwrap())
}

enum SendMode {
    Ok,
    Reject,
    Fail(String),
}

pub struct FakeWallet {
    key: Option<Pubkey>,
    mode: SendMode,
    sent: Mutex<Vec<String>>,
}

impl FakeWallet {
    fn build(key: Option<Pubkey>, mode: SendMode) -> Self {
        Self { key, mode, sent: Mutex::new(Vec::new()) }
    }

    pub fn connected() -> Self {
        Self::build(Some(Pubkey::new_unique()), SendMode::Ok)
    }

    pub fn disconnected() -> Self {
        Self::build(None, SendMode::Ok)
    }

    pub fn rejecting() -> Self {
        Self::build(Some(Pubkey::new_unique()), SendMode::Reject)
    }

    pub fn failing(msg: &str) -> Self {
        Self::build(Some(Pubkey::new_unique()), SendMode::Fail(msg.to_string()))
    }

    pub fn sends(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn last_signature(&self) -> Option<String> {
        self.sent.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Wallet for FakeWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.key
    }

    async fn send_transaction(&self, _tx: SignableTransaction) -> Result<String, WalletError> {
        let mut sent = self.sent.lock().unwrap();
        let sig = format!("5ig{:0>40}", sent.len() + 1);
        sent.push(sig.clone());
        match &self.mode {
            SendMode::Ok => Ok(sig),
            SendMode::Reject => Err(WalletError::UserRejected),
            SendMode::Fail(m) => Err(WalletError::Failed(m.clone())),
        }
    }
}

#[derive(Default)]
struct Calls {
    log: Vec<String>,
    goal_fetches: usize,
    financial_fetches: usize,
    prepared: Vec<(ActionKind, PrepareRequest)>,
    confirmed: Vec<ConfirmRequest>,
    parsed: Vec<String>,
}

pub struct FakeBackend {
    goals: Vec<Goal>,
    transaction: String,
    prepare_error: Option<Option<String>>,
    confirm: Result<bool, ()>,
    financials: Result<FinancialSnapshot, BackendError>,
    parse: Result<ParsedMessage, BackendError>,
    report: Option<Vec<u8>>,
    calls: Mutex<Calls>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            goals: Vec::new(),
            transaction: legacy_b64(),
            prepare_error: None,
            confirm: Ok(true),
            financials: Ok(FinancialSnapshot { surplus: 0.0, currency: Currency::Usd }),
            parse: Ok(ParsedMessage::default()),
            report: None,
            calls: Mutex::new(Calls::default()),
        }
    }
}

impl FakeBackend {
    pub fn with_goals(mut self, goals: Vec<Goal>) -> Self {
        self.goals = goals;
        self
    }

    pub fn with_transaction(mut self, b64: String) -> Self {
        self.transaction = b64;
        self
    }

    pub fn failing_prepare(mut self, message: Option<&str>) -> Self {
        self.prepare_error = Some(message.map(str::to_string));
        self
    }

    pub fn failing_confirm(mut self) -> Self {
        self.confirm = Err(());
        self
    }

    pub fn unacknowledged_confirm(mut self) -> Self {
        self.confirm = Ok(false);
        self
    }

    pub fn with_surplus(mut self, surplus: f64, currency: Currency) -> Self {
        self.financials = Ok(FinancialSnapshot { surplus, currency });
        self
    }

    pub fn failing_financials(mut self) -> Self {
        self.financials = Err(BackendError::Rejected { status: 500, message: None });
        self
    }

    pub fn with_reply(mut self, parsed: ParsedMessage) -> Self {
        self.parse = Ok(parsed);
        self
    }

    pub fn failing_parse(mut self) -> Self {
        self.parse = Err(BackendError::Transport("connection refused".into()));
        self
    }

    pub fn with_report(mut self, pdf: Vec<u8>) -> Self {
        self.report = Some(pdf);
        self
    }

    pub fn log(&self) -> Vec<String> {
        self.calls.lock().unwrap().log.clone()
    }

    pub fn total_calls(&self) -> usize {
        self.log().len()
    }

    pub fn goal_fetches(&self) -> usize {
        self.calls.lock().unwrap().goal_fetches
    }

    pub fn financial_fetches(&self) -> usize {
        self.calls.lock().unwrap().financial_fetches
    }

    pub fn prepared(&self) -> Vec<(ActionKind, PrepareRequest)> {
        self.calls.lock().unwrap().prepared.clone()
    }

    pub fn confirmed(&self) -> Vec<ConfirmRequest> {
        self.calls.lock().unwrap().confirmed.clone()
    }

    pub fn parsed(&self) -> Vec<String> {
        self.calls.lock().unwrap().parsed.clone()
    }
}

#[async_trait]
impl ActionBackend for FakeBackend {
    async fn prepare_action(&self, kind: ActionKind, req: &PrepareRequest) -> Result<String, BackendError> {
        {
            let mut c = self.calls.lock().unwrap();
            c.log.push(format!("prepare:{kind}"));
            c.prepared.push((kind, req.clone()));
        }
        match &self.prepare_error {
            Some(message) => Err(BackendError::Rejected { status: 400, message: message.clone() }),
            None => Ok(self.transaction.clone()),
        }
    }

    async fn confirm_action(&self, req: &ConfirmRequest) -> Result<ConfirmResponse, BackendError> {
        {
            let mut c = self.calls.lock().unwrap();
            c.log.push(format!("confirm:{}", req.action));
            c.confirmed.push(req.clone());
        }
        match self.confirm {
            Ok(success) => Ok(ConfirmResponse { success, rest: serde_json::json!({}) }),
            Err(()) => Err(BackendError::Rejected { status: 500, message: Some("db down".into()) }),
        }
    }

    async fn fetch_goals(&self, _wallet: &str) -> Vec<Goal> {
        let mut c = self.calls.lock().unwrap();
        c.log.push("goals".into());
        c.goal_fetches += 1;
        self.goals.clone()
    }

    async fn fetch_financials(&self, _wallet: &str) -> Result<FinancialSnapshot, BackendError> {
        let mut c = self.calls.lock().unwrap();
        c.log.push("financials".into());
        c.financial_fetches += 1;
        self.financials.clone()
    }

    async fn parse_intent(&self, message: &str, _wallet: &str) -> Result<ParsedMessage, BackendError> {
        let mut c = self.calls.lock().unwrap();
        c.log.push("parse".into());
        c.parsed.push(message.to_string());
        self.parse.clone()
    }

    async fn download_report(&self) -> Result<Vec<u8>, BackendError> {
        self.calls.lock().unwrap().log.push("report".into());
        self.report
            .clone()
            .ok_or(BackendError::Rejected { status: 500, message: Some("report service down".into()) })
    }
}

#[derive(Default)]
pub struct RecordingSink {
    notes: Mutex<Vec<Notification>>,
}

impl RecordingSink {
    pub fn notes(&self) -> Vec<Notification> {
        self.notes.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.notes().into_iter().map(|n| n.text).collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn post(&self, note: Notification) {
        self.notes.lock().unwrap().push(note);
    }
}
