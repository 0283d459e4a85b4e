use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::domain::{ActionKind, Currency, FinancialSnapshot, Goal};
use crate::error::BackendError;

/// Remote endpoints the orchestrators depend on.
#[async_trait]
pub trait ActionBackend: Send + Sync {
    /// Returns the base64 serialized transaction.
    async fn prepare_action(&self, kind: ActionKind, req: &PrepareRequest) -> Result<String, BackendError>;

    async fn confirm_action(&self, req: &ConfirmRequest) -> Result<ConfirmResponse, BackendError>;

    /// Never fails; anything unexpected is an empty list.
    async fn fetch_goals(&self, wallet: &str) -> Vec<Goal>;

    async fn fetch_financials(&self, wallet: &str) -> Result<FinancialSnapshot, BackendError>;

    async fn parse_intent(&self, message: &str, wallet: &str) -> Result<ParsedMessage, BackendError>;

    /// Weekly summary PDF.
    async fn download_report(&self) -> Result<Vec<u8>, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareRequest {
    pub amount: f64,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrepareResponse {
    pub transaction: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub tx_sig: String,
    pub action: ActionKind,
    pub amount: f64,
    pub currency: Currency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goal_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(flatten)]
    pub rest: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
struct GoalsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    goals: Vec<Goal>,
}

#[derive(Debug, Clone, Deserialize)]
struct BudgetInfo {
    #[serde(default)]
    currency: Option<Currency>,
}

#[derive(Debug, Clone, Deserialize)]
struct FinancialsResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    surplus: Option<f64>,
    #[serde(default)]
    budget: Option<BudgetInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ParseRequest<'a> {
    message: &'a str,
    wallet_address: &'a str,
}

/// Reply of the assistant endpoint.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ParsedMessage {
    #[serde(default)]
    pub reply: Option<String>,
    #[serde(default)]
    pub intent: Option<Intent>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub action: String,
    /// Either an object or a JSON-encoded string; see `SplitPlan::parse`.
    #[serde(default)]
    pub suggested_split: Option<serde_json::Value>,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    token: Option<String>,
    http: Client,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BackendError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
            http,
        })
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn post_json<Req: Serialize + ?Sized, Res: DeserializeOwned>(
        &self,
        path: &str,
        body: &Req,
    ) -> Result<Res, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.authed(self.http.post(url).json(body)).send().await?;
        read_json(resp).await
    }

    async fn get_json<Res: DeserializeOwned>(&self, path: &str) -> Result<Res, BackendError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self.authed(self.http.get(url)).send().await?;
        read_json(resp).await
    }
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, BackendError> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        return Err(BackendError::Rejected { status: status.as_u16(), message: error_message(&text) });
    }
    resp.json::<T>().await.map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

/// `detail` wins over `error`. Bodies that are not a JSON error object
/// (proxy pages, empty bodies) carry no usable reason.
fn error_message(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.detail.or(b.error))
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
}

#[async_trait]
impl ActionBackend for ApiClient {
    async fn prepare_action(&self, kind: ActionKind, req: &PrepareRequest) -> Result<String, BackendError> {
        let resp: PrepareResponse = self.post_json(&format!("/api/action/{kind}"), req).await?;
        Ok(resp.transaction)
    }

    async fn confirm_action(&self, req: &ConfirmRequest) -> Result<ConfirmResponse, BackendError> {
        self.post_json("/api/action/confirm-action", req).await
    }

    async fn fetch_goals(&self, wallet: &str) -> Vec<Goal> {
        match self.get_json::<GoalsResponse>(&format!("/api/goals/{wallet}")).await {
            Ok(r) if r.success => r.goals,
            Ok(_) => Vec::new(),
            Err(e) => {
                warn!(error = %e, wallet, "api.fetch_goals.failed");
                Vec::new()
            }
        }
    }

    async fn fetch_financials(&self, wallet: &str) -> Result<FinancialSnapshot, BackendError> {
        let r: FinancialsResponse = self.get_json(&format!("/api/reports/financials/{wallet}")).await?;
        if !r.success {
            return Err(BackendError::InvalidResponse(
                "financial data request was not successful".into(),
            ));
        }
        Ok(FinancialSnapshot {
            surplus: r.surplus.unwrap_or(0.0),
            currency: r.budget.and_then(|b| b.currency).unwrap_or_default(),
        })
    }

    async fn parse_intent(&self, message: &str, wallet: &str) -> Result<ParsedMessage, BackendError> {
        self.post_json("/api/ai/parse", &ParseRequest { message, wallet_address: wallet })
            .await
    }

    async fn download_report(&self) -> Result<Vec<u8>, BackendError> {
        let url = format!("{}/api/reports/weekly-summary", self.base_url);
        let resp = self.authed(self.http.get(url)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(BackendError::Rejected { status: status.as_u16(), message: error_message(&text) });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}
