use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    // Backend
    pub api_base_url: String,
    #[serde(skip_serializing)]
    pub api_token: Option<String>,
    pub http_timeout_secs: u64,

    // Wallet
    pub wallet_address: Option<String>,
    pub rpc_http_url: String,
    pub sol_keypair_path: Option<String>,
    pub dry_run: bool,

    // Orchestration
    pub split_delay_ms: u64,

    // Notifications
    pub slack_webhook_url: Option<String>,
    pub transcript_path: String,
    pub report_dir: String,
    pub tz: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_base_url", &self.api_base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("wallet_address", &self.wallet_address)
            .field("rpc_http_url", &self.rpc_http_url)
            .field("sol_keypair_path", &self.sol_keypair_path)
            .field("dry_run", &self.dry_run)
            .field("split_delay_ms", &self.split_delay_ms)
            .field("slack_webhook_url", &self.slack_webhook_url.as_ref().map(|_| "<redacted>"))
            .field("transcript_path", &self.transcript_path)
            .field("report_dir", &self.report_dir)
            .field("tz", &self.tz)
            .finish()
    }
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|s| s.trim().to_lowercase()) {
        None => default,
        Some(v) if v.is_empty() => default,
        Some(v) if v == "1" || v == "true" || v == "yes" || v == "y" || v == "on" => true,
        Some(v) if v == "0" || v == "false" || v == "no" || v == "n" || v == "off" => false,
        Some(_) => default,
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|x| x.trim().parse().ok())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let api_base_url = env_opt("LYRA_API_URL").unwrap_or_else(|| "http://localhost:3001".to_string());
        let api_token = env_opt("LYRA_TOKEN");
        let http_timeout_secs = env_parse::<u64>("LYRA_HTTP_TIMEOUT_SECS").unwrap_or(30);
        if http_timeout_secs == 0 {
            return Err(anyhow!("LYRA_HTTP_TIMEOUT_SECS must be > 0"));
        }

        let wallet_address = env_opt("LYRA_WALLET");
        let rpc_http_url = env_opt("SOLANA_RPC_URL").unwrap_or_else(|| "https://api.devnet.solana.com".to_string());
        let sol_keypair_path = env_opt("SOL_KEYPAIR_PATH");
        let dry_run = env_bool("DRY_RUN", true);

        let split_delay_ms = env_parse::<u64>("LYRA_SPLIT_DELAY_MS").unwrap_or(1_000);

        let slack_webhook_url = env_opt("SLACK_WEBHOOK_URL");
        let transcript_path = env_opt("LYRA_TRANSCRIPT_PATH").unwrap_or_else(|| "./transcript.jsonl".to_string());
        let report_dir = env_opt("LYRA_REPORT_DIR").unwrap_or_else(|| ".".to_string());
        let tz = env_opt("LYRA_TZ").unwrap_or_else(|| "UTC".to_string());
        tz.parse::<chrono_tz::Tz>().map_err(|_| anyhow!("invalid LYRA_TZ: {tz}"))?;

        Ok(Self {
            api_base_url,
            api_token,
            http_timeout_secs,
            wallet_address,
            rpc_http_url,
            sol_keypair_path,
            dry_run,
            split_delay_ms,
            slack_webhook_url,
            transcript_path,
            report_dir,
            tz,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn split_delay(&self) -> Duration {
        Duration::from_millis(self.split_delay_ms)
    }

    pub fn timezone(&self) -> Result<chrono_tz::Tz> {
        self.tz.parse().map_err(|_| anyhow!("invalid tz: {}", self.tz))
    }
}
