use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use lyra_actions::assistant::{escalations, Assistant};
use lyra_actions::config::Config;
use lyra_actions::decoder;
use lyra_actions::events::{self, EventHub, Frame};
use lyra_actions::logger;
use lyra_actions::notifier::{Fanout, NotificationSink, SlackNotifier};
use lyra_actions::transcript::Transcript;
use lyra_actions::wallet::{KeypairWallet, PromptApprover, Wallet};
use lyra_actions::{ActionEngine, ActionKind, ActionOutcome, ActionRequest, ApiClient, Currency, Session, SplitExecutor};

#[derive(Parser)]
#[command(name = "lyra", about = "Save and stake budget surplus on-chain")]
struct Cli {
    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    /// Sign without asking for confirmation.
    #[arg(long, short = 'y', global = true)]
    yes: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Save an amount towards a goal (first savings goal if omitted).
    Save {
        amount: f64,
        currency: Currency,
        #[arg(long)]
        goal: Option<u64>,
    },
    /// Stake an amount.
    Stake {
        amount: f64,
        currency: Currency,
        #[arg(long)]
        goal: Option<u64>,
    },
    /// Split the current surplus, e.g. '{"stakePercent":40,"savePercent":60}'.
    Split { plan: String },
    /// Save or stake the whole current surplus.
    Surplus {
        action: ActionKind,
        #[arg(long)]
        goal: Option<u64>,
    },
    /// Send a message to the assistant.
    Chat { message: String },
    /// Read push-event frames (one JSON object per line) from stdin into the transcript.
    Events,
    /// Download the weekly summary PDF.
    Report {
        /// Directory to write into (defaults to LYRA_REPORT_DIR).
        #[arg(long)]
        out: Option<String>,
    },
    /// Show which encoding a base64 transaction uses.
    Decode { transaction: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load local .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    logger::init_tracing(cli.json_logs);

    let cfg = Config::from_env()?;
    info!(?cfg, "boot");

    if let Command::Decode { transaction } = &cli.command {
        let tx = decoder::decode(transaction)?;
        println!("{} transaction, signers: {:?}", tx.encoding(), tx.required_signers());
        return Ok(());
    }

    let transcript = Arc::new(Transcript::open(&cfg.transcript_path, cfg.timezone()?)?);
    let mut sink = Fanout::new().with(transcript.clone());
    if let Some(url) = cfg.slack_webhook_url.clone() {
        sink = sink.with(Arc::new(SlackNotifier::new(url)));
    }
    let sink: Arc<dyn NotificationSink> = Arc::new(sink);

    if let Command::Events = cli.command {
        return pump_events(sink).await;
    }

    let mut wallet = KeypairWallet::from_path(cfg.sol_keypair_path.as_deref(), cfg.rpc_http_url.clone(), cfg.dry_run)?;
    if !cli.yes {
        wallet = wallet.with_approver(Arc::new(PromptApprover::stdin()));
    }
    let wallet_address = cfg
        .wallet_address
        .clone()
        .or_else(|| wallet.public_key().map(|k| k.to_string()))
        .ok_or_else(|| anyhow!("set LYRA_WALLET or SOL_KEYPAIR_PATH"))?;
    let session = Session::new(wallet_address);

    let backend = ApiClient::new(&cfg.api_base_url, cfg.http_timeout())?.with_token(cfg.api_token.clone());
    let engine = ActionEngine::new(Arc::new(wallet), Arc::new(backend), sink);
    let split = SplitExecutor::new(engine.clone()).with_delay(cfg.split_delay());

    let assistant = Assistant::new(split.clone()).with_report_dir(&cfg.report_dir);

    let mut report_failed = false;
    let seen = transcript.entries().len();
    let outcomes = match cli.command {
        Command::Save { amount, currency, goal } => {
            vec![engine.execute(&session, ActionRequest::new(ActionKind::Save, amount, currency, goal)).await]
        }
        Command::Stake { amount, currency, goal } => {
            vec![engine.execute(&session, ActionRequest::new(ActionKind::Stake, amount, currency, goal)).await]
        }
        Command::Split { plan } => split.execute_split(&session, &serde_json::Value::String(plan)).await,
        Command::Surplus { action, goal } => vec![split.execute_surplus(&session, action, goal).await],
        Command::Chat { message } => assistant.handle_message(&session, &message).await,
        Command::Report { out } => {
            let assistant = match out {
                Some(dir) => assistant.with_report_dir(dir),
                None => assistant,
            };
            if assistant.download_report().await.is_err() {
                report_failed = true;
            }
            Vec::new()
        }
        Command::Events | Command::Decode { .. } => Vec::new(),
    };

    for entry in transcript.entries().iter().skip(seen) {
        println!("{}", transcript.render(entry));
    }

    let escalated = escalations(&outcomes);
    if !escalated.is_empty() {
        return Err(anyhow!("{} action(s) need support: {:?}", escalated.len(), escalated));
    }
    if report_failed || outcomes.iter().any(|o| matches!(o, ActionOutcome::Failure { .. })) {
        std::process::exit(1);
    }
    Ok(())
}

async fn pump_events(sink: Arc<dyn NotificationSink>) -> Result<()> {
    let hub = EventHub::new(256);
    let forwarder = tokio::spawn(events::forward(hub.subscribe(), sink));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Frame>(&line) {
            Ok(frame) => {
                hub.publish_frame(frame);
            }
            Err(e) => tracing::warn!(error = %e, "events.bad_frame"),
        }
    }
    drop(hub);

    let n = forwarder.await?;
    info!(forwarded = n, "events.done");
    Ok(())
}
