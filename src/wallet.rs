use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::{RpcSendTransactionConfig, RpcSimulateTransactionConfig};
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{read_keypair_file, Keypair, Signer};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::decoder::SignableTransaction;
use crate::error::WalletError;

/// The connected wallet, as far as on-chain actions are concerned.
#[async_trait]
pub trait Wallet: Send + Sync {
    /// Active public key; `None` when nothing is connected.
    fn public_key(&self) -> Option<Pubkey>;

    /// Signs and submits, returning the transaction signature.
    async fn send_transaction(&self, tx: SignableTransaction) -> Result<String, WalletError>;
}

/// Gate in front of signing. Declining is a user cancellation.
#[async_trait]
pub trait Approver: Send + Sync {
    async fn approve(&self, summary: &str) -> bool;
}

pub struct AutoApprove;

#[async_trait]
impl Approver for AutoApprove {
    async fn approve(&self, _summary: &str) -> bool {
        true
    }
}

/// Asks on stderr and reads the answer from a line source shared by every
/// prompt, so piped answers for consecutive actions are not lost.
pub struct PromptApprover<R> {
    answers: Mutex<Lines<R>>,
}

impl PromptApprover<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl<R: AsyncBufRead + Unpin + Send> PromptApprover<R> {
    pub fn new(reader: R) -> Self {
        Self { answers: Mutex::new(reader.lines()) }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Approver for PromptApprover<R> {
    async fn approve(&self, summary: &str) -> bool {
        let mut answers = self.answers.lock().await;
        let mut err = tokio::io::stderr();
        if err.write_all(format!("{summary}? [y/N] ").as_bytes()).await.is_err() {
            return false;
        }
        let _ = err.flush().await;
        match answers.next_line().await {
            Ok(Some(line)) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
            Ok(None) | Err(_) => false,
        }
    }
}

/// Wallet backed by a local keypair file and an RPC endpoint.
pub struct KeypairWallet {
    keypair: Option<Keypair>,
    rpc: RpcClient,
    approver: Arc<dyn Approver>,
    dry_run: bool,
}

impl KeypairWallet {
    pub fn new(keypair: Option<Keypair>, rpc_url: String, dry_run: bool) -> Self {
        let rpc = RpcClient::new_with_commitment(rpc_url, CommitmentConfig::confirmed());
        Self { keypair, rpc, approver: Arc::new(AutoApprove), dry_run }
    }

    /// Missing path means "not connected"; an unreadable file is an error.
    pub fn from_path(path: Option<&str>, rpc_url: String, dry_run: bool) -> anyhow::Result<Self> {
        let keypair = match path {
            Some(p) => Some(
                read_keypair_file(p).map_err(|e| anyhow::anyhow!("failed to read keypair {p}: {e}"))?,
            ),
            None => None,
        };
        Ok(Self::new(keypair, rpc_url, dry_run))
    }

    pub fn with_approver(mut self, approver: Arc<dyn Approver>) -> Self {
        self.approver = approver;
        self
    }

    fn sign(kp: &Keypair, tx: &mut SignableTransaction) -> Result<(), WalletError> {
        let me = kp.pubkey();
        let index = tx
            .required_signers()
            .iter()
            .position(|k| *k == me)
            .ok_or_else(|| WalletError::Failed(format!("{me} is not a required signer")))?;
        let sig = kp
            .try_sign_message(&tx.message_bytes())
            .map_err(|e| WalletError::Failed(e.to_string()))?;
        tx.set_signature(index, sig);
        Ok(())
    }

    async fn simulate(&self, tx: &SignableTransaction) -> Result<(), WalletError> {
        let cfg = RpcSimulateTransactionConfig {
            sig_verify: false,
            commitment: Some(CommitmentConfig::processed()),
            ..RpcSimulateTransactionConfig::default()
        };
        let sim = match tx {
            SignableTransaction::Legacy(t) => self.rpc.simulate_transaction_with_config(t, cfg).await,
            SignableTransaction::Versioned(t) => self.rpc.simulate_transaction_with_config(t, cfg).await,
        }
        .map_err(|e| WalletError::Failed(e.to_string()))?;

        if let Some(err) = sim.value.err {
            return Err(WalletError::Failed(format!("simulateTransaction failed: {err:?}")));
        }
        Ok(())
    }
}

#[async_trait]
impl Wallet for KeypairWallet {
    fn public_key(&self) -> Option<Pubkey> {
        self.keypair.as_ref().map(|k| k.pubkey())
    }

    async fn send_transaction(&self, mut tx: SignableTransaction) -> Result<String, WalletError> {
        let kp = self
            .keypair
            .as_ref()
            .ok_or_else(|| WalletError::Failed("no keypair loaded".into()))?;

        let summary = format!("sign {} transaction as {}", tx.encoding(), kp.pubkey());
        if !self.approver.approve(&summary).await {
            return Err(WalletError::UserRejected);
        }

        Self::sign(kp, &mut tx)?;
        self.simulate(&tx).await?;

        if self.dry_run {
            warn!("dry_run: simulation ok, transaction not sent");
            return Err(WalletError::Failed("dry run: simulation ok, transaction not sent".into()));
        }

        // Simulation already ran; skip the RPC's own preflight.
        let cfg = RpcSendTransactionConfig {
            skip_preflight: true,
            preflight_commitment: Some(CommitmentConfig::processed().commitment),
            ..RpcSendTransactionConfig::default()
        };
        let sig = match &tx {
            SignableTransaction::Legacy(t) => self.rpc.send_transaction_with_config(t, cfg).await,
            SignableTransaction::Versioned(t) => self.rpc.send_transaction_with_config(t, cfg).await,
        }
        .map_err(|e| WalletError::Failed(e.to_string()))?;

        info!(signature = %sig, "wallet.sent");
        Ok(sig.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solana_sdk::system_instruction;
    use solana_sdk::transaction::Transaction;

    struct Decline;

    #[async_trait]
    impl Approver for Decline {
        async fn approve(&self, _summary: &str) -> bool {
            false
        }
    }

    fn unsigned_for(payer: &Pubkey) -> SignableTransaction {
        let ix = system_instruction::transfer(payer, &Pubkey::new_unique(), 5);
        SignableTransaction::Legacy(Transaction::new_with_payer(&[ix], Some(payer)))
    }

    #[tokio::test]
    async fn no_keypair_means_not_connected() {
        let w = KeypairWallet::new(None, "http://127.0.0.1:1".into(), true);
        assert!(w.public_key().is_none());
    }

    #[test]
    fn signs_in_the_payer_slot() {
        let kp = Keypair::new();
        let mut tx = unsigned_for(&kp.pubkey());
        KeypairWallet::sign(&kp, &mut tx).unwrap();
        let sig = *tx.signature().unwrap();
        assert!(sig.verify(kp.pubkey().as_ref(), &tx.message_bytes()));
    }

    #[test]
    fn refuses_foreign_transactions() {
        let kp = Keypair::new();
        let mut tx = unsigned_for(&Pubkey::new_unique());
        assert!(matches!(KeypairWallet::sign(&kp, &mut tx), Err(WalletError::Failed(_))));
    }

    #[tokio::test]
    async fn prompt_answers_are_read_one_per_approval() {
        let approver = PromptApprover::new(&b"y\nYES\nn\n"[..]);
        assert!(approver.approve("sign stake").await);
        assert!(approver.approve("sign save").await);
        assert!(!approver.approve("sign save").await);
        // exhausted input declines
        assert!(!approver.approve("sign stake").await);
    }

    #[tokio::test]
    async fn declined_approval_is_user_rejection() {
        let kp = Keypair::new();
        let tx = unsigned_for(&kp.pubkey());
        let w = KeypairWallet::new(Some(kp), "http://127.0.0.1:1".into(), true)
            .with_approver(Arc::new(Decline));
        assert_eq!(w.send_transaction(tx).await, Err(WalletError::UserRejected));
    }
}
