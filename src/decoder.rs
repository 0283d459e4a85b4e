//! Prepared-transaction decoding.
//!
//! The backend hands out either a legacy transaction or a versioned (v0) one,
//! base64 encoded, without saying which. Legacy is tried first; a structural
//! failure falls back to the versioned layout.

use base64::Engine as _;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::{Transaction, VersionedTransaction};

use crate::error::DecodeError;

/// High bit of the first message byte marks a versioned message.
const MESSAGE_VERSION_PREFIX: u8 = 0x80;

/// Wallet-consumable transaction in either wire shape.
#[derive(Debug, Clone, PartialEq)]
pub enum SignableTransaction {
    Legacy(Transaction),
    Versioned(VersionedTransaction),
}

impl SignableTransaction {
    pub fn encoding(&self) -> &'static str {
        match self {
            SignableTransaction::Legacy(_) => "legacy",
            SignableTransaction::Versioned(_) => "versioned",
        }
    }

    /// Accounts whose signatures the message requires, in signature order.
    pub fn required_signers(&self) -> Vec<Pubkey> {
        match self {
            SignableTransaction::Legacy(tx) => {
                let n = tx.message.header.num_required_signatures as usize;
                tx.message.account_keys.iter().take(n).copied().collect()
            }
            SignableTransaction::Versioned(tx) => {
                let n = tx.message.header().num_required_signatures as usize;
                tx.message.static_account_keys().iter().take(n).copied().collect()
            }
        }
    }

    /// Bytes a signer signs over.
    pub fn message_bytes(&self) -> Vec<u8> {
        match self {
            SignableTransaction::Legacy(tx) => tx.message_data(),
            SignableTransaction::Versioned(tx) => tx.message.serialize(),
        }
    }

    pub fn set_signature(&mut self, index: usize, signature: Signature) -> bool {
        let sigs = match self {
            SignableTransaction::Legacy(tx) => &mut tx.signatures,
            SignableTransaction::Versioned(tx) => &mut tx.signatures,
        };
        match sigs.get_mut(index) {
            Some(slot) => {
                *slot = signature;
                true
            }
            None => false,
        }
    }

    /// First signature, which is the transaction id once signed.
    pub fn signature(&self) -> Option<&Signature> {
        match self {
            SignableTransaction::Legacy(tx) => tx.signatures.first(),
            SignableTransaction::Versioned(tx) => tx.signatures.first(),
        }
    }
}

pub fn decode(encoded: &str) -> Result<SignableTransaction, DecodeError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| DecodeError::Base64(e.to_string()))?;
    decode_bytes(&bytes)
}

pub fn decode_bytes(bytes: &[u8]) -> Result<SignableTransaction, DecodeError> {
    let legacy = match parse_legacy(bytes) {
        Ok(tx) => return Ok(SignableTransaction::Legacy(tx)),
        Err(e) => e,
    };
    tracing::debug!(%legacy, "decoder.legacy_rejected");

    parse_versioned(bytes)
        .map(SignableTransaction::Versioned)
        .map_err(|versioned| DecodeError::Unrecognized { legacy, versioned })
}

fn parse_legacy(bytes: &[u8]) -> Result<Transaction, String> {
    let tx: Transaction = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
    // A v0 message can bincode-decode as garbage legacy fields; the prefix bit gives it away.
    if tx.message.header.num_required_signatures & MESSAGE_VERSION_PREFIX != 0 {
        return Err("versioned message prefix".to_string());
    }
    if tx.signatures.len() != tx.message.header.num_required_signatures as usize {
        return Err(format!(
            "{} signatures for {} required signers",
            tx.signatures.len(),
            tx.message.header.num_required_signatures
        ));
    }
    ensure_consumed(&tx, bytes.len())?;
    Ok(tx)
}

fn parse_versioned(bytes: &[u8]) -> Result<VersionedTransaction, String> {
    let tx: VersionedTransaction = bincode::deserialize(bytes).map_err(|e| e.to_string())?;
    let required = tx.message.header().num_required_signatures as usize;
    if tx.signatures.len() != required {
        return Err(format!("{} signatures for {required} required signers", tx.signatures.len()));
    }
    ensure_consumed(&tx, bytes.len())?;
    Ok(tx)
}

fn ensure_consumed<T: serde::Serialize>(tx: &T, len: usize) -> Result<(), String> {
    let used = bincode::serialized_size(tx).map_err(|e| e.to_string())? as usize;
    if used != len {
        return Err(format!("{} trailing bytes", len.saturating_sub(used)));
    }
    Ok(())
}
