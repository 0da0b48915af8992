//! Signing key management and transaction signing.
//!
//! # Security
//! - Private keys are loaded ONLY from environment variables
//! - Keys are never logged or serialized
//! - This is the only component that signs or broadcasts

use alloy::network::{Ethereum, EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, TxHash};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;

use crate::blockchain::client::ChainClient;
use crate::blockchain::types::{BlockchainError, BlockchainResult};

/// Holds the single signing key used for every write path.
#[derive(Clone)]
pub struct SignerContext {
    /// The underlying signer (private key).
    signer: PrivateKeySigner,
    /// Network wallet wrapping the same key.
    wallet: EthereumWallet,
    /// Chain ID for EIP-155 replay protection.
    chain_id: u64,
}

impl SignerContext {
    /// Create a signer from a hex-encoded private key string.
    ///
    /// # Arguments
    /// * `private_key_hex` - Hex string (with or without 0x prefix)
    /// * `chain_id` - Chain ID for transaction signing
    pub fn from_private_key(private_key_hex: &str, chain_id: u64) -> BlockchainResult<Self> {
        let trimmed = private_key_hex.trim();
        if trimmed.is_empty() {
            return Err(BlockchainError::Configuration(
                "private key is required".to_string(),
            ));
        }
        let key_hex = trimmed.strip_prefix("0x").unwrap_or(trimmed);

        let signer: PrivateKeySigner = key_hex.parse().map_err(|e| {
            BlockchainError::Configuration(format!("Invalid private key format: {}", e))
        })?;
        let signer = signer.with_chain_id(Some(chain_id));

        tracing::info!(
            address = %signer.address(),
            chain_id = chain_id,
            "Signer initialized"
        );

        Ok(Self {
            wallet: EthereumWallet::from(signer.clone()),
            signer,
            chain_id,
        })
    }

    /// Create a signer bound to the client's chain.
    pub fn init(private_key_hex: &str, client: &ChainClient) -> BlockchainResult<Self> {
        Self::from_private_key(private_key_hex, client.chain_id())
    }

    /// Get the signer's address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Get the chain ID this signer is configured for.
    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign a fully specified request and broadcast it.
    ///
    /// The request must already carry nonce, gas limit and fee fields.
    pub async fn sign_and_send(
        &self,
        client: &ChainClient,
        request: TransactionRequest,
    ) -> BlockchainResult<TxHash> {
        let request = request
            .with_from(self.address())
            .with_chain_id(self.chain_id);

        let envelope = <TransactionRequest as TransactionBuilder<Ethereum>>::build(
            request,
            &self.wallet,
        )
        .await
        .map_err(|e| BlockchainError::Signer(format!("Signing failed: {}", e)))?;

        client.broadcast(envelope).await
    }
}

impl std::fmt::Debug for SignerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignerContext")
            .field("address", &self.address())
            .field("chain_id", &self.chain_id)
            .finish_non_exhaustive()
    }
}
