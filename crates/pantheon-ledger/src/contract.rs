use std::time::Duration;

use alloy::primitives::utils::format_ether;
use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::signers::local::PrivateKeySigner;
use alloy::sol;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pantheon_models::{DebateEntry, DebateRecord, LedgerReceipt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::LedgerError;
use crate::ledger::Ledger;

sol! {
    #[sol(rpc)]
    contract PantheonCouncil {
        struct Debate {
            uint256 id;
            uint256 timestamp;
            string symbol;
            string analystView;
            string skepticView;
            string degenView;
            string consensus;
            uint256 finalConfidence;
            address recorder;
        }

        function recordDebate(
            string memory symbol,
            string memory analystView,
            string memory skepticView,
            string memory degenView,
            string memory consensus,
            uint256 finalConfidence
        ) external;

        function getTotalDebates() external view returns (uint256);

        function getLatestDebate() external view returns (Debate memory);

        function getDebate(uint256 id) external view returns (Debate memory);
    }
}

/// Connectivity report for operators.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerHealth {
    pub chain_id: u64,
    pub contract: String,
    pub total_debates: u64,
    pub signer: Option<String>,
    /// Signer balance in the chain's native token.
    pub balance: Option<String>,
}

/// `PantheonCouncil` contract reached over JSON-RPC.
pub struct ContractLedger {
    contract: PantheonCouncil::PantheonCouncilInstance<DynProvider>,
    provider: DynProvider,
    signer: Option<Address>,
    confirmation_timeout: Duration,
}

impl ContractLedger {
    /// Connect to a deployed contract. Without a private key the ledger can
    /// only be read.
    pub fn connect(
        rpc_url: &str,
        contract_address: &str,
        private_key: Option<&SecretString>,
        confirmation_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| LedgerError::Config(format!("invalid RPC url {rpc_url}: {e}")))?;
        let address: Address = contract_address.parse().map_err(|e| {
            LedgerError::Config(format!("invalid contract address {contract_address}: {e}"))
        })?;

        let (provider, signer) = match private_key {
            Some(key) => {
                let wallet: PrivateKeySigner = key
                    .expose_secret()
                    .trim()
                    .parse()
                    .map_err(|e| LedgerError::Config(format!("invalid private key: {e}")))?;
                let signer = wallet.address();
                let provider = ProviderBuilder::new()
                    .wallet(wallet)
                    .connect_http(url)
                    .erased();
                (provider, Some(signer))
            }
            None => (ProviderBuilder::new().connect_http(url).erased(), None),
        };

        info!(
            rpc = %rpc_url,
            contract = %address,
            signer = ?signer,
            "Connected to PantheonCouncil"
        );

        Ok(Self {
            contract: PantheonCouncil::new(address, provider.clone()),
            provider,
            signer,
            confirmation_timeout,
        })
    }

    pub fn signer(&self) -> Option<Address> {
        self.signer
    }

    pub async fn health(&self) -> Result<LedgerHealth, LedgerError> {
        let chain_id = self
            .provider
            .get_chain_id()
            .await
            .map_err(|e| LedgerError::Rpc(format!("eth_chainId: {e}")))?;
        let total_debates = self.total_debates().await?;

        let balance = match self.signer {
            Some(address) => {
                let wei = self
                    .provider
                    .get_balance(address)
                    .await
                    .map_err(|e| LedgerError::Rpc(format!("eth_getBalance: {e}")))?;
                Some(format_ether(wei))
            }
            None => None,
        };

        Ok(LedgerHealth {
            chain_id,
            contract: self.contract.address().to_string(),
            total_debates,
            signer: self.signer.map(|a| a.to_string()),
            balance,
        })
    }
}

#[async_trait]
impl Ledger for ContractLedger {
    fn name(&self) -> &str {
        "contract"
    }

    async fn record_debate(&self, entry: &DebateEntry) -> Result<LedgerReceipt, LedgerError> {
        if self.signer.is_none() {
            return Err(LedgerError::ReadOnly);
        }

        let pending = self
            .contract
            .recordDebate(
                entry.symbol.clone(),
                entry.analyst_view.clone(),
                entry.skeptic_view.clone(),
                entry.degen_view.clone(),
                entry.consensus.clone(),
                U256::from(entry.final_confidence),
            )
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(format!("recordDebate: {e}")))?;

        let tx_hash = *pending.tx_hash();
        info!(tx = %tx_hash, "Debate transaction sent, awaiting confirmation");

        let receipt = pending
            .with_timeout(Some(self.confirmation_timeout))
            .get_receipt()
            .await
            .map_err(|e| LedgerError::Rpc(format!("confirmation of {tx_hash}: {e}")))?;

        if !receipt.status() {
            warn!(tx = %tx_hash, "Debate transaction reverted");
            return Err(LedgerError::Reverted(tx_hash.to_string()));
        }

        info!(
            tx = %tx_hash,
            block = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "Debate confirmed"
        );

        Ok(LedgerReceipt {
            tx_hash: tx_hash.to_string(),
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
        })
    }

    async fn total_debates(&self) -> Result<u64, LedgerError> {
        let total = self
            .contract
            .getTotalDebates()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(format!("getTotalDebates: {e}")))?;
        to_u64("total", total)
    }

    async fn debate(&self, id: u64) -> Result<DebateRecord, LedgerError> {
        debug!(id, "Reading debate from contract");
        let debate = self
            .contract
            .getDebate(U256::from(id))
            .call()
            .await
            .map_err(|e| {
                let message = e.to_string();
                if message.contains("revert") {
                    LedgerError::NotFound(id)
                } else {
                    LedgerError::Rpc(format!("getDebate({id}): {message}"))
                }
            })?;
        into_record(debate)
    }

    async fn latest_debate(&self) -> Result<Option<DebateRecord>, LedgerError> {
        if self.total_debates().await? == 0 {
            return Ok(None);
        }
        let debate = self
            .contract
            .getLatestDebate()
            .call()
            .await
            .map_err(|e| LedgerError::Rpc(format!("getLatestDebate: {e}")))?;
        into_record(debate).map(Some)
    }
}

fn into_record(debate: PantheonCouncil::Debate) -> Result<DebateRecord, LedgerError> {
    let seconds = to_u64("timestamp", debate.timestamp)?;
    let timestamp = i64::try_from(seconds)
        .ok()
        .and_then(|s| DateTime::<Utc>::from_timestamp(s, 0))
        .ok_or_else(|| LedgerError::Decode(format!("timestamp {seconds} out of range")))?;

    Ok(DebateRecord {
        id: to_u64("id", debate.id)?,
        timestamp,
        symbol: debate.symbol,
        analyst_view: debate.analystView,
        skeptic_view: debate.skepticView,
        degen_view: debate.degenView,
        consensus: debate.consensus,
        final_confidence: to_u64("finalConfidence", debate.finalConfidence)?,
        recorder: debate.recorder.to_string(),
    })
}

fn to_u64(field: &str, value: U256) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::Decode(format!("{field} {value} overflows u64")))
}
