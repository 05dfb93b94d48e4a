//! Ledger data provider interface
//!
//! The transfer core depends only on these four operations, never on a
//! specific provider's wire format.

use async_trait::async_trait;

use crate::errors::ProviderError;
use crate::types::{Address, AssetId, ProtocolParameters, Slot, TxId, Utxo};

#[async_trait]
pub trait LedgerProvider: Send + Sync {
    /// Unspent outputs currently held by `address`
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError>;

    async fn get_protocol_parameters(&self) -> Result<ProtocolParameters, ProviderError>;

    async fn get_current_slot(&self) -> Result<Slot, ProviderError>;

    /// Submit a signed transaction. A ledger-level refusal is `ProviderError::Rejected`.
    async fn submit_transaction(&self, raw: &[u8]) -> Result<TxId, ProviderError>;

    /// Sum of `asset` across every UTXO held by `address`
    async fn get_balance(&self, address: &Address, asset: &AssetId) -> Result<u64, ProviderError> {
        let utxos = self.get_utxos(address).await?;
        utxos
            .iter()
            .try_fold(0u64, |total, u| total.checked_add(u.amounts.get(asset)))
            .ok_or_else(|| ProviderError::Malformed {
                operation: "get_balance",
                message: format!("{} held by {} exceeds u64", asset, address),
            })
    }
}
