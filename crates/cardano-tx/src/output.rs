//! Transaction outputs

use serde::{Deserialize, Serialize};

use courier_core::{Address, AmountError, AssetAmounts, AssetId, Lovelace};

/// Transaction output: destination, lovelace, and optional tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOutput {
    pub address: Address,
    pub lovelace: Lovelace,
    #[serde(default, skip_serializing_if = "AssetAmounts::is_empty")]
    pub tokens: AssetAmounts,
}

impl TxOutput {
    /// Create a simple lovelace-only output
    pub fn new(address: Address, lovelace: Lovelace) -> Self {
        Self {
            address,
            lovelace,
            tokens: AssetAmounts::new(),
        }
    }

    /// Create a change output carrying `tokens`; its lovelace is written
    /// once the fee is known.
    pub fn change(address: Address, tokens: AssetAmounts) -> Self {
        Self {
            address,
            lovelace: 0,
            tokens: tokens.tokens(),
        }
    }

    /// Attach tokens. Any native-coin entry in `tokens` is ignored.
    pub fn with_tokens(mut self, tokens: AssetAmounts) -> Self {
        self.tokens = tokens.tokens();
        self
    }

    /// All assets carried, lovelace included
    pub fn amounts(&self) -> Result<AssetAmounts, AmountError> {
        let mut amounts = self.tokens.clone();
        amounts.add(&AssetId::Lovelace, self.lovelace)?;
        Ok(amounts)
    }
}

/// Sum every asset across `outputs`
pub fn outputs_sum(outputs: &[TxOutput]) -> Result<AssetAmounts, AmountError> {
    let mut sum = AssetAmounts::new();
    for output in outputs {
        sum.merge(&output.amounts()?)?;
    }
    Ok(sum)
}
