//! Core type definitions for Courier

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AmountError;

/// Transaction ID (32-byte blake2b hash, hex-encoded)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub String);

impl TxId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the hex id back into raw hash bytes
    pub fn to_bytes(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(&self.0)
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bech32 ledger address (payment or enterprise)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: impl Into<String>) -> Self {
        Self(addr.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is a mainnet address
    pub fn is_mainnet(&self) -> bool {
        self.0.starts_with("addr1")
    }

    /// Check if this is a testnet address
    pub fn is_testnet(&self) -> bool {
        self.0.starts_with("addr_test1")
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network the transaction is built for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    /// Test network identified by its protocol magic
    Testnet { magic: u32 },
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet { .. } => "testnet",
        }
    }

    /// Protocol magic (mainnet magic is fixed)
    pub fn magic(&self) -> u32 {
        match self {
            Self::Mainnet => constants::MAINNET_MAGIC,
            Self::Testnet { magic } => *magic,
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mainnet => write!(f, "mainnet"),
            Self::Testnet { magic } => write!(f, "testnet({})", magic),
        }
    }
}

/// Absolute slot number
pub type Slot = u64;

/// Lovelace amount (1 ADA = 1_000_000 lovelace)
pub type Lovelace = u64;

// =============================================================================
// Assets
// =============================================================================

/// Asset identifier: the native coin or a token unit (policy id + asset name, hex)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AssetId {
    Lovelace,
    Token(String),
}

impl AssetId {
    pub fn token(unit: impl Into<String>) -> Self {
        Self::Token(unit.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Self::Lovelace)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Lovelace => constants::NATIVE_ASSET_UNIT,
            Self::Token(unit) => unit,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AssetId {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "" => Err(AmountError::InvalidAsset(s.to_string())),
            constants::NATIVE_ASSET_UNIT => Ok(Self::Lovelace),
            unit => Ok(Self::Token(unit.to_string())),
        }
    }
}

impl TryFrom<String> for AssetId {
    type Error = AmountError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetId> for String {
    fn from(id: AssetId) -> Self {
        match id {
            AssetId::Lovelace => constants::NATIVE_ASSET_UNIT.to_string(),
            AssetId::Token(unit) => unit,
        }
    }
}

/// Per-asset quantities. Zero entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<AssetId, u64>")]
pub struct AssetAmounts(BTreeMap<AssetId, u64>);

impl AssetAmounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Amounts holding only the native coin
    pub fn lovelace(amount: Lovelace) -> Self {
        Self::new().with(AssetId::Lovelace, amount)
    }

    /// Builder-style setter, replaces any previous quantity
    pub fn with(mut self, asset: AssetId, amount: u64) -> Self {
        self.set(asset, amount);
        self
    }

    pub fn set(&mut self, asset: AssetId, amount: u64) {
        if amount == 0 {
            self.0.remove(&asset);
        } else {
            self.0.insert(asset, amount);
        }
    }

    pub fn get(&self, asset: &AssetId) -> u64 {
        self.0.get(asset).copied().unwrap_or(0)
    }

    pub fn lovelace_amount(&self) -> Lovelace {
        self.get(&AssetId::Lovelace)
    }

    pub fn add(&mut self, asset: &AssetId, amount: u64) -> Result<(), AmountError> {
        if amount == 0 {
            return Ok(());
        }
        let current = self.get(asset);
        let total = current
            .checked_add(amount)
            .ok_or_else(|| AmountError::Overflow {
                asset: asset.to_string(),
            })?;
        self.0.insert(asset.clone(), total);
        Ok(())
    }

    /// Add every quantity of `other` into `self`
    pub fn merge(&mut self, other: &AssetAmounts) -> Result<(), AmountError> {
        for (asset, amount) in other.iter() {
            self.add(asset, amount)?;
        }
        Ok(())
    }

    /// `self - other` per asset, failing on the first asset that would go negative
    pub fn checked_sub(&self, other: &AssetAmounts) -> Result<AssetAmounts, AmountError> {
        let mut result = self.clone();
        for (asset, amount) in other.iter() {
            let have = result.get(asset);
            let remaining = have
                .checked_sub(amount)
                .ok_or_else(|| AmountError::Underflow {
                    asset: asset.to_string(),
                    have,
                    need: amount,
                })?;
            result.set(asset.clone(), remaining);
        }
        Ok(result)
    }

    /// First asset (in asset order) where `self` falls short of `required`.
    /// Returns (asset, required, available).
    pub fn first_shortfall(&self, required: &AssetAmounts) -> Option<(AssetId, u64, u64)> {
        required
            .iter()
            .find(|(asset, amount)| self.get(asset) < *amount)
            .map(|(asset, amount)| (asset.clone(), amount, self.get(asset)))
    }

    pub fn covers(&self, required: &AssetAmounts) -> bool {
        self.first_shortfall(required).is_none()
    }

    /// Only the non-native entries
    pub fn tokens(&self) -> AssetAmounts {
        Self(
            self.0
                .iter()
                .filter(|(asset, _)| !asset.is_native())
                .map(|(asset, amount)| (asset.clone(), *amount))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetId, u64)> {
        self.0.iter().map(|(asset, amount)| (asset, *amount))
    }

    pub fn assets(&self) -> impl Iterator<Item = &AssetId> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<(AssetId, u64)> for AssetAmounts {
    fn from_iter<I: IntoIterator<Item = (AssetId, u64)>>(iter: I) -> Self {
        let mut amounts = Self::new();
        for (asset, amount) in iter {
            amounts.set(asset, amount);
        }
        amounts
    }
}

impl From<BTreeMap<AssetId, u64>> for AssetAmounts {
    fn from(map: BTreeMap<AssetId, u64>) -> Self {
        map.into_iter().collect()
    }
}

// =============================================================================
// UTXOs
// =============================================================================

/// Reference to a transaction output: source tx hash + output index
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UtxoRef {
    pub tx_hash: TxId,
    pub index: u32,
}

impl UtxoRef {
    pub fn new(tx_hash: impl Into<String>, index: u32) -> Self {
        Self {
            tx_hash: TxId::new(tx_hash),
            index,
        }
    }
}

impl fmt::Display for UtxoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tx_hash, self.index)
    }
}

/// Unspent output as observed from the ledger data provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub reference: UtxoRef,
    pub amounts: AssetAmounts,
}

impl Utxo {
    pub fn new(tx_hash: impl Into<String>, index: u32, amounts: AssetAmounts) -> Self {
        Self {
            reference: UtxoRef::new(tx_hash, index),
            amounts,
        }
    }

    pub fn lovelace(&self) -> Lovelace {
        self.amounts.lovelace_amount()
    }
}

// =============================================================================
// Protocol parameters
// =============================================================================

/// Network-wide constants governing transaction validity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolParameters {
    /// Fee per transaction byte (`a` in `a * size + b`)
    pub min_fee_a: u64,
    /// Constant fee component (`b` in `a * size + b`)
    pub min_fee_b: u64,
    /// Minimum lovelace any output must carry
    pub min_utxo_value: Lovelace,
    /// Maximum serialized transaction size in bytes
    pub max_tx_size: u64,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            min_fee_a: 44,
            min_fee_b: 155_381,
            min_utxo_value: constants::MIN_UTXO_VALUE,
            max_tx_size: 16_384,
        }
    }
}

/// Constants
pub mod constants {
    use super::Lovelace;

    /// Reserved unit of the native coin
    pub const NATIVE_ASSET_UNIT: &str = "lovelace";

    /// Minimum UTXO value (1 ADA)
    pub const MIN_UTXO_VALUE: Lovelace = 1_000_000;

    /// Fee allowance reserved during input selection (0.3 ADA)
    pub const POTENTIAL_FEE: Lovelace = 300_000;

    /// Slots added to the current slot to form the TTL
    pub const DEFAULT_TTL_SLOT_OFFSET: u64 = 200;

    pub const MAINNET_MAGIC: u32 = 764_824_073;

    /// Preview testnet magic
    pub const PREVIEW_MAGIC: u32 = 2;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_network_detection() {
        let mainnet = Address::new("addr1qxs7p80zrnp0gnc32qcrn38lav86mr0xlqwma4caayesu4mqs7v6u");
        assert!(mainnet.is_mainnet());
        assert!(!mainnet.is_testnet());

        let testnet = Address::new("addr_test1vz2fxv2umyhttkxyxp8x0dlpdt3k6cwng5pxj3jhsydzer3");
        assert!(testnet.is_testnet());
        assert!(!testnet.is_mainnet());
    }

    #[test]
    fn test_network_magic() {
        assert_eq!(Network::Mainnet.magic(), constants::MAINNET_MAGIC);
        assert_eq!(Network::Testnet { magic: 2 }.magic(), 2);
        assert_eq!(Network::Testnet { magic: 2 }.as_str(), "testnet");
    }

    #[test]
    fn test_asset_id_parsing() {
        assert_eq!("lovelace".parse::<AssetId>().unwrap(), AssetId::Lovelace);
        assert_eq!(
            "abcd01".parse::<AssetId>().unwrap(),
            AssetId::token("abcd01")
        );
        assert!("".parse::<AssetId>().is_err());
    }

    #[test]
    fn test_native_coin_orders_first() {
        let amounts = AssetAmounts::new()
            .with(AssetId::token("aaa"), 5)
            .with(AssetId::Lovelace, 10);
        let first = amounts.assets().next().unwrap();
        assert_eq!(first, &AssetId::Lovelace);
    }

    #[test]
    fn test_zero_entries_pruned() {
        let mut amounts = AssetAmounts::lovelace(10);
        amounts.set(AssetId::Lovelace, 0);
        assert!(amounts.is_empty());

        let amounts = AssetAmounts::new().with(AssetId::token("t"), 0);
        assert!(amounts.is_empty());
    }

    #[test]
    fn test_add_and_merge() {
        let mut total = AssetAmounts::lovelace(100);
        total.add(&AssetId::token("t1"), 7).unwrap();
        total
            .merge(&AssetAmounts::lovelace(50).with(AssetId::token("t1"), 3))
            .unwrap();
        assert_eq!(total.lovelace_amount(), 150);
        assert_eq!(total.get(&AssetId::token("t1")), 10);
    }

    #[test]
    fn test_add_overflow() {
        let mut total = AssetAmounts::lovelace(u64::MAX);
        let err = total.add(&AssetId::Lovelace, 1).unwrap_err();
        assert!(matches!(err, AmountError::Overflow { .. }));
    }

    #[test]
    fn test_checked_sub() {
        let have = AssetAmounts::lovelace(100).with(AssetId::token("t1"), 10);
        let rest = have
            .checked_sub(&AssetAmounts::lovelace(40).with(AssetId::token("t1"), 10))
            .unwrap();
        assert_eq!(rest.lovelace_amount(), 60);
        assert_eq!(rest.len(), 1);

        let err = have.checked_sub(&AssetAmounts::lovelace(101)).unwrap_err();
        match err {
            AmountError::Underflow { asset, have, need } => {
                assert_eq!(asset, "lovelace");
                assert_eq!(have, 100);
                assert_eq!(need, 101);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_first_shortfall() {
        let have = AssetAmounts::lovelace(100).with(AssetId::token("t1"), 1);
        let required = AssetAmounts::lovelace(50).with(AssetId::token("t1"), 5);
        assert_eq!(
            have.first_shortfall(&required),
            Some((AssetId::token("t1"), 5, 1))
        );
        assert!(have.covers(&AssetAmounts::lovelace(100)));
    }

    #[test]
    fn test_tokens_excludes_native() {
        let amounts = AssetAmounts::lovelace(100).with(AssetId::token("t1"), 1);
        let tokens = amounts.tokens();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens.lovelace_amount(), 0);
    }

    #[test]
    fn test_asset_amounts_serialization() {
        let amounts = AssetAmounts::lovelace(5).with(AssetId::token("beef"), 2);
        let json = serde_json::to_string(&amounts).unwrap();
        assert_eq!(json, r#"{"lovelace":5,"beef":2}"#);
        let parsed: AssetAmounts = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, amounts);
    }

    #[test]
    fn test_deserialized_zero_entries_pruned() {
        let parsed: AssetAmounts =
            serde_json::from_str(r#"{"lovelace":5,"beef":0}"#).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed, AssetAmounts::lovelace(5));
        assert_eq!(serde_json::to_string(&parsed).unwrap(), r#"{"lovelace":5}"#);
    }

    #[test]
    fn test_utxo_ref_display() {
        let r = UtxoRef::new("ab12", 3);
        assert_eq!(r.to_string(), "ab12#3");
    }
}
