//! cardano-tx: Transaction building utilities for Cardano-style ledgers
//!
//! Provides UTXO selection, the phase-typed transaction builder, the codec
//! seam and transaction signers.

pub mod builder;
pub mod codec;
pub mod fee;
pub mod output;
pub mod signer;
pub mod utxo_selector;

pub use builder::{
    Balanced, BuiltTx, Drafting, FeeQuote, FeeSet, NeedsParameters, SignedTx, TxBuilder,
    LAST_OUTPUT,
};
pub use codec::{body_hash, tx_hash, DecodedTx, JsonCodec, TxBody, TxCodec, Witness};
pub use fee::linear_fee;
pub use output::{outputs_sum, TxOutput};
pub use signer::{make_witness, verify_witness, Ed25519Signer, TxSigner};
pub use utxo_selector::{select_utxos, utxos_sum, SelectedUtxos};
