//! Phase-typed transaction builder
//!
//! A build session moves through fixed phases, each a distinct type, so an
//! out-of-order call is a compile error rather than a runtime check:
//!
//! ```text
//! NeedsParameters -> Drafting -> FeeSet -> Balanced -> BuiltTx -> SignedTx
//! ```
//!
//! The session owns its [`TxCodec`] and releases it when dropped, whichever
//! phase that happens in.

use std::collections::HashSet;
use std::marker::PhantomData;

use courier_core::constants::DEFAULT_TTL_SLOT_OFFSET;
use courier_core::{
    AmountError, AssetAmounts, AssetId, LedgerProvider, Lovelace, Network, ProtocolParameters,
    ProviderError, SigningError, Slot, TxError, TxId, Utxo,
};

use crate::codec::{body_hash, tx_hash, TxBody, TxCodec};
use crate::fee::linear_fee;
use crate::output::{outputs_sum, TxOutput};
use crate::signer::{make_witness, TxSigner};
use crate::utxo_selector::utxos_sum;

/// Output index addressing the last output (the change output by convention)
pub const LAST_OUTPUT: isize = -1;

// =============================================================================
// Phases
// =============================================================================

/// Protocol parameters and TTL not yet known
#[derive(Debug)]
pub struct NeedsParameters;

/// Inputs, outputs and metadata may be added
#[derive(Debug)]
pub struct Drafting;

/// Fee fixed; outputs may still be adjusted
#[derive(Debug)]
pub struct FeeSet;

/// Output amounts final; ready to build
#[derive(Debug)]
pub struct Balanced;

// =============================================================================
// Session
// =============================================================================

struct Session<C: TxCodec> {
    codec: C,
    params: ProtocolParameters,
    ttl: Slot,
    network: Network,
    metadata: Option<Vec<u8>>,
    inputs: Vec<Utxo>,
    outputs: Vec<TxOutput>,
    fee: Lovelace,
    witness_count: usize,
}

impl<C: TxCodec> Session<C> {
    fn body(&self) -> TxBody {
        TxBody {
            inputs: self.inputs.iter().map(|u| u.reference.clone()).collect(),
            outputs: self.outputs.clone(),
            fee: self.fee,
            ttl: self.ttl,
            network_magic: self.network.magic(),
            metadata: self.metadata.as_ref().map(hex::encode),
        }
    }
}

impl<C: TxCodec> Drop for Session<C> {
    fn drop(&mut self) {
        self.codec.release();
        tracing::debug!(
            "Released transaction builder session ({} inputs, {} outputs)",
            self.inputs.len(),
            self.outputs.len()
        );
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Transaction builder in phase `S`
pub struct TxBuilder<C: TxCodec, S> {
    session: Session<C>,
    _phase: PhantomData<S>,
}

impl<C: TxCodec, S> TxBuilder<C, S> {
    fn into_phase<T>(self) -> TxBuilder<C, T> {
        TxBuilder {
            session: self.session,
            _phase: PhantomData,
        }
    }

    pub fn inputs(&self) -> &[Utxo] {
        &self.session.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.session.outputs
    }

    pub fn fee(&self) -> Lovelace {
        self.session.fee
    }

    pub fn ttl(&self) -> Slot {
        self.session.ttl
    }

    pub fn protocol_parameters(&self) -> &ProtocolParameters {
        &self.session.params
    }
}

impl<C: TxCodec> TxBuilder<C, NeedsParameters> {
    pub fn new(codec: C) -> Self {
        Self {
            session: Session {
                codec,
                params: ProtocolParameters::default(),
                ttl: 0,
                network: Network::default(),
                metadata: None,
                inputs: Vec::new(),
                outputs: Vec::new(),
                fee: 0,
                witness_count: 0,
            },
            _phase: PhantomData,
        }
    }

    /// Fetch protocol parameters and the current slot; TTL becomes
    /// `current_slot + ttl_slot_offset` (0 selects the default offset).
    pub async fn set_protocol_parameters_and_ttl<P>(
        self,
        provider: &P,
        ttl_slot_offset: u64,
    ) -> Result<TxBuilder<C, Drafting>, ProviderError>
    where
        P: LedgerProvider + ?Sized,
    {
        let params = provider.get_protocol_parameters().await?;
        let current_slot = provider.get_current_slot().await?;
        Ok(self.with_parameters(params, current_slot, ttl_slot_offset))
    }

    /// Offline variant of [`Self::set_protocol_parameters_and_ttl`]
    pub fn with_parameters(
        mut self,
        params: ProtocolParameters,
        current_slot: Slot,
        ttl_slot_offset: u64,
    ) -> TxBuilder<C, Drafting> {
        let offset = if ttl_slot_offset == 0 {
            DEFAULT_TTL_SLOT_OFFSET
        } else {
            ttl_slot_offset
        };
        self.session.params = params;
        self.session.ttl = current_slot.saturating_add(offset);
        self.into_phase()
    }
}

impl<C: TxCodec> TxBuilder<C, Drafting> {
    pub fn set_metadata(&mut self, metadata: impl Into<Vec<u8>>) -> &mut Self {
        self.session.metadata = Some(metadata.into());
        self
    }

    pub fn set_network(&mut self, network: Network) -> &mut Self {
        self.session.network = network;
        self
    }

    /// Append inputs. Nothing is added if any reference repeats.
    pub fn add_inputs(&mut self, utxos: impl IntoIterator<Item = Utxo>) -> Result<&mut Self, TxError> {
        let utxos: Vec<Utxo> = utxos.into_iter().collect();
        let mut seen: HashSet<_> = self.session.inputs.iter().map(|u| &u.reference).collect();
        for utxo in &utxos {
            if !seen.insert(&utxo.reference) {
                return Err(TxError::DuplicateInput {
                    reference: utxo.reference.to_string(),
                });
            }
        }
        self.session.inputs.extend(utxos);
        Ok(self)
    }

    pub fn add_outputs(&mut self, outputs: impl IntoIterator<Item = TxOutput>) -> &mut Self {
        self.session.outputs.extend(outputs);
        self
    }

    /// Minimum fee for the current draft once `extra_signers` witnesses are
    /// attached.
    ///
    /// Output amounts and the fee are sized at their widest encoding, so the
    /// quote does not change when the fee is set and change is balanced.
    pub fn calculate_fee(&self, extra_signers: usize) -> Result<FeeQuote, TxError> {
        let mut body = self.session.body();
        body.fee = u64::MAX;
        for output in &mut body.outputs {
            output.lovelace = u64::MAX;
        }

        let body_bytes = self.session.codec.encode_body(&body)?;
        let size = self
            .session
            .codec
            .estimate_signed_size(&body_bytes, extra_signers)?;
        let fee = linear_fee(&self.session.params, size)?;

        Ok(FeeQuote {
            fee,
            witness_count: extra_signers,
        })
    }

    /// Fix the fee. The quote's witness count bounds how many signers may
    /// sign the built transaction.
    pub fn set_fee(mut self, quote: FeeQuote) -> TxBuilder<C, FeeSet> {
        self.session.fee = quote.fee;
        self.session.witness_count = quote.witness_count;
        self.into_phase()
    }
}

/// Fee for a draft sized for a fixed number of witnesses. Only
/// [`TxBuilder::calculate_fee`] produces one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    fee: Lovelace,
    witness_count: usize,
}

impl FeeQuote {
    pub fn fee(&self) -> Lovelace {
        self.fee
    }

    pub fn witness_count(&self) -> usize {
        self.witness_count
    }

    /// Pay `fee` instead of the quoted amount. `build` still rejects a fee
    /// below what the final size requires.
    pub fn with_fee(mut self, fee: Lovelace) -> Self {
        self.fee = fee;
        self
    }
}

impl<C: TxCodec> TxBuilder<C, FeeSet> {
    /// Overwrite the lovelace of one output; `LAST_OUTPUT` addresses the last
    pub fn update_output_amount(
        mut self,
        index: isize,
        amount: Lovelace,
    ) -> Result<TxBuilder<C, Balanced>, TxError> {
        let i = resolve_output_index(index, self.session.outputs.len())?;
        self.session.outputs[i].lovelace = amount;
        Ok(self.into_phase())
    }

    /// Write `inputs - other outputs - fee` into output `index`, tokens
    /// included.
    pub fn balance_change(mut self, index: isize) -> Result<TxBuilder<C, Balanced>, TxError> {
        let i = resolve_output_index(index, self.session.outputs.len())?;

        let available = utxos_sum(&self.session.inputs)?;
        let mut required = AssetAmounts::new();
        for (j, output) in self.session.outputs.iter().enumerate() {
            if j != i {
                required.merge(&output.amounts()?)?;
            }
        }
        required.add(&AssetId::Lovelace, self.session.fee)?;

        let change = available.checked_sub(&required).map_err(|e| match e {
            AmountError::Underflow { asset, have, need } => TxError::NegativeChange {
                asset,
                available: have,
                required: need,
            },
            other => TxError::Amount(other),
        })?;

        let output = &mut self.session.outputs[i];
        output.lovelace = change.lovelace_amount();
        output.tokens = change.tokens();
        Ok(self.into_phase())
    }
}

impl<C: TxCodec> TxBuilder<C, Balanced> {
    /// Validate the final shape and encode.
    pub fn build(self) -> Result<BuiltTx<C>, TxError> {
        let session = &self.session;
        if session.inputs.is_empty() {
            return Err(TxError::EmptyInputs);
        }
        if session.outputs.is_empty() {
            return Err(TxError::EmptyOutputs);
        }

        let min = session.params.min_utxo_value;
        if let Some((index, output)) = session
            .outputs
            .iter()
            .enumerate()
            .find(|(_, o)| o.lovelace < min)
        {
            return Err(TxError::BelowMinUtxo {
                index,
                value: output.lovelace,
                min,
            });
        }

        check_conservation(session)?;

        let body_bytes = session.codec.encode_body(&session.body())?;
        let size = session
            .codec
            .estimate_signed_size(&body_bytes, session.witness_count)?;
        if size as u64 > session.params.max_tx_size {
            return Err(TxError::TooLarge {
                size: size as u64,
                max: session.params.max_tx_size,
            });
        }

        let required_fee = linear_fee(&session.params, size)?;
        if session.fee < required_fee {
            return Err(TxError::FeeTooLow {
                fee: session.fee,
                required: required_fee,
            });
        }

        let tx_id = tx_hash(&body_bytes);
        tracing::debug!(
            "Built transaction {} ({} bytes signed, fee {})",
            tx_id,
            size,
            session.fee
        );

        Ok(BuiltTx {
            session: self.session,
            body_bytes,
            tx_id,
        })
    }
}

fn resolve_output_index(index: isize, len: usize) -> Result<usize, TxError> {
    let resolved = if index == LAST_OUTPUT {
        len.checked_sub(1)
    } else {
        usize::try_from(index).ok()
    };
    resolved
        .filter(|i| *i < len)
        .ok_or(TxError::OutputIndexOutOfRange { index, len })
}

fn check_conservation<C: TxCodec>(session: &Session<C>) -> Result<(), TxError> {
    let inputs = utxos_sum(&session.inputs)?;
    let mut outputs = outputs_sum(&session.outputs)?;
    outputs.add(&AssetId::Lovelace, session.fee)?;

    for asset in inputs.assets().chain(outputs.assets()) {
        let (inp, out) = (inputs.get(asset), outputs.get(asset));
        if inp != out {
            return Err(TxError::ValueNotConserved {
                asset: asset.to_string(),
                inputs: inp,
                outputs: out,
            });
        }
    }
    Ok(())
}

// =============================================================================
// Built and signed transactions
// =============================================================================

/// Encoded, hashed, unsigned transaction
pub struct BuiltTx<C: TxCodec> {
    session: Session<C>,
    body_bytes: Vec<u8>,
    tx_id: TxId,
}

impl<C: TxCodec> BuiltTx<C> {
    pub fn tx_id(&self) -> &TxId {
        &self.tx_id
    }

    pub fn body_bytes(&self) -> &[u8] {
        &self.body_bytes
    }

    pub fn fee(&self) -> Lovelace {
        self.session.fee
    }

    /// Collect one verified witness per signer over the transaction hash.
    ///
    /// At most as many signers as the fee quote was sized for; the encoded
    /// result is re-checked against `a * size + b`.
    pub fn sign(self, signers: &[&dyn TxSigner]) -> Result<SignedTx, courier_core::Error> {
        if signers.is_empty() {
            return Err(SigningError::NoSigners.into());
        }
        if signers.len() > self.session.witness_count {
            return Err(SigningError::TooManySigners {
                signers: signers.len(),
                budgeted: self.session.witness_count,
            }
            .into());
        }

        let payload = body_hash(&self.body_bytes);
        let witnesses = signers
            .iter()
            .map(|signer| make_witness(*signer, &payload))
            .collect::<Result<Vec<_>, _>>()?;

        let raw = self
            .session
            .codec
            .encode_signed(&self.body_bytes, &witnesses)?;

        let required_fee = linear_fee(&self.session.params, raw.len()).map_err(TxError::from)?;
        if self.session.fee < required_fee {
            return Err(TxError::FeeTooLow {
                fee: self.session.fee,
                required: required_fee,
            }
            .into());
        }

        tracing::debug!(
            "Signed transaction {} with {} witnesses ({} bytes)",
            self.tx_id,
            witnesses.len(),
            raw.len()
        );

        Ok(SignedTx {
            raw,
            tx_id: self.tx_id.clone(),
        })
    }
}

/// Fully witnessed transaction, ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTx {
    pub raw: Vec<u8>,
    pub tx_id: TxId,
}
