//! In-process ledger
//!
//! `MemoryLedger` holds a UTXO set and validates submitted [`JsonCodec`]
//! transactions the way a node would: inputs must be unspent, witnesses must
//! verify, value must be conserved and the fee must cover the size. Accepted
//! transactions sit in a mempool and are applied after a configurable number
//! of reads, simulating confirmation latency.

use std::collections::HashSet;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cardano_tx::{
    body_hash, linear_fee, outputs_sum, utxos_sum, verify_witness, DecodedTx, JsonCodec,
};
use courier_core::{
    Address, AssetAmounts, AssetId, LedgerProvider, Network, ProtocolParameters, ProviderError,
    Slot, TxId, Utxo, UtxoRef,
};

struct PendingTx {
    tx: DecodedTx,
    tx_id: TxId,
    reads_remaining: u32,
}

#[derive(Default)]
struct LedgerState {
    utxos: Vec<(Address, Utxo)>,
    mempool: Vec<PendingTx>,
    slot: Slot,
    failing_reads: u32,
    confirmed: Vec<TxId>,
}

impl LedgerState {
    fn is_pending_input(&self, reference: &UtxoRef) -> bool {
        self.mempool
            .iter()
            .any(|p| p.tx.body.inputs.contains(reference))
    }

    fn find(&self, reference: &UtxoRef) -> Option<&Utxo> {
        self.utxos
            .iter()
            .map(|(_, utxo)| utxo)
            .find(|utxo| &utxo.reference == reference)
    }

    /// One read has happened: age the mempool and apply what is due
    fn tick(&mut self) {
        for pending in &mut self.mempool {
            pending.reads_remaining = pending.reads_remaining.saturating_sub(1);
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.mempool)
            .into_iter()
            .partition(|p| p.reads_remaining == 0);
        self.mempool = waiting;
        for pending in due {
            self.apply(pending);
        }
    }

    fn apply(&mut self, pending: PendingTx) {
        let spent: HashSet<&UtxoRef> = pending.tx.body.inputs.iter().collect();
        self.utxos.retain(|(_, utxo)| !spent.contains(&utxo.reference));

        for (index, output) in pending.tx.body.outputs.iter().enumerate() {
            let mut amounts = output.tokens.clone();
            amounts.set(AssetId::Lovelace, output.lovelace);
            self.utxos.push((
                output.address.clone(),
                Utxo::new(pending.tx_id.as_str(), index as u32, amounts),
            ));
        }

        tracing::info!("Ledger applied transaction {}", pending.tx_id);
        self.confirmed.push(pending.tx_id);
    }
}

/// In-memory [`LedgerProvider`] for tests and local development
pub struct MemoryLedger {
    params: ProtocolParameters,
    network: Network,
    confirmation_reads: u32,
    codec: JsonCodec,
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new(network: Network) -> Self {
        Self {
            params: ProtocolParameters::default(),
            network,
            confirmation_reads: 1,
            codec: JsonCodec::new(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn with_protocol_parameters(mut self, params: ProtocolParameters) -> Self {
        self.params = params;
        self
    }

    /// Reads after submission before a transaction is applied. 0 applies on
    /// submission; `u32::MAX` effectively never confirms.
    pub fn with_confirmation_reads(mut self, reads: u32) -> Self {
        self.confirmation_reads = reads;
        self
    }

    pub fn with_slot(mut self, slot: Slot) -> Self {
        self.state.get_mut().slot = slot;
        self
    }

    /// Seed a UTXO owned by `address`
    pub fn with_utxo(mut self, address: Address, utxo: Utxo) -> Self {
        self.state.get_mut().utxos.push((address, utxo));
        self
    }

    pub async fn advance_slot(&self, slots: Slot) {
        let mut state = self.state.lock().await;
        state.slot = state.slot.saturating_add(slots);
    }

    /// Make the next `count` reads fail with `ProviderError::Unavailable`
    pub async fn fail_next_reads(&self, count: u32) {
        self.state.lock().await.failing_reads = count;
    }

    pub async fn confirmed(&self) -> Vec<TxId> {
        self.state.lock().await.confirmed.clone()
    }

    pub async fn mempool_len(&self) -> usize {
        self.state.lock().await.mempool.len()
    }

    fn validate(&self, state: &LedgerState, tx: &DecodedTx, raw_len: usize) -> Result<(), String> {
        let body = &tx.body;
        if body.network_magic != self.network.magic() {
            return Err(format!(
                "network magic {} does not match {}",
                body.network_magic, self.network
            ));
        }
        if body.ttl < state.slot {
            return Err(format!("expired at slot {} (current {})", body.ttl, state.slot));
        }
        if body.inputs.is_empty() {
            return Err("no inputs".to_string());
        }

        let mut inputs = Vec::with_capacity(body.inputs.len());
        let mut seen = HashSet::new();
        for reference in &body.inputs {
            if !seen.insert(reference) {
                return Err(format!("input {} spent twice", reference));
            }
            if state.is_pending_input(reference) {
                return Err(format!("input {} already spent in mempool", reference));
            }
            let utxo = state
                .find(reference)
                .ok_or_else(|| format!("input {} not found or already spent", reference))?;
            inputs.push(utxo.clone());
        }

        if tx.witnesses.is_empty() {
            return Err("missing witnesses".to_string());
        }
        let payload = body_hash(&tx.body_bytes);
        for witness in &tx.witnesses {
            verify_witness(&witness.vkey, &witness.signature, &payload).map_err(|e| e.to_string())?;
        }

        for (index, output) in body.outputs.iter().enumerate() {
            if output.lovelace < self.params.min_utxo_value {
                return Err(format!("output {} below minimum UTXO value", index));
            }
        }

        let consumed = utxos_sum(&inputs).map_err(|e| e.to_string())?;
        let mut produced: AssetAmounts = outputs_sum(&body.outputs).map_err(|e| e.to_string())?;
        produced
            .add(&AssetId::Lovelace, body.fee)
            .map_err(|e| e.to_string())?;
        if consumed != produced {
            return Err("value not conserved".to_string());
        }

        let min_fee = linear_fee(&self.params, raw_len).map_err(|e| e.to_string())?;
        if body.fee < min_fee {
            return Err(format!("fee {} below minimum {}", body.fee, min_fee));
        }
        if raw_len as u64 > self.params.max_tx_size {
            return Err(format!("size {} exceeds maximum", raw_len));
        }
        Ok(())
    }

    async fn read<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&LedgerState) -> T,
    ) -> Result<T, ProviderError> {
        let mut state = self.state.lock().await;
        if state.failing_reads > 0 {
            state.failing_reads -= 1;
            return Err(ProviderError::Unavailable {
                operation,
                message: "simulated outage".to_string(),
            });
        }
        state.tick();
        Ok(f(&*state))
    }
}

#[async_trait]
impl LedgerProvider for MemoryLedger {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        self.read("get_utxos", |state| {
            state
                .utxos
                .iter()
                .filter(|(owner, _)| owner == address)
                .map(|(_, utxo)| utxo.clone())
                .collect()
        })
        .await
    }

    async fn get_protocol_parameters(&self) -> Result<ProtocolParameters, ProviderError> {
        self.read("get_protocol_parameters", |_| self.params).await
    }

    async fn get_current_slot(&self) -> Result<Slot, ProviderError> {
        self.read("get_current_slot", |state| state.slot).await
    }

    async fn submit_transaction(&self, raw: &[u8]) -> Result<TxId, ProviderError> {
        let tx = self
            .codec
            .decode_signed(raw)
            .map_err(|e| ProviderError::Rejected {
                message: e.to_string(),
            })?;

        let mut state = self.state.lock().await;
        self.validate(&state, &tx, raw.len())
            .map_err(|message| ProviderError::Rejected { message })?;

        let tx_id = tx.tx_id();
        tracing::info!("Ledger accepted transaction {} into mempool", tx_id);
        let pending = PendingTx {
            tx,
            tx_id: tx_id.clone(),
            reads_remaining: self.confirmation_reads,
        };
        if self.confirmation_reads == 0 {
            state.apply(pending);
        } else {
            state.mempool.push(pending);
        }
        Ok(tx_id)
    }
}
