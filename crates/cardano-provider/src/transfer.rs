//! Single-payment transfer flow
//!
//! Selects sender UTXOs, pays the receiver, returns everything else (tokens
//! included) to the sender as change, signs, submits and waits for the
//! receiver's balance to reflect the payment.

use cardano_tx::{
    select_utxos, SignedTx, TxBuilder, TxCodec, TxOutput, TxSigner, LAST_OUTPUT,
};
use courier_core::{
    Address, AmountError, AssetAmounts, AssetId, Error, LedgerProvider, Lovelace, TransferConfig,
    TxError, TxId,
};

use crate::monitor::submit_and_confirm;
use crate::retry::{CancelContext, RetryPolicy};

/// Metadata attached when the request carries none
pub const DEFAULT_METADATA: &str = r#"{"0":{"type":"single"}}"#;

/// A native-coin payment from `sender` to `receiver`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub sender: Address,
    pub receiver: Address,
    pub amount: Lovelace,
    pub metadata: Option<Vec<u8>>,
}

impl TransferRequest {
    pub fn new(sender: Address, receiver: Address, amount: Lovelace) -> Self {
        Self {
            sender,
            receiver,
            amount,
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }
}

/// Outcome of a confirmed transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    pub tx_id: TxId,
    pub fee: Lovelace,
    /// Receiver's native-coin balance once the payment was observed
    pub receiver_balance: u64,
}

/// Build and sign the transfer described by `request`.
pub async fn create_transfer_tx<P, C>(
    provider: &P,
    codec: C,
    signer: &dyn TxSigner,
    request: &TransferRequest,
    config: &TransferConfig,
) -> Result<(SignedTx, Lovelace), Error>
where
    P: LedgerProvider + ?Sized,
    C: TxCodec,
{
    config.validate()?;

    let mut builder = TxBuilder::new(codec)
        .set_protocol_parameters_and_ttl(provider, config.ttl_slot_offset)
        .await?;
    let min_utxo = builder.protocol_parameters().min_utxo_value;

    let utxos = provider.get_utxos(&request.sender).await?;
    let target = request
        .amount
        .checked_add(config.potential_fee)
        .and_then(|v| v.checked_add(min_utxo))
        .ok_or_else(|| {
            TxError::Amount(AmountError::Overflow {
                asset: AssetId::Lovelace.to_string(),
            })
        })?;

    let selected = select_utxos(
        &utxos,
        &AssetAmounts::lovelace(target),
        config.max_inputs_considered,
        config.min_desired_inputs,
    )?;
    tracing::info!(
        "Selected {} of {} UTXOs holding {} lovelace for transfer of {} to {}",
        selected.len(),
        utxos.len(),
        selected.sum.lovelace_amount(),
        request.amount,
        request.receiver
    );

    let metadata = request
        .metadata
        .clone()
        .unwrap_or_else(|| DEFAULT_METADATA.as_bytes().to_vec());
    let change = TxOutput::change(request.sender.clone(), selected.sum.clone());
    builder
        .set_metadata(metadata)
        .set_network(config.network)
        .add_inputs(selected.utxos)?
        .add_outputs(vec![
            TxOutput::new(request.receiver.clone(), request.amount),
            change,
        ]);

    let quote = builder.calculate_fee(1)?;
    let fee = quote.fee();
    let built = builder.set_fee(quote).balance_change(LAST_OUTPUT)?.build()?;
    tracing::info!("Built transfer {} with fee {}", built.tx_id(), fee);

    let signed = built.sign(&[signer])?;
    Ok((signed, fee))
}

/// Create, submit and confirm a transfer.
pub async fn send_transaction<P, C>(
    ctx: &CancelContext,
    provider: &P,
    codec: C,
    signer: &dyn TxSigner,
    request: &TransferRequest,
    config: &TransferConfig,
) -> Result<TransferReceipt, Error>
where
    P: LedgerProvider + ?Sized,
    C: TxCodec,
{
    let (signed, fee) = create_transfer_tx(provider, codec, signer, request, config).await?;

    let policy = RetryPolicy::from(&config.confirmation);
    let receiver_balance = submit_and_confirm(
        ctx,
        provider,
        &signed,
        &request.receiver,
        &AssetId::Lovelace,
        request.amount,
        &policy,
    )
    .await?;

    Ok(TransferReceipt {
        tx_id: signed.tx_id,
        fee,
        receiver_balance,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryLedger;
    use cardano_tx::{Ed25519Signer, JsonCodec};
    use courier_core::{ErrorKind, Network, Utxo};

    const SECRET_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";

    fn sender() -> Address {
        Address::new("addr_test1sender")
    }

    fn receiver() -> Address {
        Address::new("addr_test1receiver")
    }

    fn mock_config() -> TransferConfig {
        TransferConfig {
            network: Network::Testnet { magic: 2 },
            ..TransferConfig::default()
        }
    }

    fn funded_ledger(utxos: Vec<Utxo>) -> MemoryLedger {
        utxos.into_iter().fold(
            MemoryLedger::new(Network::Testnet { magic: 2 })
                .with_slot(10_000)
                .with_confirmation_reads(3),
            |ledger, utxo| ledger.with_utxo(sender(), utxo),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_transaction_confirms() {
        let ledger = funded_ledger(vec![Utxo::new("aa", 0, AssetAmounts::lovelace(5_000_000))]);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000);

        let receipt = send_transaction(
            &CancelContext::never(),
            &ledger,
            JsonCodec::new(),
            &signer,
            &request,
            &mock_config(),
        )
        .await
        .unwrap();

        assert_eq!(receipt.receiver_balance, 2_000_000);
        assert_eq!(ledger.confirmed().await, vec![receipt.tx_id.clone()]);

        let change = ledger.get_utxos(&sender()).await.unwrap();
        assert_eq!(change.len(), 1);
        assert_eq!(change[0].lovelace(), 5_000_000 - 2_000_000 - receipt.fee);
    }

    #[tokio::test]
    async fn test_change_carries_tokens() {
        let ledger = funded_ledger(vec![
            Utxo::new("aa", 0, AssetAmounts::lovelace(1_500_000).with(AssetId::token("tokenA"), 9)),
            Utxo::new("bb", 1, AssetAmounts::lovelace(4_000_000)),
        ]);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000)
            .with_metadata(br#"{"0":{"type":"gift"}}"#.to_vec());

        let (signed, fee) =
            create_transfer_tx(&ledger, JsonCodec::new(), &signer, &request, &mock_config())
                .await
                .unwrap();

        let decoded = JsonCodec::new().decode_signed(&signed.raw).unwrap();
        assert_eq!(decoded.body.inputs.len(), 2);
        assert_eq!(decoded.body.fee, fee);
        assert_eq!(decoded.body.ttl, 10_200);
        assert_eq!(
            decoded.body.metadata,
            Some(hex::encode(br#"{"0":{"type":"gift"}}"#))
        );

        let change = &decoded.body.outputs[1];
        assert_eq!(change.address, sender());
        assert_eq!(change.lovelace, 5_500_000 - 2_000_000 - fee);
        assert_eq!(change.tokens.get(&AssetId::token("tokenA")), 9);
    }

    #[tokio::test]
    async fn test_default_metadata() {
        let ledger = funded_ledger(vec![Utxo::new("aa", 0, AssetAmounts::lovelace(5_000_000))]);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000);

        let (signed, _) =
            create_transfer_tx(&ledger, JsonCodec::new(), &signer, &request, &mock_config())
                .await
                .unwrap();
        let decoded = JsonCodec::new().decode_signed(&signed.raw).unwrap();
        assert_eq!(
            decoded.body.metadata,
            Some(hex::encode(DEFAULT_METADATA.as_bytes()))
        );
    }

    #[tokio::test]
    async fn test_insufficient_funds_submits_nothing() {
        let ledger = funded_ledger(vec![Utxo::new("aa", 0, AssetAmounts::lovelace(1_000_000))]);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000);

        let err = send_transaction(
            &CancelContext::never(),
            &ledger,
            JsonCodec::new(),
            &signer,
            &request,
            &mock_config(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        match err {
            Error::Selection(courier_core::SelectionError::InsufficientFunds {
                asset,
                required,
                available,
                ..
            }) => {
                assert_eq!(asset, AssetId::Lovelace);
                assert_eq!(required, 3_300_000);
                assert_eq!(available, 1_000_000);
            }
            other => panic!("Wrong error type: {:?}", other),
        }
        assert_eq!(ledger.mempool_len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unconfirmed_transfer_times_out() {
        let ledger = funded_ledger(vec![Utxo::new("aa", 0, AssetAmounts::lovelace(5_000_000))])
            .with_confirmation_reads(u32::MAX);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000);

        let err = send_transaction(
            &CancelContext::never(),
            &ledger,
            JsonCodec::new(),
            &signer,
            &request,
            &mock_config(),
        )
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfirmationTimeout);
        assert!(matches!(err, Error::ConfirmationTimeout { attempts: 60, .. }));
        assert_eq!(ledger.mempool_len().await, 1);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected() {
        let ledger = funded_ledger(vec![Utxo::new("aa", 0, AssetAmounts::lovelace(5_000_000))]);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000);
        let config = TransferConfig {
            max_inputs_considered: 0,
            ..mock_config()
        };

        let err = create_transfer_tx(&ledger, JsonCodec::new(), &signer, &request, &config)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn test_provider_outage_surfaces_unavailable() {
        let ledger = funded_ledger(vec![Utxo::new("aa", 0, AssetAmounts::lovelace(5_000_000))]);
        let signer = Ed25519Signer::from_hex(SECRET_HEX).unwrap();
        let request = TransferRequest::new(sender(), receiver(), 2_000_000);
        ledger.fail_next_reads(1).await;

        let err = create_transfer_tx(&ledger, JsonCodec::new(), &signer, &request, &mock_config())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProviderUnavailable);
        assert!(err.is_transient());
        assert_eq!(ledger.mempool_len().await, 0);
    }
}
