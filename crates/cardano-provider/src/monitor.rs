//! Submission and confirmation monitoring
//!
//! A transaction counts as confirmed once the watched address holds at least
//! `baseline + expected_increment` of the watched asset.

use std::convert::Infallible;

use cardano_tx::SignedTx;
use courier_core::{Address, AmountError, AssetId, Error, LedgerProvider, TxError};

use crate::retry::{execute_with_retry, Attempt, CancelContext, RetryError, RetryPolicy};

/// Submit `signed` and poll until the watched balance reflects it.
///
/// Submission is attempted exactly once; a refusal is returned as-is. Failed
/// balance reads during polling are retried. Cancellation interrupts the
/// baseline read and polling, and skips submission if it arrives first.
/// Returns the observed balance.
pub async fn submit_and_confirm<P>(
    ctx: &CancelContext,
    provider: &P,
    signed: &SignedTx,
    watched_address: &Address,
    watched_asset: &AssetId,
    expected_increment: u64,
    policy: &RetryPolicy,
) -> Result<u64, Error>
where
    P: LedgerProvider + ?Sized,
{
    if ctx.is_cancelled() {
        return Err(Error::Cancelled { attempts: 0 });
    }

    let baseline = tokio::select! {
        biased;
        _ = ctx.cancelled() => return Err(Error::Cancelled { attempts: 0 }),
        balance = provider.get_balance(watched_address, watched_asset) => balance?,
    };
    let expected_at_least = baseline.checked_add(expected_increment).ok_or_else(|| {
        TxError::Amount(AmountError::Overflow {
            asset: watched_asset.to_string(),
        })
    })?;

    // an in-flight submission is not abandoned
    if ctx.is_cancelled() {
        return Err(Error::Cancelled { attempts: 0 });
    }
    let tx_id = provider.submit_transaction(&signed.raw).await?;
    if tx_id != signed.tx_id {
        tracing::warn!(
            "Provider reported tx id {} for transaction {}",
            tx_id,
            signed.tx_id
        );
    }
    tracing::info!(
        "Submitted transaction {}, waiting for {} {} at {} (baseline {})",
        tx_id,
        expected_at_least,
        watched_asset,
        watched_address,
        baseline
    );

    let result = execute_with_retry(ctx, policy, |attempt| async move {
        match provider.get_balance(watched_address, watched_asset).await {
            Ok(balance) if balance >= expected_at_least => Attempt::Done(balance),
            Ok(balance) => {
                tracing::debug!(
                    "Confirmation poll {}: balance {} below {}",
                    attempt,
                    balance,
                    expected_at_least
                );
                Attempt::Retry
            }
            Err(e) => {
                tracing::warn!("Confirmation poll {} failed: {}", attempt, e);
                Attempt::<u64, Infallible>::Retry
            }
        }
    })
    .await;

    match result {
        Ok(balance) => {
            tracing::info!("Transaction {} confirmed, balance {}", tx_id, balance);
            Ok(balance)
        }
        Err(RetryError::Exhausted { attempts }) => {
            tracing::warn!(
                "Transaction {} not confirmed after {} polls",
                tx_id,
                attempts
            );
            Err(Error::ConfirmationTimeout { tx_id, attempts })
        }
        Err(RetryError::Cancelled { attempts }) => Err(Error::Cancelled { attempts }),
        Err(RetryError::Fatal(never)) => match never {},
    }
}
