//! Per-request deadline for any [`LedgerProvider`]

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use courier_core::{
    Address, AssetId, LedgerProvider, ProtocolParameters, ProviderConfig, ProviderError, Slot, TxId,
    Utxo,
};

/// Default timeout for provider calls (30 seconds)
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Wraps a provider so every call fails with [`ProviderError::Timeout`] once
/// it runs past the deadline.
#[derive(Debug, Clone)]
pub struct RequestTimeout<P> {
    inner: P,
    timeout: Duration,
}

impl<P> RequestTimeout<P> {
    pub fn new(inner: P, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn from_config(inner: P, config: &ProviderConfig) -> Self {
        Self::new(inner, Duration::from_secs(config.request_timeout_secs))
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        fut: impl Future<Output = Result<T, ProviderError>>,
    ) -> Result<T, ProviderError> {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| ProviderError::Timeout {
                operation,
                secs: self.timeout.as_secs(),
            })?
    }
}

#[async_trait]
impl<P: LedgerProvider> LedgerProvider for RequestTimeout<P> {
    async fn get_utxos(&self, address: &Address) -> Result<Vec<Utxo>, ProviderError> {
        self.timed("get_utxos", self.inner.get_utxos(address)).await
    }

    async fn get_protocol_parameters(&self) -> Result<ProtocolParameters, ProviderError> {
        self.timed("get_protocol_parameters", self.inner.get_protocol_parameters())
            .await
    }

    async fn get_current_slot(&self) -> Result<Slot, ProviderError> {
        self.timed("get_current_slot", self.inner.get_current_slot())
            .await
    }

    async fn submit_transaction(&self, raw: &[u8]) -> Result<TxId, ProviderError> {
        self.timed("submit_transaction", self.inner.submit_transaction(raw))
            .await
    }

    async fn get_balance(&self, address: &Address, asset: &AssetId) -> Result<u64, ProviderError> {
        self.timed("get_balance", self.inner.get_balance(address, asset))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowProvider {
        delay: Duration,
    }

    #[async_trait]
    impl LedgerProvider for SlowProvider {
        async fn get_utxos(&self, _address: &Address) -> Result<Vec<Utxo>, ProviderError> {
            tokio::time::sleep(self.delay).await;
            Ok(Vec::new())
        }

        async fn get_protocol_parameters(&self) -> Result<ProtocolParameters, ProviderError> {
            Ok(ProtocolParameters::default())
        }

        async fn get_current_slot(&self) -> Result<Slot, ProviderError> {
            tokio::time::sleep(self.delay).await;
            Ok(42)
        }

        async fn submit_transaction(&self, _raw: &[u8]) -> Result<TxId, ProviderError> {
            Err(ProviderError::Rejected {
                message: "bad witness".to_string(),
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let provider = RequestTimeout::new(
            SlowProvider {
                delay: Duration::from_secs(60),
            },
            DEFAULT_REQUEST_TIMEOUT,
        );

        let err = provider.get_current_slot().await.unwrap_err();
        assert!(matches!(
            err,
            ProviderError::Timeout {
                operation: "get_current_slot",
                secs: 30
            }
        ));

        let err = provider
            .get_balance(&Address::new("addr_test1a"), &AssetId::Lovelace)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Timeout { operation: "get_balance", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fast_call_passes_through() {
        let provider = RequestTimeout::from_config(
            SlowProvider {
                delay: Duration::from_secs(1),
            },
            &ProviderConfig::default(),
        );

        assert_eq!(provider.get_current_slot().await.unwrap(), 42);
        assert!(matches!(
            provider.submit_transaction(b"tx").await,
            Err(ProviderError::Rejected { .. })
        ));
    }
}
