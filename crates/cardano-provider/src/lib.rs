//! cardano-provider: Ledger access and the end-to-end transfer flow
//!
//! This crate wraps any [`LedgerProvider`] with per-request timeouts, runs
//! bounded cancellable retries, monitors submitted transactions until they
//! are reflected on the ledger, and ties selection, building, signing and
//! confirmation together into a single transfer.

pub mod memory;
pub mod monitor;
pub mod retry;
pub mod timeout;
pub mod transfer;

pub use courier_core::LedgerProvider;
pub use memory::MemoryLedger;
pub use monitor::submit_and_confirm;
pub use retry::{execute_with_retry, Attempt, CancelContext, CancelHandle, RetryError, RetryPolicy};
pub use timeout::{RequestTimeout, DEFAULT_REQUEST_TIMEOUT};
pub use transfer::{
    create_transfer_tx, send_transaction, TransferReceipt, TransferRequest, DEFAULT_METADATA,
};
