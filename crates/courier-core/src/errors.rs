//! Error types for Courier

use thiserror::Error;

use crate::types::{AssetId, TxId};

/// Core errors that can occur in Courier
#[derive(Debug, Error)]
pub enum Error {
    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] TxError),

    #[error("Signing error: {0}")]
    Signing(#[from] SigningError),

    #[error("Transaction {tx_id} not confirmed after {attempts} attempts")]
    ConfirmationTimeout { tx_id: TxId, attempts: u32 },

    #[error("Cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Checked asset arithmetic errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    #[error("Amount overflow for {asset}")]
    Overflow { asset: String },

    #[error("Amount underflow for {asset}: have {have}, need {need}")]
    Underflow { asset: String, have: u64, need: u64 },

    #[error("Invalid asset identifier: {0:?}")]
    InvalidAsset(String),
}

/// UTXO selection errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Insufficient {asset}: need {required}, have {available} across {scanned} scanned UTXOs")]
    InsufficientFunds {
        asset: AssetId,
        required: u64,
        available: u64,
        scanned: usize,
    },

    #[error(transparent)]
    Amount(#[from] AmountError),
}

/// Ledger data provider errors
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable during {operation}: {message}")]
    Unavailable {
        operation: &'static str,
        message: String,
    },

    #[error("Provider request {operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    #[error("Transaction rejected by ledger: {message}")]
    Rejected { message: String },

    #[error("Malformed provider response to {operation}: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

/// Transaction shape errors raised while building
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxError {
    #[error("No inputs provided")]
    EmptyInputs,

    #[error("No outputs provided")]
    EmptyOutputs,

    #[error("Duplicate input {reference}")]
    DuplicateInput { reference: String },

    #[error("Output index {index} out of range ({len} outputs)")]
    OutputIndexOutOfRange { index: isize, len: usize },

    #[error("Negative change for {asset}: inputs carry {available}, outputs and fee need {required}")]
    NegativeChange {
        asset: String,
        available: u64,
        required: u64,
    },

    #[error("Output {index} value {value} lovelace is below minimum UTXO value of {min} lovelace")]
    BelowMinUtxo { index: usize, value: u64, min: u64 },

    #[error("Value not conserved for {asset}: inputs {inputs}, outputs plus fee {outputs}")]
    ValueNotConserved {
        asset: String,
        inputs: u64,
        outputs: u64,
    },

    #[error("Fee {fee} lovelace is below the required minimum of {required} lovelace")]
    FeeTooLow { fee: u64, required: u64 },

    #[error("Transaction size {size} bytes exceeds maximum of {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error(transparent)]
    Amount(#[from] AmountError),

    #[error("Failed to encode transaction: {message}")]
    Encoding { message: String },
}

/// Witness production errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SigningError {
    #[error("No signers provided")]
    NoSigners,

    #[error("Invalid signing key: {message}")]
    InvalidKey { message: String },

    #[error("{signers} signers exceed the {budgeted} witnesses the fee was sized for")]
    TooManySigners { signers: usize, budgeted: usize },

    #[error("Signature from {signer} does not verify against the transaction hash")]
    VerificationFailed { signer: String },
}

/// Result type alias for Courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Programmatic classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InsufficientFunds,
    ProviderUnavailable,
    InvalidTransactionShape,
    SigningFailure,
    SubmissionRejected,
    ConfirmationTimeout,
    Cancelled,
    Configuration,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Selection(SelectionError::InsufficientFunds { .. }) => {
                ErrorKind::InsufficientFunds
            }
            Self::Selection(SelectionError::Amount(_)) => ErrorKind::InvalidTransactionShape,
            Self::Provider(ProviderError::Rejected { .. }) => ErrorKind::SubmissionRejected,
            Self::Provider(_) => ErrorKind::ProviderUnavailable,
            Self::Transaction(_) => ErrorKind::InvalidTransactionShape,
            Self::Signing(_) => ErrorKind::SigningFailure,
            Self::ConfirmationTimeout { .. } => ErrorKind::ConfirmationTimeout,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::Config(_) => ErrorKind::Configuration,
        }
    }

    /// Get a stable, machine-friendly error code
    pub fn error_code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InsufficientFunds => "insufficient_funds",
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::InvalidTransactionShape => "invalid_transaction_shape",
            ErrorKind::SigningFailure => "signing_failure",
            ErrorKind::SubmissionRejected => "submission_rejected",
            ErrorKind::ConfirmationTimeout => "confirmation_timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Configuration => "configuration",
        }
    }

    /// Whether the same request may succeed later without changes
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Provider(ProviderError::Unavailable { .. } | ProviderError::Timeout { .. })
                | Self::ConfirmationTimeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err: Error = SelectionError::InsufficientFunds {
            asset: AssetId::Lovelace,
            required: 2_000_000,
            available: 900_000,
            scanned: 3,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
        assert_eq!(err.error_code(), "insufficient_funds");
        assert!(!err.is_transient());

        let err: Error = ProviderError::Timeout {
            operation: "get_utxos",
            secs: 30,
        }
        .into();
        assert_eq!(err.error_code(), "provider_unavailable");
        assert!(err.is_transient());
    }

    #[test]
    fn test_rejection_distinct_from_timeout() {
        let rejected: Error = ProviderError::Rejected {
            message: "BadInputsUTxO".into(),
        }
        .into();
        let timeout = Error::ConfirmationTimeout {
            tx_id: TxId::new("ab"),
            attempts: 60,
        };
        assert_eq!(rejected.kind(), ErrorKind::SubmissionRejected);
        assert_eq!(timeout.kind(), ErrorKind::ConfirmationTimeout);
        assert_ne!(rejected.error_code(), timeout.error_code());
    }

    #[test]
    fn test_insufficient_funds_names_asset() {
        let err = SelectionError::InsufficientFunds {
            asset: AssetId::Lovelace,
            required: 2_000_000,
            available: 900_000,
            scanned: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("lovelace"));
        assert!(msg.contains("2000000"));
        assert!(msg.contains("900000"));
    }
}
