//! Transaction signers
//!
//! Signing is polymorphic over [`TxSigner`]; witnesses on this ledger are
//! Ed25519 verification key + signature pairs.

use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey, SECRET_KEY_LENGTH};

use courier_core::SigningError;

use crate::codec::Witness;

/// CBOR byte-string header (`0x58 0x20`) prefixed to 32-byte keys in
/// `cardano-cli` key files
const CBOR_KEY_PREFIX: &str = "5820";

/// Anything that can sign a transaction hash
pub trait TxSigner: Send + Sync {
    /// Raw verification key bytes
    fn verification_key(&self) -> Vec<u8>;

    /// Sign `payload` (the transaction hash)
    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError>;
}

/// Short hex label for a verification key, used in error messages
pub(crate) fn signer_label(vkey: &[u8]) -> String {
    let full = hex::encode(vkey);
    full[..16.min(full.len())].to_string()
}

/// Produce a witness from `signer` and check it verifies against `payload`
pub fn make_witness(signer: &dyn TxSigner, payload: &[u8]) -> Result<Witness, SigningError> {
    let vkey = signer.verification_key();
    let signature = signer.sign(payload)?;
    verify_witness(&vkey, &signature, payload)?;
    Ok(Witness { vkey, signature })
}

/// Check an Ed25519 signature
pub fn verify_witness(vkey: &[u8], signature: &[u8], payload: &[u8]) -> Result<(), SigningError> {
    let verification_failed = || SigningError::VerificationFailed {
        signer: signer_label(vkey),
    };

    let key_bytes: [u8; 32] = vkey.try_into().map_err(|_| verification_failed())?;
    let key = VerifyingKey::from_bytes(&key_bytes).map_err(|_| verification_failed())?;
    let signature = Signature::from_slice(signature).map_err(|_| verification_failed())?;
    key.verify(payload, &signature)
        .map_err(|_| verification_failed())
}

// =============================================================================
// Ed25519 signer
// =============================================================================

/// Normal (non-extended) Ed25519 payment key
pub struct Ed25519Signer {
    signing_key: SigningKey,
}

impl Ed25519Signer {
    pub fn from_bytes(secret: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    /// Parse a hex secret key, accepting the CBOR-wrapped form found in
    /// `cardano-cli` `.skey` files (`5820` + 64 hex chars).
    pub fn from_hex(key_hex: &str) -> Result<Self, SigningError> {
        let trimmed = key_hex.trim();
        let raw = match trimmed.strip_prefix(CBOR_KEY_PREFIX) {
            Some(rest) if rest.len() == SECRET_KEY_LENGTH * 2 => rest,
            _ => trimmed,
        };

        let bytes = hex::decode(raw).map_err(|e| SigningError::InvalidKey {
            message: e.to_string(),
        })?;
        let secret: [u8; SECRET_KEY_LENGTH] =
            bytes.as_slice().try_into().map_err(|_| SigningError::InvalidKey {
                message: format!("expected {} bytes, got {}", SECRET_KEY_LENGTH, bytes.len()),
            })?;

        Ok(Self::from_bytes(&secret))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("vkey", &hex::encode(self.verifying_key().as_bytes()))
            .finish()
    }
}

impl TxSigner for Ed25519Signer {
    fn verification_key(&self) -> Vec<u8> {
        self.verifying_key().as_bytes().to_vec()
    }

    fn sign(&self, payload: &[u8]) -> Result<Vec<u8>, SigningError> {
        Ok(self.signing_key.sign(payload).to_bytes().to_vec())
    }
}
