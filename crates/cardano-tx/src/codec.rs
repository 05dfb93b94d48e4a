//! Transaction body, witnesses, and the codec seam
//!
//! The ledger's native binary format lives behind [`TxCodec`]. [`JsonCodec`]
//! is the bundled deterministic encoding, used by the in-memory ledger and in
//! tests.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};

use courier_core::{Slot, TxError, TxId, UtxoRef};

use crate::output::TxOutput;

type Blake2b256 = Blake2b<U32>;

/// Ed25519 public key length
pub const VKEY_LENGTH: usize = 32;

/// Ed25519 signature length
pub const SIGNATURE_LENGTH: usize = 64;

/// Everything covered by the transaction hash
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxBody {
    pub inputs: Vec<UtxoRef>,
    pub outputs: Vec<TxOutput>,
    pub fee: u64,
    pub ttl: Slot,
    pub network_magic: u32,
    /// Hex-encoded auxiliary metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<String>,
}

/// Verification key + signature authorizing the inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Witness {
    #[serde(with = "hex::serde")]
    pub vkey: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl Witness {
    /// Zero-filled witness of the real encoded length, for size estimation
    pub fn placeholder() -> Self {
        Self {
            vkey: vec![0u8; VKEY_LENGTH],
            signature: vec![0u8; SIGNATURE_LENGTH],
        }
    }
}

/// blake2b-256 over the encoded body; this is what signers sign
pub fn body_hash(body_bytes: &[u8]) -> Vec<u8> {
    Blake2b256::digest(body_bytes).to_vec()
}

/// Content-addressed transaction id
pub fn tx_hash(body_bytes: &[u8]) -> TxId {
    TxId::from_bytes(&body_hash(body_bytes))
}

/// Serialization seam for transactions
pub trait TxCodec: Send {
    fn encode_body(&self, body: &TxBody) -> Result<Vec<u8>, TxError>;

    fn encode_signed(&self, body_bytes: &[u8], witnesses: &[Witness]) -> Result<Vec<u8>, TxError>;

    /// Size of the signed encoding once `witness_count` witnesses are attached.
    ///
    /// Encodes with placeholder witnesses of the correct length.
    fn estimate_signed_size(&self, body_bytes: &[u8], witness_count: usize) -> Result<usize, TxError> {
        let witnesses = vec![Witness::placeholder(); witness_count];
        Ok(self.encode_signed(body_bytes, &witnesses)?.len())
    }

    /// Release any external resource held by the codec. Called once when the
    /// build session ends.
    fn release(&mut self) {}
}

impl<T: TxCodec + ?Sized> TxCodec for Box<T> {
    fn encode_body(&self, body: &TxBody) -> Result<Vec<u8>, TxError> {
        (**self).encode_body(body)
    }

    fn encode_signed(&self, body_bytes: &[u8], witnesses: &[Witness]) -> Result<Vec<u8>, TxError> {
        (**self).encode_signed(body_bytes, witnesses)
    }

    fn estimate_signed_size(&self, body_bytes: &[u8], witness_count: usize) -> Result<usize, TxError> {
        (**self).estimate_signed_size(body_bytes, witness_count)
    }

    fn release(&mut self) {
        (**self).release()
    }
}

// =============================================================================
// JSON codec
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct SignedEnvelope {
    #[serde(with = "hex::serde")]
    body: Vec<u8>,
    witnesses: Vec<Witness>,
}

/// A signed transaction decoded by [`JsonCodec`]
#[derive(Debug, Clone)]
pub struct DecodedTx {
    pub body: TxBody,
    pub body_bytes: Vec<u8>,
    pub witnesses: Vec<Witness>,
}

impl DecodedTx {
    pub fn tx_id(&self) -> TxId {
        tx_hash(&self.body_bytes)
    }
}

/// Deterministic JSON encoding of transaction bodies and signed envelopes
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    pub fn decode_body(&self, bytes: &[u8]) -> Result<TxBody, TxError> {
        serde_json::from_slice(bytes).map_err(|e| TxError::Encoding {
            message: format!("invalid body: {}", e),
        })
    }

    pub fn decode_signed(&self, raw: &[u8]) -> Result<DecodedTx, TxError> {
        let envelope: SignedEnvelope = serde_json::from_slice(raw).map_err(|e| TxError::Encoding {
            message: format!("invalid signed transaction: {}", e),
        })?;
        let body = self.decode_body(&envelope.body)?;
        Ok(DecodedTx {
            body,
            body_bytes: envelope.body,
            witnesses: envelope.witnesses,
        })
    }
}

impl TxCodec for JsonCodec {
    fn encode_body(&self, body: &TxBody) -> Result<Vec<u8>, TxError> {
        serde_json::to_vec(body).map_err(|e| TxError::Encoding {
            message: e.to_string(),
        })
    }

    fn encode_signed(&self, body_bytes: &[u8], witnesses: &[Witness]) -> Result<Vec<u8>, TxError> {
        let envelope = SignedEnvelope {
            body: body_bytes.to_vec(),
            witnesses: witnesses.to_vec(),
        };
        serde_json::to_vec(&envelope).map_err(|e| TxError::Encoding {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::Address;

    fn mock_body() -> TxBody {
        TxBody {
            inputs: vec![UtxoRef::new("aa", 0)],
            outputs: vec![TxOutput::new(Address::new("addr_test1a"), 2_000_000)],
            fee: 170_000,
            ttl: 1_200,
            network_magic: 2,
            metadata: Some(hex::encode(br#"{"0":{"type":"single"}}"#)),
        }
    }

    #[test]
    fn test_tx_hash_is_32_bytes_hex() {
        let id = tx_hash(b"body");
        assert_eq!(id.as_str().len(), 64);
        assert_eq!(id, tx_hash(b"body"));
        assert_ne!(id, tx_hash(b"other"));
    }

    #[test]
    fn test_json_codec_signed_envelope() {
        let codec = JsonCodec::new();
        let body = mock_body();
        let body_bytes = codec.encode_body(&body).unwrap();
        let witness = Witness {
            vkey: vec![7u8; VKEY_LENGTH],
            signature: vec![9u8; SIGNATURE_LENGTH],
        };

        let raw = codec.encode_signed(&body_bytes, &[witness.clone()]).unwrap();
        let decoded = codec.decode_signed(&raw).unwrap();
        assert_eq!(decoded.body, body);
        assert_eq!(decoded.witnesses, vec![witness]);
        assert_eq!(decoded.tx_id(), tx_hash(&body_bytes));
    }

    #[test]
    fn test_estimate_signed_size_matches_real_witnesses() {
        let codec = JsonCodec::new();
        let body_bytes = codec.encode_body(&mock_body()).unwrap();
        let real = vec![
            Witness {
                vkey: vec![0xab; VKEY_LENGTH],
                signature: vec![0xcd; SIGNATURE_LENGTH],
            };
            2
        ];

        let estimate = codec.estimate_signed_size(&body_bytes, 2).unwrap();
        let actual = codec.encode_signed(&body_bytes, &real).unwrap().len();
        assert_eq!(estimate, actual);
        assert!(estimate > codec.estimate_signed_size(&body_bytes, 1).unwrap());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let codec = JsonCodec::new();
        assert!(matches!(
            codec.decode_signed(b"not json"),
            Err(TxError::Encoding { .. })
        ));
    }
}
