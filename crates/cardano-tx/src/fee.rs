//! Linear fee formula

use courier_core::{AmountError, Lovelace, ProtocolParameters};

/// `fee = a * size + b`
pub fn linear_fee(params: &ProtocolParameters, size_bytes: usize) -> Result<Lovelace, AmountError> {
    let overflow = || AmountError::Overflow {
        asset: "fee".to_string(),
    };
    (size_bytes as u64)
        .checked_mul(params.min_fee_a)
        .and_then(|v| v.checked_add(params.min_fee_b))
        .ok_or_else(overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_fee() {
        let params = ProtocolParameters::default();
        assert_eq!(linear_fee(&params, 0).unwrap(), 155_381);
        assert_eq!(linear_fee(&params, 300).unwrap(), 44 * 300 + 155_381);
    }

    #[test]
    fn test_linear_fee_overflow() {
        let params = ProtocolParameters {
            min_fee_a: u64::MAX,
            ..ProtocolParameters::default()
        };
        assert!(linear_fee(&params, 2).is_err());
    }
}
