//! UTXO selection utilities
//!
//! Greedy, order-preserving selection of inputs covering per-asset targets.

use courier_core::{AmountError, AssetAmounts, SelectionError, Utxo};

// =============================================================================
// Selected inputs result
// =============================================================================

/// Result of UTXO selection
#[derive(Debug, Clone)]
pub struct SelectedUtxos {
    /// Chosen UTXOs, in candidate order
    pub utxos: Vec<Utxo>,
    /// Every asset carried by the chosen UTXOs, requested or not
    pub sum: AssetAmounts,
}

impl SelectedUtxos {
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }
}

// =============================================================================
// Selection functions
// =============================================================================

/// Select inputs covering `required`, scanning at most `max_inputs_considered`
/// candidates in the given order.
///
/// A candidate is taken while it carries some asset that is still short. Once
/// every target is met, further scanned candidates are taken only until
/// `min_desired_inputs` inputs have been chosen.
pub fn select_utxos(
    available: &[Utxo],
    required: &AssetAmounts,
    max_inputs_considered: usize,
    min_desired_inputs: usize,
) -> Result<SelectedUtxos, SelectionError> {
    let mut chosen: Vec<Utxo> = Vec::new();
    let mut sum = AssetAmounts::new();
    let mut scanned = 0usize;

    for utxo in available.iter().take(max_inputs_considered) {
        let satisfied = sum.covers(required);
        if satisfied && chosen.len() >= min_desired_inputs {
            break;
        }
        scanned += 1;

        let useful = satisfied
            || required
                .iter()
                .any(|(asset, target)| sum.get(asset) < target && utxo.amounts.get(asset) > 0);

        if useful {
            sum.merge(&utxo.amounts)?;
            chosen.push(utxo.clone());
        }
    }

    if let Some((asset, required, available)) = sum.first_shortfall(required) {
        return Err(SelectionError::InsufficientFunds {
            asset,
            required,
            available,
            scanned,
        });
    }

    Ok(SelectedUtxos { utxos: chosen, sum })
}

/// Sum every asset across `utxos`
pub fn utxos_sum(utxos: &[Utxo]) -> Result<AssetAmounts, AmountError> {
    let mut sum = AssetAmounts::new();
    for utxo in utxos {
        sum.merge(&utxo.amounts)?;
    }
    Ok(sum)
}
