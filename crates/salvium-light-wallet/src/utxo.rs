//! UTXO selection.
//!
//! The default strategy prefers the single best-fitting coin (fewest inputs,
//! least change) and falls back to oldest-first accumulation, which both
//! consolidates aged outputs and keeps selection deterministic for a given
//! store state.

use salvium_light_storage::OutputRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SelectionStrategy {
    /// Best single fit, else oldest-first accumulation.
    #[default]
    Default,
    /// Oldest outputs first.
    OldestFirst,
    /// Largest outputs first (minimizes input count).
    LargestFirst,
    /// Everything spendable (sweep).
    All,
}

#[derive(Debug)]
pub struct Selection {
    pub selected: Vec<OutputRecord>,
    pub total: u64,
}

/// Pick outputs summing to at least `target`. `candidates` must already be
/// filtered to spendable outputs. Returns None when the sum cannot be
/// reached.
pub fn select_utxos(
    candidates: &[OutputRecord],
    target: u64,
    strategy: SelectionStrategy,
    max_inputs: usize,
) -> Option<Selection> {
    match strategy {
        SelectionStrategy::All => {
            let selected: Vec<OutputRecord> =
                candidates.iter().take(max_inputs).cloned().collect();
            let total = selected.iter().map(|o| o.amount).sum();
            (total >= target).then_some(Selection { selected, total })
        }
        SelectionStrategy::OldestFirst => {
            let mut ordered: Vec<&OutputRecord> = candidates.iter().collect();
            ordered.sort_by_key(|o| (o.block_height, o.output_index));
            accumulate(&ordered, target, max_inputs)
        }
        SelectionStrategy::LargestFirst => {
            let mut ordered: Vec<&OutputRecord> = candidates.iter().collect();
            ordered.sort_by(|a, b| b.amount.cmp(&a.amount));
            accumulate(&ordered, target, max_inputs)
        }
        SelectionStrategy::Default => {
            // Smallest single output covering the whole target.
            let best_fit = candidates
                .iter()
                .filter(|o| o.amount >= target)
                .min_by_key(|o| o.amount);
            if let Some(best) = best_fit {
                return Some(Selection {
                    selected: vec![best.clone()],
                    total: best.amount,
                });
            }
            // No single coin is enough; consolidate oldest-first.
            select_utxos(candidates, target, SelectionStrategy::OldestFirst, max_inputs)
        }
    }
}

fn accumulate(ordered: &[&OutputRecord], target: u64, max_inputs: usize) -> Option<Selection> {
    let mut selected = Vec::new();
    let mut total = 0u64;
    for output in ordered.iter().take(max_inputs) {
        selected.push((*output).clone());
        total += output.amount;
        if total >= target {
            return Some(Selection { selected, total });
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use salvium_light_types::AssetType;

    fn candidate(tag: u8, amount: u64, height: u64) -> OutputRecord {
        OutputRecord {
            key_image: [tag; 32],
            tx_hash: [tag; 32],
            output_index: 0,
            tx_pub_key: [0; 32],
            output_public_key: [tag; 32],
            amount,
            mask: salvium_light_types::constants::IDENTITY_MASK,
            commitment: Some([1; 32]),
            subaddress_index: (0, 0),
            is_carrot: false,
            carrot_shared_secret: None,
            carrot_encrypted_anchor: None,
            asset_type: AssetType::Sal1,
            block_height: height,
            unlock_height: height,
            global_index: Some(tag as u64),
            is_spent: false,
            spent_tx_hash: None,
            spent_height: None,
            is_frozen: false,
        }
    }

    #[test]
    fn default_prefers_tightest_single_coin() {
        let coins = [candidate(1, 50, 10), candidate(2, 200, 20), candidate(3, 100, 30)];
        let sel = select_utxos(&coins, 90, SelectionStrategy::Default, 16).unwrap();
        assert_eq!(sel.selected.len(), 1);
        assert_eq!(sel.total, 100);
    }

    #[test]
    fn default_falls_back_to_oldest_first() {
        let coins = [candidate(1, 30, 300), candidate(2, 40, 100), candidate(3, 50, 200)];
        let sel = select_utxos(&coins, 80, SelectionStrategy::Default, 16).unwrap();
        // No single coin covers 80; oldest-first picks 40@100 then 50@200.
        assert_eq!(sel.selected.len(), 2);
        assert_eq!(sel.selected[0].block_height, 100);
        assert_eq!(sel.total, 90);
    }

    #[test]
    fn oldest_first_ordering() {
        let coins = [candidate(1, 10, 500), candidate(2, 20, 100), candidate(3, 30, 300)];
        let sel = select_utxos(&coins, 55, SelectionStrategy::OldestFirst, 16).unwrap();
        let heights: Vec<u64> = sel.selected.iter().map(|o| o.block_height).collect();
        assert_eq!(heights, vec![100, 300, 500]);
    }

    #[test]
    fn largest_first_minimizes_inputs() {
        let coins = [candidate(1, 10, 1), candidate(2, 500, 2), candidate(3, 20, 3)];
        let sel = select_utxos(&coins, 400, SelectionStrategy::LargestFirst, 16).unwrap();
        assert_eq!(sel.selected.len(), 1);
        assert_eq!(sel.total, 500);
    }

    #[test]
    fn insufficient_funds_returns_none() {
        let coins = [candidate(1, 10, 1), candidate(2, 20, 2)];
        assert!(select_utxos(&coins, 100, SelectionStrategy::Default, 16).is_none());
        assert!(select_utxos(&[], 1, SelectionStrategy::Default, 16).is_none());
    }

    #[test]
    fn max_inputs_caps_accumulation() {
        let coins: Vec<OutputRecord> =
            (1..=10).map(|i| candidate(i, 10, i as u64)).collect();
        // Needs 5 coins but only 3 allowed.
        assert!(select_utxos(&coins, 50, SelectionStrategy::OldestFirst, 3).is_none());
        let sel = select_utxos(&coins, 30, SelectionStrategy::OldestFirst, 3).unwrap();
        assert_eq!(sel.selected.len(), 3);
    }

    #[test]
    fn all_strategy_takes_everything_up_to_cap() {
        let coins: Vec<OutputRecord> =
            (1..=5).map(|i| candidate(i, 100, i as u64)).collect();
        let sel = select_utxos(&coins, 0, SelectionStrategy::All, 60).unwrap();
        assert_eq!(sel.selected.len(), 5);
        assert_eq!(sel.total, 500);

        let capped = select_utxos(&coins, 0, SelectionStrategy::All, 3).unwrap();
        assert_eq!(capped.selected.len(), 3);
    }
}
