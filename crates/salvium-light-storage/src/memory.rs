//! In-memory reference store.
//!
//! Outputs are keyed by key image, transactions by hash, block hashes live
//! in an ordered map so rollbacks are range deletions. Single-threaded by
//! construction; the session wraps it when sharing is needed.

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::records::{OutputFilter, OutputRecord, TransactionRecord};
use crate::{StoreError, WalletStore};

#[derive(Default)]
pub struct MemoryStore {
    outputs: HashMap<[u8; 32], OutputRecord>,
    transactions: HashMap<[u8; 32], TransactionRecord>,
    block_hashes: BTreeMap<u64, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletStore for MemoryStore {
    fn put_output(&mut self, output: OutputRecord) -> Result<(), StoreError> {
        if !output.spent_state_consistent() {
            return Err(StoreError::InvalidRecord("inconsistent spent state"));
        }
        if output.is_carrot && output.carrot_shared_secret.is_none() {
            return Err(StoreError::InvalidRecord("carrot output without shared secret"));
        }
        // Re-inserting the same key image overwrites: rescans are idempotent.
        self.outputs.insert(output.key_image, output);
        Ok(())
    }

    fn get_output(&self, key_image: &[u8; 32]) -> Option<&OutputRecord> {
        self.outputs.get(key_image)
    }

    fn get_outputs(&self, filter: &OutputFilter) -> Vec<OutputRecord> {
        let mut found: Vec<OutputRecord> = self
            .outputs
            .values()
            .filter(|o| filter.matches(o))
            .cloned()
            .collect();
        // Oldest first; deterministic order for selection and tests.
        found.sort_by_key(|o| (o.block_height, o.tx_hash, o.output_index));
        found
    }

    fn output_count(&self) -> usize {
        self.outputs.len()
    }

    fn delete_outputs_above(&mut self, height: u64) -> usize {
        let before = self.outputs.len();
        self.outputs.retain(|_, o| o.block_height <= height);
        let removed = before - self.outputs.len();
        if removed > 0 {
            debug!("rollback: deleted {} outputs above height {}", removed, height);
        }
        removed
    }

    fn mark_output_spent(
        &mut self,
        key_image: &[u8; 32],
        spent_tx_hash: [u8; 32],
        spent_height: u64,
    ) -> Result<(), StoreError> {
        let output = self
            .outputs
            .get_mut(key_image)
            .ok_or_else(|| StoreError::UnknownKeyImage(hex::encode(key_image)))?;
        output.is_spent = true;
        output.spent_tx_hash = Some(spent_tx_hash);
        output.spent_height = Some(spent_height);
        Ok(())
    }

    fn unspend_outputs_above(&mut self, height: u64) -> usize {
        let mut cleared = 0;
        for output in self.outputs.values_mut() {
            if matches!(output.spent_height, Some(h) if h > height) {
                output.is_spent = false;
                output.spent_tx_hash = None;
                output.spent_height = None;
                cleared += 1;
            }
        }
        if cleared > 0 {
            debug!("rollback: unspent {} outputs above height {}", cleared, height);
        }
        cleared
    }

    fn set_output_frozen(&mut self, key_image: &[u8; 32], frozen: bool) -> Result<(), StoreError> {
        let output = self
            .outputs
            .get_mut(key_image)
            .ok_or_else(|| StoreError::UnknownKeyImage(hex::encode(key_image)))?;
        output.is_frozen = frozen;
        Ok(())
    }

    fn set_global_index(&mut self, key_image: &[u8; 32], index: u64) -> Result<(), StoreError> {
        let output = self
            .outputs
            .get_mut(key_image)
            .ok_or_else(|| StoreError::UnknownKeyImage(hex::encode(key_image)))?;
        output.global_index = Some(index);
        Ok(())
    }

    fn put_transaction(&mut self, tx: TransactionRecord) {
        self.transactions.insert(tx.tx_hash, tx);
    }

    fn get_transaction(&self, tx_hash: &[u8; 32]) -> Option<&TransactionRecord> {
        self.transactions.get(tx_hash)
    }

    fn transactions(&self) -> Vec<TransactionRecord> {
        let mut txs: Vec<TransactionRecord> = self.transactions.values().cloned().collect();
        txs.sort_by_key(|t| (t.block_height, t.tx_hash));
        txs
    }

    fn delete_transactions_above(&mut self, height: u64) -> usize {
        let before = self.transactions.len();
        self.transactions.retain(|_, t| t.block_height <= height);
        before - self.transactions.len()
    }

    fn put_block_hash(&mut self, height: u64, hash: String) {
        self.block_hashes.insert(height, hash);
    }

    fn get_block_hash(&self, height: u64) -> Option<&str> {
        self.block_hashes.get(&height).map(String::as_str)
    }

    fn delete_block_hashes_above(&mut self, height: u64) -> usize {
        let stale = self.block_hashes.split_off(&(height + 1));
        stale.len()
    }

    fn top_recorded_height(&self) -> Option<u64> {
        self.block_hashes.keys().next_back().copied()
    }

    fn clear(&mut self) {
        self.outputs.clear();
        self.transactions.clear();
        self.block_hashes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::Direction;
    use salvium_light_types::AssetType;

    fn output(tag: u8, height: u64) -> OutputRecord {
        OutputRecord {
            key_image: [tag; 32],
            tx_hash: [tag ^ 0xff; 32],
            output_index: 0,
            tx_pub_key: [0; 32],
            output_public_key: [tag; 32],
            amount: 1_000 * tag as u64,
            mask: salvium_light_types::constants::IDENTITY_MASK,
            commitment: Some([6; 32]),
            subaddress_index: (0, 0),
            is_carrot: false,
            carrot_shared_secret: None,
            carrot_encrypted_anchor: None,
            asset_type: AssetType::Sal1,
            block_height: height,
            unlock_height: height + 10,
            global_index: None,
            is_spent: false,
            spent_tx_hash: None,
            spent_height: None,
            is_frozen: false,
        }
    }

    fn tx(tag: u8, height: u64) -> TransactionRecord {
        TransactionRecord {
            tx_hash: [tag; 32],
            block_height: height,
            direction: Direction::Incoming,
            amount: 1,
            fee: 0,
            timestamp: 0,
        }
    }

    #[test]
    fn put_is_idempotent_per_key_image() {
        let mut store = MemoryStore::new();
        store.put_output(output(1, 50)).unwrap();
        store.put_output(output(1, 50)).unwrap();
        assert_eq!(store.output_count(), 1);
    }

    #[test]
    fn rejects_inconsistent_records() {
        let mut store = MemoryStore::new();
        let mut bad = output(1, 50);
        bad.is_spent = true; // no spent_tx_hash / spent_height
        assert!(store.put_output(bad).is_err());

        let mut carrot = output(2, 50);
        carrot.is_carrot = true;
        assert!(store.put_output(carrot).is_err());
    }

    #[test]
    fn spend_then_unspend_threshold() {
        let mut store = MemoryStore::new();
        store.put_output(output(1, 50)).unwrap();
        store.mark_output_spent(&[1; 32], [9; 32], 120).unwrap();
        assert!(store.get_output(&[1; 32]).unwrap().is_spent);

        // h0 >= spent height: stays spent.
        assert_eq!(store.unspend_outputs_above(120), 0);
        assert!(store.get_output(&[1; 32]).unwrap().is_spent);

        // h0 < spent height: cleared completely.
        assert_eq!(store.unspend_outputs_above(119), 1);
        let o = store.get_output(&[1; 32]).unwrap();
        assert!(!o.is_spent);
        assert!(o.spent_tx_hash.is_none() && o.spent_height.is_none());
        assert!(o.spent_state_consistent());
    }

    #[test]
    fn mark_spent_unknown_key_image_fails() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.mark_output_spent(&[9; 32], [0; 32], 1),
            Err(StoreError::UnknownKeyImage(_))
        ));
    }

    #[test]
    fn filters_respect_frozen_and_spent() {
        let mut store = MemoryStore::new();
        store.put_output(output(1, 10)).unwrap();
        store.put_output(output(2, 20)).unwrap();
        store.put_output(output(3, 30)).unwrap();
        store.mark_output_spent(&[2; 32], [0; 32], 40).unwrap();
        store.set_output_frozen(&[3; 32], true).unwrap();

        let filter = OutputFilter {
            unspent_only: true,
            ..Default::default()
        };
        let found = store.get_outputs(&filter);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key_image, [1; 32]);

        let all = store.get_outputs(&OutputFilter {
            include_frozen: true,
            ..Default::default()
        });
        assert_eq!(all.len(), 3);
        // Oldest first.
        assert!(all.windows(2).all(|w| w[0].block_height <= w[1].block_height));
    }

    #[test]
    fn reorg_recipe_scenario() {
        // Outputs at 50/100/150; output@50 spent at 120; txs at 80/130;
        // block hashes 0..199; first divergent block is 101, so the chain is
        // rolled back to height 100.
        let mut store = MemoryStore::new();
        store.put_output(output(1, 50)).unwrap();
        store.put_output(output(2, 100)).unwrap();
        store.put_output(output(3, 150)).unwrap();
        store.mark_output_spent(&[1; 32], [0xaa; 32], 120).unwrap();
        store.put_transaction(tx(1, 80));
        store.put_transaction(tx(2, 130));
        for h in 0..200u64 {
            store.put_block_hash(h, format!("hash_{}", h));
        }

        let reorg_height = 100;
        store.delete_outputs_above(reorg_height);
        store.delete_transactions_above(reorg_height);
        store.unspend_outputs_above(reorg_height);
        store.delete_block_hashes_above(reorg_height);

        // Outputs at 50 and 100 survive, 150 is gone, and the spend at 120
        // was rolled back.
        assert!(store.get_output(&[1; 32]).is_some());
        assert!(store.get_output(&[2; 32]).is_some());
        assert!(store.get_output(&[3; 32]).is_none());
        assert!(!store.get_output(&[1; 32]).unwrap().is_spent);

        assert!(store.get_transaction(&[1; 32]).is_some());
        assert!(store.get_transaction(&[2; 32]).is_none());

        assert_eq!(store.get_block_hash(100), Some("hash_100"));
        assert_eq!(store.get_block_hash(101), None);
        assert_eq!(store.top_recorded_height(), Some(100));
    }

    #[test]
    fn clear_wipes_everything() {
        let mut store = MemoryStore::new();
        store.put_output(output(1, 10)).unwrap();
        store.put_transaction(tx(1, 10));
        store.put_block_hash(10, "h".into());
        store.clear();
        assert_eq!(store.output_count(), 0);
        assert!(store.transactions().is_empty());
        assert!(store.top_recorded_height().is_none());
    }

    #[test]
    fn global_index_resolution() {
        let mut store = MemoryStore::new();
        store.put_output(output(1, 10)).unwrap();
        assert_eq!(store.get_output(&[1; 32]).unwrap().global_index, None);
        store.set_global_index(&[1; 32], 4242).unwrap();
        assert_eq!(store.get_output(&[1; 32]).unwrap().global_index, Some(4242));
    }
}
