//! Wallet storage.
//!
//! The session sees one trait, [`WalletStore`]; the in-memory reference
//! implementation lives in [`memory`]. A durable backend must provide
//! per-call atomicity plus an outer lock (or a batch-write API) so the reorg
//! rollback sequence stays atomic from the session's point of view.

pub mod memory;
pub mod records;

pub use memory::MemoryStore;
pub use records::{Direction, OutputFilter, OutputRecord, TransactionRecord};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("no output with key image {0}")]
    UnknownKeyImage(String),

    #[error("output record rejected: {0}")]
    InvalidRecord(&'static str),
}

/// Storage operations the wallet session relies on. All mutations are
/// idempotent where meaningful; `key_image` is the unique output index.
pub trait WalletStore {
    // -- outputs -------------------------------------------------------
    fn put_output(&mut self, output: OutputRecord) -> Result<(), StoreError>;
    fn get_output(&self, key_image: &[u8; 32]) -> Option<&OutputRecord>;
    fn get_outputs(&self, filter: &OutputFilter) -> Vec<OutputRecord>;
    fn output_count(&self) -> usize;
    /// Remove outputs with `block_height > height`; returns how many.
    fn delete_outputs_above(&mut self, height: u64) -> usize;

    fn mark_output_spent(
        &mut self,
        key_image: &[u8; 32],
        spent_tx_hash: [u8; 32],
        spent_height: u64,
    ) -> Result<(), StoreError>;
    /// Clear the spent state of outputs spent above `height`; returns how many.
    fn unspend_outputs_above(&mut self, height: u64) -> usize;
    fn set_output_frozen(&mut self, key_image: &[u8; 32], frozen: bool) -> Result<(), StoreError>;
    fn set_global_index(&mut self, key_image: &[u8; 32], index: u64) -> Result<(), StoreError>;

    // -- transactions --------------------------------------------------
    fn put_transaction(&mut self, tx: TransactionRecord);
    fn get_transaction(&self, tx_hash: &[u8; 32]) -> Option<&TransactionRecord>;
    fn transactions(&self) -> Vec<TransactionRecord>;
    fn delete_transactions_above(&mut self, height: u64) -> usize;

    // -- block-hash index ----------------------------------------------
    fn put_block_hash(&mut self, height: u64, hash: String);
    fn get_block_hash(&self, height: u64) -> Option<&str>;
    fn delete_block_hashes_above(&mut self, height: u64) -> usize;
    /// Highest height with a recorded hash.
    fn top_recorded_height(&self) -> Option<u64>;

    // -- global --------------------------------------------------------
    fn clear(&mut self);
}
