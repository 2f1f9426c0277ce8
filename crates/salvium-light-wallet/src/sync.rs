//! Blockchain synchronization.
//!
//! Walks blocks from the stored height to the node tip, scans every
//! transaction, records owned outputs and spends, and tracks per-height
//! block hashes. A hash mismatch triggers the rollback recipe: find the
//! fork point, delete outputs/transactions above it, clear spends above it,
//! drop the stale hashes, and resume scanning from the next height.
//! Ordering is strict: outputs land in transaction order within a block and
//! in height order across blocks.

use log::{debug, info, warn};

use salvium_light_chain::{AcceptAll, BlockAdmission, ChainTracker, IncomingBlock};
use salvium_light_rpc::{Block, Node};
use salvium_light_storage::{Direction, OutputRecord, TransactionRecord, WalletStore};
use salvium_light_types::constants::{DEFAULT_TX_SPENDABLE_AGE, MINED_MONEY_UNLOCK_WINDOW};

use crate::cancel::CancelToken;
use crate::error::WalletError;
use crate::scanner::{self, FoundOutput, ScanContext, ScanTxData};

#[derive(Debug, Clone)]
pub enum SyncEvent {
    Started {
        from_height: u64,
        target_height: u64,
    },
    Progress {
        current_height: u64,
        target_height: u64,
        outputs_found: usize,
    },
    Reorg {
        from_height: u64,
        to_height: u64,
    },
    Complete {
        height: u64,
    },
}

#[derive(Debug, Default)]
pub struct SyncOutcome {
    pub height: u64,
    pub outputs_found: usize,
    pub reorgs: usize,
}

/// Sync to the node tip, keeping the header tracker in step with the store.
pub async fn sync<N: Node, S: WalletStore>(
    node: &N,
    store: &mut S,
    tracker: &mut ChainTracker,
    ctx: &ScanContext,
    cancel: &CancelToken,
    mut on_event: impl FnMut(SyncEvent),
) -> Result<SyncOutcome, WalletError> {
    let info = node.get_info().await?;
    // `height` is the block count; the top block index is one less.
    let target = info.height.saturating_sub(1);

    let mut outcome = SyncOutcome::default();
    let mut next = store.top_recorded_height().map_or(0, |h| h + 1);

    if next > target {
        outcome.height = target;
        return Ok(outcome);
    }

    on_event(SyncEvent::Started {
        from_height: next,
        target_height: target,
    });
    info!("sync: {} -> {}", next, target);

    while next <= target {
        cancel.check()?;

        let block = node.get_block(next).await?;

        // Reorg check: the parent the node reports must be the hash we
        // recorded one height below.
        if next > 0 {
            if let Some(recorded) = store.get_block_hash(next - 1) {
                if recorded != block.header.prev_hash {
                    warn!(
                        "reorg detected at height {}: stored parent {} != {}",
                        next,
                        recorded,
                        block.header.prev_hash
                    );
                    let fork = find_fork_point(node, store, next - 1, cancel).await?;
                    rollback_to(store, fork);
                    tracker.truncate_above(fork);
                    outcome.reorgs += 1;
                    on_event(SyncEvent::Reorg {
                        from_height: next - 1,
                        to_height: fork,
                    });
                    next = fork + 1;
                    continue;
                }
            }
        }

        outcome.outputs_found += scan_block(node, store, ctx, &block, cancel).await?;
        store.put_block_hash(next, block.header.hash.clone());
        track_header(tracker, &block);

        on_event(SyncEvent::Progress {
            current_height: next,
            target_height: target,
            outputs_found: outcome.outputs_found,
        });
        next += 1;
    }

    outcome.height = target;
    on_event(SyncEvent::Complete { height: target });
    Ok(outcome)
}

/// Lowest height at which the stored hash still matches the node.
///
/// Walks down from `from` until agreement; an empty store section counts as
/// agreement (nothing to contradict).
async fn find_fork_point<N: Node, S: WalletStore>(
    node: &N,
    store: &S,
    from: u64,
    cancel: &CancelToken,
) -> Result<u64, WalletError> {
    let mut height = from;
    loop {
        cancel.check()?;
        let Some(recorded) = store.get_block_hash(height) else {
            return Ok(height);
        };
        let headers = node.get_block_headers_range(height, height).await?;
        match headers.first() {
            Some(header) if header.hash == recorded => return Ok(height),
            _ => {}
        }
        if height == 0 {
            return Ok(0);
        }
        height -= 1;
    }
}

/// Record a node-accepted block in the header tracker. Blocks extending the
/// tracked tip go through full admission (timestamp median, future limit);
/// anything the tracker would reject is still kept, because the node is our
/// only source of truth, but the rejection is surfaced in the log.
fn track_header(tracker: &mut ChainTracker, block: &Block) {
    let incoming = IncomingBlock {
        hash: block.header.hash.clone(),
        prev_hash: block.header.prev_hash.clone(),
        timestamp: block.header.timestamp,
        difficulty: block.header.difficulty as u128,
        weight: block.header.block_weight,
    };

    if tracker.height() > 0 && tracker.tip_hash() == Some(block.header.prev_hash.as_str()) {
        let admission = tracker.handle_block(&incoming, unix_time(), &mut AcceptAll);
        match admission {
            BlockAdmission::AddedToMain { .. } | BlockAdmission::AlreadyExists => {}
            other => {
                warn!(
                    "block {} at {} failed local header checks ({:?}); keeping node's chain",
                    block.header.hash, block.header.height, other
                );
                tracker.push_main_unchecked(&incoming);
            }
        }
    } else {
        // Bootstrap or resume: the tracker has no verifiable parent.
        tracker.push_main_unchecked(&incoming);
    }
}

fn unix_time() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// The reorg recipe from the storage layer, applied as one uninterruptible
/// sequence.
pub fn rollback_to<S: WalletStore>(store: &mut S, height: u64) {
    let outputs = store.delete_outputs_above(height);
    let txs = store.delete_transactions_above(height);
    let unspent = store.unspend_outputs_above(height);
    let hashes = store.delete_block_hashes_above(height);
    info!(
        "rolled back to {}: -{} outputs, -{} txs, {} unspent, -{} hashes",
        height, outputs, txs, unspent, hashes
    );
}

async fn scan_block<N: Node, S: WalletStore>(
    node: &N,
    store: &mut S,
    ctx: &ScanContext,
    block: &Block,
    cancel: &CancelToken,
) -> Result<usize, WalletError> {
    let height = block.header.height;
    let timestamp = block.header.timestamp;
    let mut found_count = 0;

    // Coinbase (and the per-block protocol payout when present).
    for (body, hash_hex) in [
        (block.miner_tx.as_ref(), Some(&block.miner_tx_hash)),
        (block.protocol_tx.as_ref(), None),
    ] {
        let Some(body) = body else { continue };
        let tx_hash = hash_hex
            .and_then(|h| hex32(h))
            .unwrap_or_else(|| protocol_tx_placeholder(height));
        if let Some(parsed) = scanner::parse_transaction(body, tx_hash, height, true) {
            found_count += absorb_tx(store, ctx, &parsed, timestamp)?;
        }
    }

    // Regular transactions, in block order.
    if !block.tx_hashes.is_empty() {
        cancel.check()?;
        let entries = node.get_transactions(&block.tx_hashes).await?;
        for entry in &entries {
            let Some(tx_hash) = hex32(&entry.tx_hash) else {
                continue;
            };
            if let Some(parsed) = scanner::parse_transaction(&entry.as_json, tx_hash, height, false)
            {
                found_count += absorb_tx(store, ctx, &parsed, timestamp)?;
            }
        }
    }

    Ok(found_count)
}

/// Scan one parsed transaction: record spends of our key images, then any
/// newly found outputs.
fn absorb_tx<S: WalletStore>(
    store: &mut S,
    ctx: &ScanContext,
    tx: &ScanTxData,
    timestamp: u64,
) -> Result<usize, WalletError> {
    let mut spent_amount = 0u64;
    for key_image in &tx.key_images {
        let ours = store
            .get_output(key_image)
            .map(|o| (o.is_spent, o.amount));
        if let Some((already_spent, amount)) = ours {
            // Idempotent: re-marking pins the spend to its on-chain height
            // (a broadcast marks optimistically before confirmation).
            store.mark_output_spent(key_image, tx.tx_hash, tx.block_height)?;
            if !already_spent {
                spent_amount += amount;
                debug!(
                    "spent output {} in tx {}",
                    hex::encode(key_image),
                    hex::encode(tx.tx_hash)
                );
            }
        }
    }

    let found = scanner::scan_transaction(ctx, tx);
    let received: u64 = found.iter().map(|f| f.amount).sum();
    for output in &found {
        store_found(store, tx, output)?;
    }

    if spent_amount > 0 || !found.is_empty() {
        let direction = match (spent_amount > 0, !found.is_empty()) {
            (true, true) => Direction::Both,
            (true, false) => Direction::Outgoing,
            _ => Direction::Incoming,
        };
        store.put_transaction(TransactionRecord {
            tx_hash: tx.tx_hash,
            block_height: tx.block_height,
            direction,
            amount: received.max(spent_amount),
            fee: 0,
            timestamp,
        });
    }

    Ok(found.len())
}

fn store_found<S: WalletStore>(
    store: &mut S,
    tx: &ScanTxData,
    output: &FoundOutput,
) -> Result<(), WalletError> {
    // View-only wallets cannot form key images; those outputs are tracked by
    // balance only once the spend tier is imported, so skip them here.
    let Some(key_image) = output.key_image else {
        return Ok(());
    };

    let lock = if tx.is_coinbase {
        MINED_MONEY_UNLOCK_WINDOW
    } else {
        DEFAULT_TX_SPENDABLE_AGE
    };

    store.put_output(OutputRecord {
        key_image,
        tx_hash: tx.tx_hash,
        output_index: output.output_index,
        tx_pub_key: tx.tx_pub_key,
        output_public_key: output.output_public_key,
        amount: output.amount,
        mask: output.mask.to_bytes(),
        commitment: output.commitment,
        subaddress_index: output.subaddress_index,
        is_carrot: output.is_carrot,
        carrot_shared_secret: output.carrot_shared_secret,
        carrot_encrypted_anchor: output.carrot_encrypted_anchor,
        asset_type: output.asset_type,
        block_height: tx.block_height,
        unlock_height: tx.block_height + lock,
        global_index: None,
        is_spent: false,
        spent_tx_hash: None,
        spent_height: None,
        is_frozen: false,
    })?;
    Ok(())
}

fn hex32(s: &str) -> Option<[u8; 32]> {
    let bytes = hex::decode(s).ok()?;
    bytes.try_into().ok()
}

/// Synthetic hash for protocol transactions whose hash the node does not
/// repeat in the block body.
fn protocol_tx_placeholder(height: u64) -> [u8; 32] {
    let mut h = [0u8; 32];
    h[..8].copy_from_slice(&height.to_le_bytes());
    h[31] = 0x70; // 'p'
    h
}
