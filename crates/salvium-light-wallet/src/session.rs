//! The wallet session.
//!
//! Owns the keys, the store, and a node handle; drives sync and exposes the
//! transaction entry points (transfer, sweep, stake, burn, convert). Each
//! entry point runs the shared pipeline: resolve the fork policy, pick
//! spendable outputs, settle the fee, resolve global indices, derive
//! one-time secrets, draw decoy rings, build, sign, and (unless dry-run)
//! broadcast. The store is only mutated after the node accepted the blob.

use curve25519_dalek::scalar::Scalar;
use log::{debug, info};

use salvium_light_chain::ChainTracker;
use salvium_light_crypto::subaddress::{carrot_subaddress_map, cn_subaddress_map};
use salvium_light_crypto::{carrot_scan, cn_scan, decompress, reduce32};
use salvium_light_rpc::{Node, OutputRef};
use salvium_light_storage::{OutputFilter, OutputRecord, WalletStore};
use salvium_light_types::constants::{
    network_config, DEFAULT_RING_SIZE, SUBADDRESS_MAJOR_LOOKAHEAD, SUBADDRESS_MINOR_LOOKAHEAD,
    SWEEP_MAX_INPUTS,
};
use salvium_light_types::{policy, Address, AssetType, ForkPolicy, Network, TxType};
use salvium_light_tx::builder::{Destination, PreparedInput, TransactionBuilder};
use salvium_light_tx::decoy::DecoySelector;
use salvium_light_tx::fee::{estimate_tx_fee, FeePriority, OutputKind};
use salvium_light_tx::sign::sign_transaction;

use crate::cancel::CancelToken;
use crate::error::WalletError;
use crate::keys::WalletKeys;
use crate::scanner::ScanContext;
use crate::sync::{self, SyncEvent, SyncOutcome};
use crate::utxo::{select_utxos, SelectionStrategy};

/// Options shared by every transaction entry point.
#[derive(Clone, Default)]
pub struct TransferOptions {
    pub priority: FeePriority,
    /// Build and sign only; return the blob without broadcasting.
    pub dry_run: bool,
    /// Deduct the fee from the first destination instead of adding it.
    pub subtract_fee_from_amount: bool,
    pub strategy: SelectionStrategy,
    pub cancel: CancelToken,
}

/// Outcome of a build (and optional broadcast).
pub struct TransferResult {
    pub tx_hash: [u8; 32],
    pub tx_hex: String,
    pub fee: u64,
    pub amount: u64,
    pub broadcast: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Balance {
    pub total: u64,
    pub unlocked: u64,
}

pub struct Wallet<N, S> {
    keys: WalletKeys,
    node: N,
    store: S,
    scan_ctx: ScanContext,
    tracker: ChainTracker,
    network: Network,
    tip_height: u64,
}

impl<N: Node, S: WalletStore> Wallet<N, S> {
    pub fn new(keys: WalletKeys, node: N, store: S) -> Result<Self, WalletError> {
        Self::with_lookahead(
            keys,
            node,
            store,
            SUBADDRESS_MAJOR_LOOKAHEAD,
            SUBADDRESS_MINOR_LOOKAHEAD,
        )
    }

    /// Open with a custom subaddress lookahead grid (the default is 50x200).
    pub fn with_lookahead(
        keys: WalletKeys,
        node: N,
        store: S,
        major_lookahead: u32,
        minor_lookahead: u32,
    ) -> Result<Self, WalletError> {
        let cn_map = cn_subaddress_map(
            &keys.cn.spend_public,
            &keys.cn.view_secret,
            major_lookahead,
            minor_lookahead,
        )?;
        let carrot_map = match &keys.carrot {
            Some(carrot) => Some(carrot_subaddress_map(
                &carrot.account_spend_pubkey,
                &carrot.generate_address_secret,
                major_lookahead,
                minor_lookahead,
            )?),
            None => None,
        };
        let scan_ctx = ScanContext::new(&keys, cn_map, carrot_map);
        let network = keys.network;
        Ok(Self {
            keys,
            node,
            store,
            scan_ctx,
            tracker: ChainTracker::new(),
            network,
            tip_height: 0,
        })
    }

    pub fn keys(&self) -> &WalletKeys {
        &self.keys
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tear the session down, keeping the store (e.g. to reconnect through a
    /// different node).
    pub fn into_store(self) -> S {
        self.store
    }

    pub fn tip_height(&self) -> u64 {
        self.tip_height
    }

    /// Fork policy for the next block to be mined.
    pub fn current_policy(&self) -> ForkPolicy {
        policy(self.tip_height + 1, self.network)
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    pub async fn sync(&mut self, cancel: &CancelToken) -> Result<SyncOutcome, WalletError> {
        self.sync_with_events(cancel, |_| {}).await
    }

    pub async fn sync_with_events(
        &mut self,
        cancel: &CancelToken,
        on_event: impl FnMut(SyncEvent),
    ) -> Result<SyncOutcome, WalletError> {
        let outcome = sync::sync(
            &self.node,
            &mut self.store,
            &mut self.tracker,
            &self.scan_ctx,
            cancel,
            on_event,
        )
        .await?;
        self.tip_height = outcome.height;
        Ok(outcome)
    }

    // ------------------------------------------------------------------
    // Balance
    // ------------------------------------------------------------------

    pub fn balance(&self, asset: AssetType) -> Balance {
        let filter = OutputFilter {
            unspent_only: true,
            include_frozen: false,
            asset_type: Some(asset),
            ..Default::default()
        };
        let mut balance = Balance::default();
        for output in self.store.get_outputs(&filter) {
            balance.total += output.amount;
            if output.is_spendable_at(self.tip_height) {
                balance.unlocked += output.amount;
            }
        }
        balance
    }

    // ------------------------------------------------------------------
    // Entry points
    // ------------------------------------------------------------------

    /// Send to one or more addresses.
    pub async fn transfer(
        &mut self,
        destinations: &[(Address, u64)],
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        if destinations.is_empty() {
            return Err(WalletError::InvalidInput("no destinations".into()));
        }
        if destinations.iter().any(|(_, amount)| *amount == 0) {
            return Err(WalletError::InvalidInput("zero-amount destination".into()));
        }
        let fork = self.current_policy();
        let asset = fork.asset_type;

        let dests: Vec<Destination> = destinations
            .iter()
            .map(|(addr, amount)| Destination {
                spend_pubkey: addr.spend_public_key,
                view_pubkey: addr.view_public_key,
                amount: *amount,
                asset_type: asset,
                payment_id: addr.payment_id.unwrap_or([0u8; 8]),
            })
            .collect();

        self.build_and_submit(TxType::Transfer, dests, 0, asset, asset, 0, None, options)
            .await
    }

    /// Spend every spendable output of the active asset into one output.
    pub async fn sweep(
        &mut self,
        destination: &Address,
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        let fork = self.current_policy();
        let asset = fork.asset_type;

        let spendable = self.spendable_outputs(asset)?;
        let selection = select_utxos(&spendable, 0, SelectionStrategy::All, SWEEP_MAX_INPUTS)
            .ok_or(WalletError::InsufficientBalance { need: 1, have: 0 })?;

        let fee = estimate_tx_fee(
            selection.selected.len(),
            1,
            DEFAULT_RING_SIZE,
            fork.sig_type,
            OutputKind::for_rct(fork.rct_type),
            options.priority,
        );
        if selection.total <= fee {
            return Err(WalletError::InsufficientBalance {
                need: fee + 1,
                have: selection.total,
            });
        }
        let amount = selection.total - fee;

        let dest = Destination {
            spend_pubkey: destination.spend_public_key,
            view_pubkey: destination.view_public_key,
            amount,
            asset_type: asset,
            payment_id: destination.payment_id.unwrap_or([0u8; 8]),
        };

        self.submit_selected(
            TxType::Transfer,
            vec![dest],
            selection.selected,
            0,
            asset,
            asset,
            0,
            Some(fee),
            options,
        )
        .await
    }

    /// Lock `amount` for the network's stake period; the stake returns to
    /// this wallet's own address.
    pub async fn stake(
        &mut self,
        amount: u64,
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidInput("zero stake amount".into()));
        }
        let asset = self.current_policy().asset_type;
        self.build_and_submit(TxType::Stake, Vec::new(), amount, asset, asset, 0, None, options)
            .await
    }

    /// Destroy `amount` of the active asset.
    pub async fn burn(
        &mut self,
        amount: u64,
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidInput("zero burn amount".into()));
        }
        let asset = self.current_policy().asset_type;
        self.build_and_submit(
            TxType::Burn,
            Vec::new(),
            amount,
            asset,
            AssetType::Burn,
            0,
            None,
            options,
        )
        .await
    }

    /// Convert between ledger assets; the network credits the destination on
    /// inclusion. The credit lands on this wallet's return address, so the
    /// destination must be one of our own addresses.
    pub async fn convert(
        &mut self,
        amount: u64,
        source_asset: AssetType,
        destination_asset: AssetType,
        destination: &Address,
        slippage_limit: u64,
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        if amount == 0 {
            return Err(WalletError::InvalidInput("zero convert amount".into()));
        }
        if AssetType::equivalent(source_asset, destination_asset) {
            return Err(WalletError::PolicyViolation(
                "conversion between equivalent assets".into(),
            ));
        }
        let own_legacy = self.keys.cn_address();
        let own_carrot = self.keys.carrot_address();
        if destination.spend_public_key != own_legacy.spend_public_key
            && own_carrot
                .as_ref()
                .map_or(true, |a| destination.spend_public_key != a.spend_public_key)
        {
            return Err(WalletError::PolicyViolation(
                "convert credits the sender's return address; destination must be our own".into(),
            ));
        }

        self.build_and_submit(
            TxType::Convert,
            Vec::new(),
            amount,
            source_asset,
            destination_asset,
            slippage_limit,
            None,
            options,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Shared pipeline
    // ------------------------------------------------------------------

    fn spendable_outputs(&self, asset: AssetType) -> Result<Vec<OutputRecord>, WalletError> {
        if !self.keys.can_spend() {
            return Err(WalletError::PolicyViolation("view-only wallet cannot spend".into()));
        }
        let outputs = self
            .store
            .get_outputs(&OutputFilter::spendable(asset, self.tip_height))
            .into_iter()
            .filter(|o| o.is_spendable_at(self.tip_height))
            .collect();
        Ok(outputs)
    }

    #[allow(clippy::too_many_arguments)]
    async fn build_and_submit(
        &mut self,
        tx_type: TxType,
        destinations: Vec<Destination>,
        amount_burnt: u64,
        source_asset: AssetType,
        destination_asset: AssetType,
        slippage_limit: u64,
        fixed_fee: Option<u64>,
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        let fork = self.current_policy();
        let spendable = self.spendable_outputs(source_asset)?;
        let available: u64 = spendable.iter().map(|o| o.amount).sum();

        let send_total: u64 = destinations.iter().map(|d| d.amount).sum::<u64>() + amount_burnt;

        // Fee settles with the true input count: guess with two inputs, then
        // re-select until selection and fee agree.
        let mut destinations = destinations;
        let mut fee = fixed_fee.unwrap_or_else(|| {
            estimate_tx_fee(
                2,
                destinations.len() + 1,
                DEFAULT_RING_SIZE,
                fork.sig_type,
                OutputKind::for_rct(fork.rct_type),
                options.priority,
            )
        });

        let selection = loop {
            options.cancel.check()?;
            let target = if options.subtract_fee_from_amount {
                send_total
            } else {
                send_total + fee
            };
            let selection = select_utxos(&spendable, target, options.strategy, SWEEP_MAX_INPUTS)
                .ok_or(WalletError::InsufficientBalance {
                    need: target,
                    have: available,
                })?;

            let settled = fixed_fee.unwrap_or_else(|| {
                estimate_tx_fee(
                    selection.selected.len(),
                    destinations.len() + 1,
                    DEFAULT_RING_SIZE,
                    fork.sig_type,
                    OutputKind::for_rct(fork.rct_type),
                    options.priority,
                )
            });
            if settled <= fee {
                fee = settled;
                break selection;
            }
            fee = settled;
        };

        if options.subtract_fee_from_amount {
            let first = destinations
                .first_mut()
                .ok_or_else(|| WalletError::InvalidInput("nothing to subtract the fee from".into()))?;
            if first.amount <= fee {
                return Err(WalletError::InsufficientBalance {
                    need: fee + 1,
                    have: first.amount,
                });
            }
            first.amount -= fee;
        }

        self.submit_selected(
            tx_type,
            destinations,
            selection.selected,
            amount_burnt,
            source_asset,
            destination_asset,
            slippage_limit,
            Some(fee),
            options,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn submit_selected(
        &mut self,
        tx_type: TxType,
        destinations: Vec<Destination>,
        mut selected: Vec<OutputRecord>,
        amount_burnt: u64,
        source_asset: AssetType,
        destination_asset: AssetType,
        slippage_limit: u64,
        fee: Option<u64>,
        options: &TransferOptions,
    ) -> Result<TransferResult, WalletError> {
        let fork = self.current_policy();
        options.cancel.check()?;

        self.resolve_global_indexes(&mut selected, &options.cancel).await?;
        let inputs = self.prepare_inputs(&selected, &fork, &options.cancel).await?;

        // Change: CARROT keys once the fork is live, legacy otherwise.
        let (change_spend, change_view) = if fork.carrot_active {
            let carrot = self
                .keys
                .carrot
                .as_ref()
                .ok_or_else(|| WalletError::PolicyViolation("CARROT keys required".into()))?;
            (carrot.account_spend_pubkey, carrot.account_view_pubkey)
        } else {
            (self.keys.cn.spend_public, self.keys.cn.view_public)
        };

        let mut builder = TransactionBuilder::new()
            .protocol(fork.rct_type, fork.tx_version(tx_type))
            .tx_type(tx_type)
            .priority(options.priority)
            .asset_types(source_asset, destination_asset)
            .amount_burnt(amount_burnt)
            .slippage_limit(slippage_limit)
            .change_address(change_spend, change_view)
            .view_secret_key(self.keys.cn.view_secret)
            .add_inputs(inputs);
        if let Some(fee) = fee {
            builder = builder.fee(fee);
        }
        for dest in destinations {
            builder = builder.add_destination(dest);
        }

        let unsigned = builder.build()?;
        let fee = unsigned.fee;
        let amount: u64 = unsigned.output_amounts.iter().sum::<u64>() + amount_burnt;
        let tx = sign_transaction(unsigned)?;
        let tx_hash = tx.tx_hash();
        let tx_hex = tx.to_hex();
        let key_images = tx.key_images();

        if options.dry_run {
            info!("dry run {}: fee {}", hex::encode(tx_hash), fee);
            return Ok(TransferResult {
                tx_hash,
                tx_hex,
                fee,
                amount,
                broadcast: false,
            });
        }

        // Double-spend guard before broadcast.
        options.cancel.check()?;
        let images_hex: Vec<String> = key_images.iter().map(hex::encode).collect();
        let statuses = self.node.is_key_image_spent(&images_hex).await?;
        if statuses.iter().any(|&s| s != 0) {
            return Err(WalletError::DoubleSpend);
        }

        let receipt = self
            .node
            .send_raw_transaction(&tx_hex, source_asset.as_str())
            .await?;
        if !receipt.accepted() {
            if receipt.double_spend {
                return Err(WalletError::DoubleSpend);
            }
            return Err(WalletError::Rpc {
                code: -1,
                message: format!("tx rejected: {} ({})", receipt.status, receipt.reason),
            });
        }

        // Only now touch the store: the inputs are gone.
        for record in &selected {
            self.store
                .mark_output_spent(&record.key_image, tx_hash, self.tip_height + 1)?;
        }
        info!(
            "broadcast {} ({}): {} inputs, fee {}",
            hex::encode(tx_hash),
            tx_type,
            selected.len(),
            fee
        );

        Ok(TransferResult {
            tx_hash,
            tx_hex,
            fee,
            amount,
            broadcast: true,
        })
    }

    /// Batch-resolve missing global indices, grouped by owning transaction.
    async fn resolve_global_indexes(
        &mut self,
        selected: &mut [OutputRecord],
        cancel: &CancelToken,
    ) -> Result<(), WalletError> {
        let mut by_tx: Vec<[u8; 32]> = selected
            .iter()
            .filter(|o| o.global_index.is_none())
            .map(|o| o.tx_hash)
            .collect();
        by_tx.sort_unstable();
        by_tx.dedup();

        for tx_hash in by_tx {
            cancel.check()?;
            let indexes = self.node.get_output_indexes(&hex::encode(tx_hash)).await?;
            // Post-CARROT transactions carry within-asset indices; those are
            // the ones rings are built from.
            let effective = if indexes.asset_type_output_indices.is_empty() {
                &indexes.o_indexes
            } else {
                &indexes.asset_type_output_indices
            };
            for output in selected.iter_mut().filter(|o| o.tx_hash == tx_hash) {
                match effective.get(output.output_index as usize) {
                    Some(&index) => {
                        output.global_index = Some(index);
                        self.store.set_global_index(&output.key_image, index)?;
                    }
                    // A short index array leaves the output unresolved, never
                    // zero; selection defers it.
                    None => {
                        return Err(WalletError::PolicyViolation(
                            "node returned incomplete output indices".into(),
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    /// Derive one-time secrets and draw decoy rings for the selection.
    async fn prepare_inputs(
        &self,
        selected: &[OutputRecord],
        fork: &ForkPolicy,
        cancel: &CancelToken,
    ) -> Result<Vec<PreparedInput>, WalletError> {
        let distribution = self
            .node
            .get_output_distribution(fork.asset_type.as_str(), 0, None)
            .await?;
        let selector = DecoySelector::new(distribution).map_err(WalletError::from)?;

        let mut inputs = Vec::with_capacity(selected.len());
        for record in selected {
            cancel.check()?;

            let global_index = record.global_index.ok_or_else(|| {
                WalletError::Internal("selection passed an unresolved output".into())
            })?;

            // One-time secret(s).
            let (secret_key, secret_key_y) = if record.is_carrot {
                let carrot = self
                    .keys
                    .carrot
                    .as_ref()
                    .ok_or_else(|| WalletError::PolicyViolation("CARROT keys required".into()))?;
                let prove_spend = carrot.prove_spend_key.ok_or_else(|| {
                    WalletError::PolicyViolation("view-only wallet cannot spend".into())
                })?;
                let shared = record.carrot_shared_secret.ok_or_else(|| {
                    WalletError::PolicyViolation("carrot output without shared secret".into())
                })?;
                let commitment = record.commitment.ok_or_else(|| {
                    WalletError::PolicyViolation("carrot output without commitment".into())
                })?;
                let (x, y) = carrot_scan::derive_spend_keys(
                    &prove_spend,
                    &carrot.generate_image_key,
                    &shared,
                    &commitment,
                );
                (x, Some(y))
            } else {
                let spend_secret = self.keys.cn.spend_secret.ok_or_else(|| {
                    WalletError::PolicyViolation("view-only wallet cannot spend".into())
                })?;
                let secret = cn_scan::derive_output_spend_key(
                    &self.keys.cn.view_secret,
                    &spend_secret,
                    &record.tx_pub_key,
                    record.output_index,
                    record.subaddress_index.0,
                    record.subaddress_index.1,
                )
                .ok_or(WalletError::PointInvalid)?;
                // Pre-CARROT rings have no T column.
                (secret, fork.carrot_active.then(Scalar::default))
            };

            let (ring_indices, real_index) = selector
                .build_ring(global_index, DEFAULT_RING_SIZE)
                .map_err(WalletError::from)?;

            cancel.check()?;
            let refs: Vec<OutputRef> = ring_indices
                .iter()
                .map(|&index| OutputRef { amount: 0, index })
                .collect();
            let outs = self.node.get_outs(&refs).await?;
            if outs.len() != ring_indices.len() {
                return Err(WalletError::Network("short get_outs response".into()));
            }

            let mut ring = Vec::with_capacity(outs.len());
            let mut ring_commitments = Vec::with_capacity(outs.len());
            for out in &outs {
                ring.push(parse_key32(&out.key)?);
                ring_commitments.push(parse_key32(&out.mask)?);
            }

            // The real slot must carry our own key and commitment.
            ring[real_index] = record.output_public_key;
            let mask = reduce32(&record.mask);
            let commitment = match record.commitment {
                Some(c) => c,
                None => salvium_light_crypto::pedersen_commit(record.amount, &mask),
            };
            ring_commitments[real_index] = commitment;
            decompress(&ring[real_index])?;

            debug!(
                "input {}: ring of {} around global index {}",
                hex::encode(record.key_image),
                ring.len(),
                global_index
            );

            inputs.push(PreparedInput {
                secret_key,
                secret_key_y,
                public_key: record.output_public_key,
                amount: record.amount,
                mask,
                asset_type: record.asset_type,
                global_index,
                ring,
                ring_commitments,
                ring_indices,
                real_index,
            });
        }
        Ok(inputs)
    }

    /// Blocks a STAKE output stays locked on this network.
    pub fn stake_lock_period(&self) -> u64 {
        network_config(self.network).stake_lock_period
    }
}

fn parse_key32(hex_str: &str) -> Result<[u8; 32], WalletError> {
    let bytes = hex::decode(hex_str).map_err(|e| WalletError::Parse(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| WalletError::Parse("expected 32 bytes".into()))
}
