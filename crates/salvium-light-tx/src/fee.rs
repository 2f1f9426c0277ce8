//! Fee estimation.
//!
//! Transaction weight is estimated from structural parameters (input and
//! output counts, ring size, signature scheme, output kind); the fee is
//! affine in that weight with a priority multiplier on top of the per-byte
//! floor.

use salvium_light_types::constants::{DEFAULT_RING_SIZE, FEE_PER_BYTE};
use salvium_light_types::{RctType, SigType};

/// Priority ladder; multipliers applied to the base fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeePriority {
    #[default]
    Default,
    Normal,
    High,
}

impl FeePriority {
    pub fn multiplier(&self) -> u64 {
        match self {
            FeePriority::Default => 1,
            FeePriority::Normal => 5,
            FeePriority::High => 25,
        }
    }
}

/// Output flavor for size purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    TaggedKey,
    CarrotV1,
}

impl OutputKind {
    pub fn for_rct(rct_type: RctType) -> Self {
        if rct_type >= RctType::SalviumOne {
            OutputKind::CarrotV1
        } else {
            OutputKind::TaggedKey
        }
    }
}

/// Estimated serialized size in bytes.
pub fn estimate_tx_size(
    num_inputs: usize,
    num_outputs: usize,
    ring_size: usize,
    sig_type: SigType,
    out_kind: OutputKind,
) -> usize {
    // version + unlock_time + vin/vout counts.
    let mut size = 4usize;

    // Salvium prefix extensions: tx_type, amount_burnt, asset strings,
    // slippage limit, return-address overhead.
    size += 24;

    // Inputs: tag + amount + asset + offsets + key image.
    size += num_inputs * (1 + 1 + 5 + 1 + ring_size * 4 + 32);

    // Outputs.
    size += num_outputs
        * match out_kind {
            OutputKind::CarrotV1 => 1 + 1 + 32 + 5 + 3 + 16,
            OutputKind::TaggedKey => 1 + 1 + 32 + 5 + 1 + 1,
        };

    // Extra: tx pubkey plus slack.
    size += 40;

    // RCT base: type + fee + ecdhInfo + outPk + p_r.
    size += 1 + 4 + num_outputs * (8 + 32) + 32;

    // Ring signatures.
    size += match sig_type {
        SigType::Tclsag => num_inputs * (ring_size * 64 + 64),
        SigType::Clsag => num_inputs * (ring_size * 32 + 64),
    };

    // Pseudo-outs.
    size += num_inputs * 32;

    size += bp_plus_size(num_outputs);

    size
}

/// Weight: size plus the BP+ clawback for batched proofs over 2 outputs.
pub fn estimate_tx_weight(
    num_inputs: usize,
    num_outputs: usize,
    ring_size: usize,
    sig_type: SigType,
    out_kind: OutputKind,
) -> usize {
    let size = estimate_tx_size(num_inputs, num_outputs, ring_size, sig_type, out_kind);
    size + bp_plus_clawback(num_outputs)
}

/// Fee for the given shape at a priority.
pub fn estimate_tx_fee(
    num_inputs: usize,
    num_outputs: usize,
    ring_size: usize,
    sig_type: SigType,
    out_kind: OutputKind,
    priority: FeePriority,
) -> u64 {
    let weight = estimate_tx_weight(num_inputs, num_outputs, ring_size, sig_type, out_kind) as u64;
    weight * FEE_PER_BYTE * priority.multiplier()
}

/// Quick estimate for the builder's first pass (TCLSAG/CARROT shape).
pub fn estimate_fee_simple(num_inputs: usize, num_outputs: usize, priority: FeePriority) -> u64 {
    estimate_tx_fee(
        num_inputs,
        num_outputs,
        DEFAULT_RING_SIZE,
        SigType::Tclsag,
        OutputKind::CarrotV1,
        priority,
    )
}

fn next_pow2_log(n: usize) -> usize {
    let mut log = 0;
    while (1usize << log) < n {
        log += 1;
    }
    log
}

/// BP+ proof size: 6 fixed elements plus the L/R vectors.
fn bp_plus_size(num_outputs: usize) -> usize {
    if num_outputs == 0 {
        return 0;
    }
    let nlr = 2 * (6 + next_pow2_log(num_outputs));
    192 + nlr * 32
}

/// Weight clawback for aggregated proofs over more than two outputs.
fn bp_plus_clawback(num_outputs: usize) -> usize {
    if num_outputs <= 2 {
        return 0;
    }
    let bp_base: usize = 32 * (6 + 7 * 2) / 2;
    let log_padded = next_pow2_log(num_outputs);
    let padded = 1usize << log_padded;
    let nlr = 2 * (6 + log_padded);
    let bp_size = 32 * (6 + nlr);
    (bp_base * padded).saturating_sub(bp_size) * 4 / 5
}
