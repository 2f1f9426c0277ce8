//! Decoy selection over the global output distribution.
//!
//! Gamma-biased recency sampling (Miller et al.): spend-age is drawn from
//! Gamma(19.28, 1/1.61) on a log scale, mapped to a global output index via
//! the node's cumulative distribution, then localized uniformly within the
//! block that owns that index. Rings are returned sorted ascending with the
//! real member's position re-located after the sort.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

use crate::TxError;
use salvium_light_types::constants::{DEFAULT_RING_SIZE, DIFFICULTY_TARGET_V2};

/// Recent blocks whose outputs are still locked.
const SPENDABLE_AGE: usize = 10;

const GAMMA_SHAPE: f64 = 19.28;
const GAMMA_SCALE: f64 = 1.0 / 1.61;

/// Window (seconds) treated as "recent spend" and flattened to uniform.
const RECENT_SPEND_WINDOW: f64 = 1800.0;

pub struct DecoySelector {
    /// Cumulative output counts per block from `get_output_distribution`.
    offsets: Vec<u64>,
    num_usable: u64,
    average_output_time: f64,
    age_distribution: Gamma<f64>,
}

impl DecoySelector {
    pub fn new(offsets: Vec<u64>) -> Result<Self, TxError> {
        if offsets.len() < SPENDABLE_AGE + 1 {
            return Err(TxError::DecoySelection(
                "output distribution shorter than the spendable age".into(),
            ));
        }

        let usable_len = offsets.len() - SPENDABLE_AGE;
        let num_usable = offsets[usable_len - 1];
        if num_usable == 0 {
            return Err(TxError::DecoySelection("no usable outputs".into()));
        }

        let age_distribution = Gamma::new(GAMMA_SHAPE, GAMMA_SCALE)
            .map_err(|e| TxError::DecoySelection(format!("gamma parameters: {}", e)))?;

        let total_time = usable_len as f64 * DIFFICULTY_TARGET_V2 as f64;
        Ok(Self {
            offsets,
            num_usable,
            average_output_time: total_time / num_usable as f64,
            age_distribution,
        })
    }

    pub fn usable_outputs(&self) -> u64 {
        self.num_usable
    }

    /// Draw `ring_size - 1` distinct decoy indices, excluding `real_index`.
    pub fn pick_decoys(&self, real_index: u64, ring_size: usize) -> Result<Vec<u64>, TxError> {
        let wanted = ring_size - 1;
        let mut rng = rand::thread_rng();
        let mut decoys = Vec::with_capacity(wanted);
        let max_attempts = wanted * 100;

        for _ in 0..max_attempts {
            if decoys.len() == wanted {
                break;
            }
            let idx = self.sample_index(&mut rng);
            if idx == real_index || idx >= self.num_usable || decoys.contains(&idx) {
                continue;
            }
            decoys.push(idx);
        }

        if decoys.len() < wanted {
            return Err(TxError::DecoySelection(format!(
                "could not find {} distinct decoys",
                wanted
            )));
        }
        Ok(decoys)
    }

    /// Full sorted ring for one input: `(indices ascending, real position)`.
    pub fn build_ring(&self, real_index: u64, ring_size: usize) -> Result<(Vec<u64>, usize), TxError> {
        let mut ring = self.pick_decoys(real_index, ring_size)?;
        ring.push(real_index);
        ring.sort_unstable();
        let real_position = ring
            .iter()
            .position(|&i| i == real_index)
            .expect("real index was just inserted");
        Ok((ring, real_position))
    }

    /// Default-ring-size convenience.
    pub fn build_default_ring(&self, real_index: u64) -> Result<(Vec<u64>, usize), TxError> {
        self.build_ring(real_index, DEFAULT_RING_SIZE)
    }

    fn sample_index<R: Rng>(&self, rng: &mut R) -> u64 {
        // The gamma model lives on a log scale: its samples are ln(age).
        let age = self.age_distribution.sample(rng).exp();

        let seconds_ago = if age > RECENT_SPEND_WINDOW {
            age - RECENT_SPEND_WINDOW
        } else {
            rng.gen::<f64>() * RECENT_SPEND_WINDOW
        };

        let offset = (seconds_ago / self.average_output_time) as u64;
        if offset >= self.num_usable {
            return self.num_usable; // out of range, caller rejects
        }

        self.localize(self.num_usable - 1 - offset, rng)
    }

    /// Replace a global index with a uniform pick inside its block.
    fn localize<R: Rng>(&self, target: u64, rng: &mut R) -> u64 {
        let usable_len = self.offsets.len() - SPENDABLE_AGE;
        let block = match self.offsets[..usable_len].binary_search(&target) {
            Ok(pos) => pos,
            Err(0) => 0,
            Err(pos) => pos - 1,
        };

        let start = if block == 0 { 0 } else { self.offsets[block - 1] };
        let end = self.offsets[block];
        if end <= start {
            return target;
        }
        start + rng.gen_range(0..end - start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offsets(blocks: usize, per_block: u64) -> Vec<u64> {
        (1..=blocks as u64).map(|i| i * per_block).collect()
    }

    #[test]
    fn rejects_short_distribution() {
        assert!(DecoySelector::new(offsets(5, 10)).is_err());
    }

    #[test]
    fn usable_excludes_recent_blocks() {
        let sel = DecoySelector::new(offsets(100, 10)).unwrap();
        assert_eq!(sel.usable_outputs(), 90 * 10);
    }

    #[test]
    fn picks_the_requested_count_without_duplicates() {
        let sel = DecoySelector::new(offsets(200, 100)).unwrap();
        let decoys = sel.pick_decoys(500, DEFAULT_RING_SIZE).unwrap();
        assert_eq!(decoys.len(), DEFAULT_RING_SIZE - 1);

        let mut dedup = decoys.clone();
        dedup.sort_unstable();
        dedup.dedup();
        assert_eq!(dedup.len(), decoys.len());
        assert!(!decoys.contains(&500));
    }

    #[test]
    fn ring_is_sorted_and_real_position_located() {
        let sel = DecoySelector::new(offsets(200, 100)).unwrap();
        let (ring, real_position) = sel.build_ring(42, DEFAULT_RING_SIZE).unwrap();
        assert_eq!(ring.len(), DEFAULT_RING_SIZE);
        assert_eq!(ring[real_position], 42);
        assert!(ring.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn default_ring_size_is_eleven() {
        let sel = DecoySelector::new(offsets(200, 100)).unwrap();
        let (ring, _) = sel.build_default_ring(42).unwrap();
        assert_eq!(ring.len(), 11);
    }

    #[test]
    fn samples_stay_in_range() {
        let sel = DecoySelector::new(offsets(150, 50)).unwrap();
        let mut rng = rand::thread_rng();
        for _ in 0..500 {
            let idx = sel.sample_index(&mut rng);
            assert!(idx <= sel.num_usable);
        }
    }

    #[test]
    fn age_model_skews_recent() {
        // ln(age) ~ Gamma(19.28, 1/1.61) has its mass around e^12 seconds;
        // most draws should land on newer indices, and all must be finite
        // and positive.
        let sel = DecoySelector::new(offsets(400, 25)).unwrap();
        let mut rng = rand::thread_rng();
        let mut newer_half = 0usize;
        let n = 1000;
        for _ in 0..n {
            let age = sel.age_distribution.sample(&mut rng).exp();
            assert!(age.is_finite() && age > 0.0);
            let idx = sel.sample_index(&mut rng);
            if idx >= sel.num_usable / 2 {
                newer_half += 1;
            }
        }
        assert!(newer_half > n / 2, "expected recency bias, got {}/{}", newer_half, n);
    }
}
